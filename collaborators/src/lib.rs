//! Trait boundaries for the gateway's external collaborators, each with a
//! default implementation that runs entirely in-process (no credentials
//! or external service required) so the crate is runnable end-to-end.
//!
//! A deployment swaps any of these out — a real similarity backend, an
//! S3-backed object store, a CA-issued C2PA signer — without touching the
//! pipeline or job manager, which depend only on the traits.

pub mod backend;
pub mod hashes;
pub mod manifest;
pub mod similarity;
pub mod store;

pub use backend::{ArtworkBackend, BackendUploadError, HttpArtworkBackend, UploadRequest};
pub use hashes::{ExtractedHashes, HashProcessor, ImageMetadata, LocalHashProcessor};
pub use manifest::{LocalManifestSigner, ManifestArtifacts, ManifestConfig, ManifestSigner};
pub use similarity::{NotConfiguredSimilarityBackend, SimilarityBackend, SimilarityError, SimilarityResult};
pub use store::{LocalObjectStore, ObjectStore, StoreError, UploadedImage};
