//! Job queue, worker pool, and lifecycle tracking for the protection
//! pipeline, grounded in `original_source/artorize_gateway/app.py`'s
//! `GatewayState`/`_worker_loop`/`JobRecord` and the teacher's
//! `ComputeEngine` trait-object registry idiom (`compute/src/engine.rs`).

mod manager;
mod record;
mod worker;

pub use manager::{JobError, JobManager};
pub use record::{JobId, JobRecord, JobStatus, NewJobRequest};
pub use worker::{JobCallbacks, NoopCallbacks};
