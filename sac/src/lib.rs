//! Binary codec for the signed-difference reversibility mask ("SAC").
//!
//! A SAC blob carries the per-sample signed difference between an original
//! image and a processed derivative, so a trusted party holding the
//! processed image plus the blob can reconstruct the original exactly.
//! Nothing here is format-specific beyond the 24-byte header in [`Header`];
//! callers own the semantics of what "original" and "processed" mean.

use thiserror::Error;

mod codec;
mod plane;

pub use codec::{decode, decode_header, encode, encode_single_array};
pub use plane::{pack_hi_lo, unpack_hi_lo};

pub const MAGIC: [u8; 4] = *b"SAC1";
pub const DTYPE_I16: u8 = 1;
pub const HEADER_LEN: usize = 24;
pub const FLAG_SINGLE_ARRAY: u8 = 0b0000_0001;

/// Fixed seed shared by every deterministic pixel transform so repeated
/// runs over the same input produce byte-identical layer files.
pub const DETERMINISTIC_SEED: u64 = 20240917;

/// Default working-size bound transforms downscale to before computing.
pub const MAX_STAGE_DIMENSION: u32 = 512;

/// Offset used by the hi/lo uint8-plane packing: `((hi << 8) | lo) - DIFF_OFFSET == d`.
pub const DIFF_OFFSET: i32 = 32_768;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("truncated header: expected at least {HEADER_LEN} bytes, got {0}")]
    TruncatedHeader(usize),
    #[error("bad magic: expected {MAGIC:?}, got {0:?}")]
    BadMagic([u8; 4]),
    #[error("unsupported dtype code: {0}")]
    UnsupportedDtype(u8),
    #[error("arrays_count {actual} inconsistent with SINGLE_ARRAY flag (expected {expected})")]
    ArraysCountMismatch { expected: u8, actual: u8 },
    #[error("dimension mismatch: expected {expected} samples, payload has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("truncated payload: expected {expected} bytes, got {actual}")]
    TruncatedPayload { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, CodecError>;

/// Parsed SAC header. `width`/`height` are advisory (0 means unspecified)
/// and are not required to be consistent with `length_a`/`length_b` beyond
/// the `length == width * height * channels` check callers may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub flags: u8,
    pub dtype_code: u8,
    pub arrays_count: u8,
    pub length_a: u32,
    pub length_b: u32,
    pub width: u32,
    pub height: u32,
}

impl Header {
    pub fn is_single_array(&self) -> bool {
        self.flags & FLAG_SINGLE_ARRAY != 0
    }
}

/// A decoded SAC blob: header plus one or two int16 payload arrays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SacBlob {
    pub header: Header,
    pub array_a: Vec<i16>,
    pub array_b: Option<Vec<i16>>,
}

impl SacBlob {
    /// Reconstructs `original` samples from a `processed` byte stream of
    /// matching length, one channel array at a time. `clip(processed + diff, 0, 255)`.
    pub fn reconstruct(&self, processed: &[u8]) -> Vec<u8> {
        reconstruct_samples(processed, &self.array_a)
    }
}

/// `clip(processed + diff, 0, 255)` per sample, per §4.2.
pub fn reconstruct_samples(processed: &[u8], diff: &[i16]) -> Vec<u8> {
    processed
        .iter()
        .zip(diff.iter())
        .map(|(&p, &d)| {
            let v = p as i32 + d as i32;
            v.clamp(0, 255) as u8
        })
        .collect()
}

/// Signed per-sample difference `original - processed`, widened to i16.
pub fn signed_diff(original: &[u8], processed: &[u8]) -> Vec<i16> {
    original
        .iter()
        .zip(processed.iter())
        .map(|(&o, &p)| o as i16 - p as i16)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_diff_and_reconstruct_round_trip() {
        let original = vec![10u8, 200, 0, 255, 128];
        let processed = vec![12u8, 190, 5, 250, 128];
        let diff = signed_diff(&original, &processed);
        let reconstructed = reconstruct_samples(&processed, &diff);
        assert_eq!(reconstructed, original);
    }

    #[test]
    fn reconstruct_clips_to_byte_range() {
        let processed = vec![250u8];
        let diff = vec![i16::from(100)];
        assert_eq!(reconstruct_samples(&processed, &diff), vec![255]);

        let processed = vec![5u8];
        let diff = vec![i16::from(-100)];
        assert_eq!(reconstruct_samples(&processed, &diff), vec![0]);
    }
}
