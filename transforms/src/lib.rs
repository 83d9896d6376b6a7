//! Deterministic, pixel-level protection-stage transforms.
//!
//! Every function here is a pure `Raster -> Raster` map seeded explicitly
//! by its caller (see [`rng::seeded_rng`]) rather than a hidden global, so
//! two runs over the same input with the same seed produce byte-identical
//! output even when stages run on different worker threads.

use image::RgbImage;
use thiserror::Error;

mod resize;
mod rng;
mod stages;

pub use resize::{resample_to, working_size};
pub use rng::seeded_rng;
pub use stages::{
    fawkes, invisible_watermark, mist, nightshade, photoguard, stegano_embed, tree_ring,
};

pub type Raster = RgbImage;

#[derive(Error, Debug)]
pub enum TransformError {
    #[error("image dimensions do not match: {0}x{1} vs {2}x{3}")]
    DimensionMismatch(u32, u32, u32, u32),
    #[error("image has zero width or height")]
    EmptyImage,
    #[error("payload too large: {payload_bits} bits does not fit in {capacity_bits} bits of carrier")]
    PayloadTooLarge {
        payload_bits: usize,
        capacity_bits: usize,
    },
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Stable, ordered catalogue of pixel-transform stage keys, per §4.1.
/// `c2pa-manifest` is deliberately absent: it has no pixel-level
/// transform of its own (identity on pixels, sidecar artifacts only) and
/// is applied by the pipeline directly through the signing collaborator.
pub const STAGE_KEYS: &[&str] = &[
    "fawkes",
    "photoguard",
    "mist",
    "nightshade",
    "invisible-watermark",
    "tree-ring",
    "stegano-embed",
];

fn clamp_round(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_keys_match_fixed_order() {
        assert_eq!(
            STAGE_KEYS,
            &[
                "fawkes",
                "photoguard",
                "mist",
                "nightshade",
                "invisible-watermark",
                "tree-ring",
                "stegano-embed",
            ]
        );
    }
}
