//! Perceptual-hash extraction, grounded in
//! `original_source/artorize_gateway/hash_extractor.py`.
//!
//! The Python source computes five algorithms (`phash`, `ahash`, `dhash`,
//! `whash`, `colorhash`) via the external `imagehash`/`blockhash`
//! libraries. This crate implements the two that are expressible directly
//! over decoded pixels with the `image` crate already in the dependency
//! stack — `average_hash` and `difference_hash` — and returns no entry for
//! the others rather than fabricating a value, matching the Python
//! source's own "best effort, skip what fails" behavior per algorithm.

use image::{imageops::FilterType, DynamicImage};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize)]
pub struct ImageMetadata {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
    pub mode: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractedHashes {
    /// Maps hash name ("average_hash", "difference_hash") to a `0x`-prefixed hex string.
    pub hashes: BTreeMap<String, String>,
    pub metadata: ImageMetadata,
    pub error: Option<String>,
}

pub trait HashProcessor: Send + Sync {
    fn extract(&self, img: &DynamicImage, format: Option<&str>) -> ExtractedHashes;
}

pub struct LocalHashProcessor;

impl LocalHashProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LocalHashProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl HashProcessor for LocalHashProcessor {
    fn extract(&self, img: &DynamicImage, format: Option<&str>) -> ExtractedHashes {
        let metadata = ImageMetadata {
            width: img.width(),
            height: img.height(),
            format: format.map(|s| s.to_string()),
            mode: color_mode_name(img),
        };

        let mut hashes = BTreeMap::new();
        hashes.insert("average_hash".to_string(), average_hash(img));
        hashes.insert("difference_hash".to_string(), difference_hash(img));

        ExtractedHashes {
            hashes,
            metadata,
            error: None,
        }
    }
}

fn color_mode_name(img: &DynamicImage) -> String {
    match img {
        DynamicImage::ImageLuma8(_) => "L",
        DynamicImage::ImageLumaA8(_) => "LA",
        DynamicImage::ImageRgb8(_) => "RGB",
        DynamicImage::ImageRgba8(_) => "RGBA",
        _ => "RGB",
    }
    .to_string()
}

/// 8x8 grayscale downscale; bit set when a pixel is at or above the mean.
fn average_hash(img: &DynamicImage) -> String {
    let small = img.resize_exact(8, 8, FilterType::Lanczos3).to_luma8();
    let pixels: Vec<u8> = small.pixels().map(|p| p[0]).collect();
    let mean = pixels.iter().map(|&v| v as u32).sum::<u32>() as f32 / pixels.len() as f32;

    let mut bits: u64 = 0;
    for (i, &value) in pixels.iter().enumerate() {
        if value as f32 >= mean {
            bits |= 1 << i;
        }
    }
    format!("0x{:016x}", bits)
}

/// 9x8 grayscale downscale; bit set when a pixel is brighter than its
/// right-hand neighbor, per row.
fn difference_hash(img: &DynamicImage) -> String {
    let small = img.resize_exact(9, 8, FilterType::Lanczos3).to_luma8();
    let mut bits: u64 = 0;
    let mut i = 0;
    for y in 0..8u32 {
        for x in 0..8u32 {
            let left = small.get_pixel(x, y)[0];
            let right = small.get_pixel(x + 1, y)[0];
            if left > right {
                bits |= 1 << i;
            }
            i += 1;
        }
    }
    format!("0x{:016x}", bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn average_hash_is_deterministic() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(32, 32, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, 100])
        }));
        assert_eq!(average_hash(&img), average_hash(&img));
    }

    #[test]
    fn difference_hash_is_deterministic() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(32, 32, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, 100])
        }));
        assert_eq!(difference_hash(&img), difference_hash(&img));
    }

    #[test]
    fn solid_color_average_hash_is_all_ones() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 16, Rgb([128, 128, 128])));
        // Every pixel equals the mean, so every bit is set (>= mean).
        assert_eq!(average_hash(&img), "0xffffffffffffffff");
    }
}
