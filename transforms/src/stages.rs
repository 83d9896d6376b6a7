use crate::rng::{sample_gaussian, seeded_rng};
use crate::{clamp_round, Raster, Result, TransformError};
use image::{DynamicImage, GrayImage, Rgb};
use imageproc::gradients;

/// Adds zero-mean Gaussian noise, standard deviation 6.5, per channel.
pub fn fawkes(img: &Raster, seed: u64) -> Result<Raster> {
    require_non_empty(img)?;
    let mut rng = seeded_rng(seed);
    let mut out = img.clone();
    for px in out.pixels_mut() {
        for c in 0..3 {
            let noise = sample_gaussian(&mut rng, 6.5) as f32;
            px[c] = clamp_round(px[c] as f32 + noise);
        }
    }
    Ok(out)
}

/// `M = 0.6*B + 0.4*E`, `out = 0.65*input + 0.35*M`, where `B` is a
/// Gaussian-blurred copy (radius 1.6) and `E` is the Sobel gradient
/// magnitude normalized to the image's own maximum, broadcast to all
/// channels.
pub fn photoguard(img: &Raster) -> Result<Raster> {
    require_non_empty(img)?;
    let dynamic = DynamicImage::ImageRgb8(img.clone());
    let blurred = dynamic.blur(1.6).to_rgb8();

    let gray: GrayImage = dynamic.to_luma8();
    let gradients = gradients::sobel_gradients(&gray);
    let max_grad = gradients.iter().copied().max().unwrap_or(1).max(1) as f32;

    let (width, height) = img.dimensions();
    let mut out = Raster::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let input_px = img.get_pixel(x, y);
            let blur_px = blurred.get_pixel(x, y);
            let edge = gradients.get_pixel(x, y)[0] as f32 / max_grad * 255.0;

            let mut channels = [0u8; 3];
            for c in 0..3 {
                let b = blur_px[c] as f32;
                let m = 0.6 * b + 0.4 * edge;
                let value = 0.65 * input_px[c] as f32 + 0.35 * m;
                channels[c] = clamp_round(value);
            }
            out.put_pixel(x, y, Rgb(channels));
        }
    }
    Ok(out)
}

/// Saturation x1.22, contrast x1.08 about the per-channel mean, then an
/// unsharp mask (radius 0.8, amount 0.12).
pub fn mist(img: &Raster) -> Result<Raster> {
    require_non_empty(img)?;
    let saturated = adjust_saturation(img, 1.22);
    let contrasted = adjust_contrast_about_mean(&saturated, 1.08);
    unsharp_mask(&contrasted, 0.8, 0.12)
}

/// `S` is the input rolled 5 pixels rightward (wrap-around); adds
/// Gaussian noise (std 4.0); `out = 0.82*input + 0.13*S + N`.
pub fn nightshade(img: &Raster, seed: u64) -> Result<Raster> {
    require_non_empty(img)?;
    let (width, height) = img.dimensions();
    let mut rng = seeded_rng(seed);
    let mut out = Raster::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let rolled_x = (x + width - (5 % width)) % width;
            let input_px = img.get_pixel(x, y);
            let rolled_px = img.get_pixel(rolled_x, y);
            let mut channels = [0u8; 3];
            for c in 0..3 {
                let noise = sample_gaussian(&mut rng, 4.0) as f32;
                let value =
                    0.82 * input_px[c] as f32 + 0.13 * rolled_px[c] as f32 + noise;
                channels[c] = clamp_round(value);
            }
            out.put_pixel(x, y, Rgb(channels));
        }
    }
    Ok(out)
}

/// For each pixel, adds `amplitude * sin(r / max(frequency, 1e-5))` to
/// every channel, where `r` is the Euclidean distance to the image center.
pub fn tree_ring(img: &Raster, amplitude: f32, frequency: f32) -> Result<Raster> {
    require_non_empty(img)?;
    let (width, height) = img.dimensions();
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let denom = frequency.max(1e-5);

    let mut out = Raster::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let dx = x as f32 - cx;
            let dy = y as f32 - cy;
            let r = (dx * dx + dy * dy).sqrt();
            let ripple = amplitude * (r / denom).sin();

            let input_px = img.get_pixel(x, y);
            let mut channels = [0u8; 3];
            for c in 0..3 {
                channels[c] = clamp_round(input_px[c] as f32 + ripple);
            }
            out.put_pixel(x, y, Rgb(channels));
        }
    }
    Ok(out)
}

/// Flattens the raster into a row-major byte stream and replaces the
/// least-significant bit of successive bytes with successive bits of
/// `text`'s UTF-8 encoding (little-endian bit order within each byte). If
/// `text` would not fit, the image is returned unchanged (per §4.1).
pub fn invisible_watermark(img: &Raster, text: &str) -> Result<Raster> {
    embed_bits(img, text.as_bytes(), BitOrder::LsbFirst, false)
}

/// Same embedding as [`invisible_watermark`] but most-significant-bit
/// first, with an 8-bit zero terminator appended to the payload.
pub fn stegano_embed(img: &Raster, text: &str) -> Result<Raster> {
    embed_bits(img, text.as_bytes(), BitOrder::MsbFirst, true)
}

enum BitOrder {
    LsbFirst,
    MsbFirst,
}

fn embed_bits(
    img: &Raster,
    payload: &[u8],
    order: BitOrder,
    append_terminator: bool,
) -> Result<Raster> {
    require_non_empty(img)?;
    let (width, height) = img.dimensions();
    let capacity_bits = width as usize * height as usize * 3;
    let payload_bits = payload.len() * 8 + if append_terminator { 8 } else { 0 };

    if payload_bits > capacity_bits {
        log::warn!(
            "embed payload ({payload_bits} bits) exceeds carrier capacity ({capacity_bits} bits); leaving image unchanged"
        );
        return Ok(img.clone());
    }

    let mut raw = img.clone().into_raw();
    let mut bit_index = 0usize;
    for &byte in payload {
        for i in 0..8 {
            let bit = match order {
                BitOrder::LsbFirst => (byte >> i) & 1,
                BitOrder::MsbFirst => (byte >> (7 - i)) & 1,
            };
            set_lsb(&mut raw[bit_index], bit);
            bit_index += 1;
        }
    }
    if append_terminator {
        for _ in 0..8 {
            set_lsb(&mut raw[bit_index], 0);
            bit_index += 1;
        }
    }

    Raster::from_raw(width, height, raw).ok_or(TransformError::EmptyImage)
}

fn set_lsb(byte: &mut u8, bit: u8) {
    *byte = (*byte & !1) | (bit & 1);
}

fn require_non_empty(img: &Raster) -> Result<()> {
    if img.width() == 0 || img.height() == 0 {
        Err(TransformError::EmptyImage)
    } else {
        Ok(())
    }
}

fn adjust_saturation(img: &Raster, factor: f32) -> Raster {
    let (width, height) = img.dimensions();
    let mut out = Raster::new(width, height);
    for (x, y, px) in img.enumerate_pixels() {
        let [r, g, b] = [px[0] as f32, px[1] as f32, px[2] as f32];
        let gray = 0.299 * r + 0.587 * g + 0.114 * b;
        let channels = [
            clamp_round(gray + (r - gray) * factor),
            clamp_round(gray + (g - gray) * factor),
            clamp_round(gray + (b - gray) * factor),
        ];
        out.put_pixel(x, y, Rgb(channels));
    }
    out
}

fn adjust_contrast_about_mean(img: &Raster, factor: f32) -> Raster {
    let mut sums = [0f64; 3];
    let n = (img.width() as f64) * (img.height() as f64);
    for px in img.pixels() {
        for c in 0..3 {
            sums[c] += px[c] as f64;
        }
    }
    let means: [f32; 3] = [
        (sums[0] / n) as f32,
        (sums[1] / n) as f32,
        (sums[2] / n) as f32,
    ];

    let (width, height) = img.dimensions();
    let mut out = Raster::new(width, height);
    for (x, y, px) in img.enumerate_pixels() {
        let mut channels = [0u8; 3];
        for c in 0..3 {
            let value = means[c] + (px[c] as f32 - means[c]) * factor;
            channels[c] = clamp_round(value);
        }
        out.put_pixel(x, y, Rgb(channels));
    }
    out
}

fn unsharp_mask(img: &Raster, radius: f32, amount: f32) -> Result<Raster> {
    let blurred = DynamicImage::ImageRgb8(img.clone()).blur(radius).to_rgb8();
    let (width, height) = img.dimensions();
    let mut out = Raster::new(width, height);
    for (x, y, px) in img.enumerate_pixels() {
        let blur_px = blurred.get_pixel(x, y);
        let mut channels = [0u8; 3];
        for c in 0..3 {
            let sharpened = px[c] as f32 + amount * (px[c] as f32 - blur_px[c] as f32);
            channels[c] = clamp_round(sharpened);
        }
        out.put_pixel(x, y, Rgb(channels));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_image() -> Raster {
        Raster::from_fn(16, 16, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, 128])
        })
    }

    #[test]
    fn fawkes_is_deterministic_for_fixed_seed() {
        let img = test_image();
        let a = fawkes(&img, 20240917).unwrap();
        let b = fawkes(&img, 20240917).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn fawkes_differs_for_different_seeds() {
        let img = test_image();
        let a = fawkes(&img, 1).unwrap();
        let b = fawkes(&img, 2).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn photoguard_preserves_dimensions() {
        let img = test_image();
        let out = photoguard(&img).unwrap();
        assert_eq!(out.dimensions(), img.dimensions());
    }

    #[test]
    fn mist_is_deterministic() {
        let img = test_image();
        let a = mist(&img).unwrap();
        let b = mist(&img).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn nightshade_is_deterministic_for_fixed_seed() {
        let img = test_image();
        let a = nightshade(&img, 20240917).unwrap();
        let b = nightshade(&img, 20240917).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn tree_ring_center_pixel_is_unchanged_by_sine_of_zero() {
        let img = Raster::from_pixel(17, 17, Rgb([100, 100, 100]));
        let out = tree_ring(&img, 18.0, 9.0).unwrap();
        // r=0 at the exact center -> sin(0)=0 -> unchanged.
        assert_eq!(out.get_pixel(8, 8), &Rgb([100, 100, 100]));
    }

    #[test]
    fn invisible_watermark_round_trips_lsb() {
        let img = Raster::from_pixel(8, 8, Rgb([200, 200, 200]));
        let watermarked = invisible_watermark(&img, "hi").unwrap();
        let raw = watermarked.as_raw();
        let mut byte = 0u8;
        for i in 0..8 {
            byte |= (raw[i] & 1) << i;
        }
        assert_eq!(byte, b'h');
    }

    #[test]
    fn stegano_embed_round_trips_msb_with_terminator() {
        let img = Raster::from_pixel(8, 8, Rgb([200, 200, 200]));
        let embedded = stegano_embed(&img, "h").unwrap();
        let raw = embedded.as_raw();
        let mut byte = 0u8;
        for i in 0..8 {
            byte |= (raw[i] & 1) << (7 - i);
        }
        assert_eq!(byte, b'h');
        // Terminator: next 8 bits should all be zero.
        for i in 8..16 {
            assert_eq!(raw[i] & 1, 0);
        }
    }

    #[test]
    fn oversized_watermark_leaves_image_unchanged() {
        let img = Raster::from_pixel(2, 2, Rgb([1, 2, 3]));
        let long_text = "this text is far too long to fit in a 2x2 image carrier";
        let out = invisible_watermark(&img, long_text).unwrap();
        assert_eq!(out, img);
    }
}
