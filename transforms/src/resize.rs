use crate::{Raster, Result, TransformError};
use fast_image_resize as fr;
use image::RgbImage;

/// Computes the working-copy dimensions for a raster whose larger side
/// exceeds `max_dim`, preserving aspect ratio. Returns `(width, height)`
/// unchanged when the image already fits.
pub fn working_size(width: u32, height: u32, max_dim: u32) -> (u32, u32) {
    let largest = width.max(height);
    if largest <= max_dim || largest == 0 {
        return (width, height);
    }
    let scale = max_dim as f64 / largest as f64;
    let new_w = ((width as f64) * scale).round().max(1.0) as u32;
    let new_h = ((height as f64) * scale).round().max(1.0) as u32;
    (new_w, new_h)
}

/// Resamples `img` to `(target_w, target_h)`. Uses Lanczos3 when
/// downscaling and CatmullRom (bicubic) when upscaling, per §4.1.
pub fn resample_to(img: &Raster, target_w: u32, target_h: u32) -> Result<Raster> {
    if img.width() == 0 || img.height() == 0 {
        return Err(TransformError::EmptyImage);
    }
    if img.width() == target_w && img.height() == target_h {
        return Ok(img.clone());
    }

    let downscaling = target_w <= img.width() && target_h <= img.height();
    let filter = if downscaling {
        fr::FilterType::Lanczos3
    } else {
        fr::FilterType::CatmullRom
    };

    let src = fr::Image::from_vec_u8(img.width(), img.height(), img.as_raw().to_vec(), fr::PixelType::U8x3)
        .map_err(|_| TransformError::EmptyImage)?;

    let mut dst = fr::Image::new(target_w.max(1), target_h.max(1), fr::PixelType::U8x3);

    let options = fr::ResizeOptions::new().resize_alg(fr::ResizeAlg::Convolution(filter));
    let mut resizer = fr::Resizer::new();
    resizer
        .resize(&src, &mut dst, &options)
        .map_err(|_| TransformError::EmptyImage)?;

    RgbImage::from_raw(target_w, target_h, dst.buffer().to_vec())
        .ok_or(TransformError::EmptyImage)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn working_size_preserves_aspect_ratio() {
        let (w, h) = working_size(2048, 1024, 512);
        assert_eq!(w, 512);
        assert_eq!(h, 256);
    }

    #[test]
    fn working_size_leaves_small_images_alone() {
        assert_eq!(working_size(100, 80, 512), (100, 80));
    }

    #[test]
    fn resample_round_trip_preserves_dimensions() {
        let img = RgbImage::from_pixel(64, 64, image::Rgb([10, 20, 30]));
        let small = resample_to(&img, 16, 16).unwrap();
        assert_eq!((small.width(), small.height()), (16, 16));
        let back = resample_to(&small, 64, 64).unwrap();
        assert_eq!((back.width(), back.height()), (64, 64));
    }
}
