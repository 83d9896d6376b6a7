//! Reversibility-mask artifact writer, supplemented from
//! `original_source/processors/poison_mask/processor.py`: every protection
//! stage (and the final comparison) persists its signed difference as a
//! hi/lo PNG pair plus a `.sac` blob, not just the `.sac` alone.

use crate::PipelineError;
use image::RgbImage;
use std::path::{Path, PathBuf};

pub struct MaskArtifacts {
    pub hi_path: PathBuf,
    pub lo_path: PathBuf,
    pub sac_path: PathBuf,
}

/// Computes `before - after` per sample and writes the hi/lo PNG pair plus
/// the `.sac` encoding into `dir`, named `<stem>_<label>_mask_*`.
pub fn write_stage_mask(
    dir: &Path,
    stem: &str,
    label: &str,
    before: &RgbImage,
    after: &RgbImage,
) -> Result<MaskArtifacts, PipelineError> {
    if before.dimensions() != after.dimensions() {
        return Err(PipelineError::MaskDimensionMismatch);
    }
    std::fs::create_dir_all(dir)?;

    let (width, height) = before.dimensions();
    let diff = sac::signed_diff(before.as_raw(), after.as_raw());
    let (hi_bytes, lo_bytes) = sac::pack_hi_lo(&diff);

    let hi_img = RgbImage::from_raw(width, height, hi_bytes)
        .ok_or(PipelineError::MaskDimensionMismatch)?;
    let lo_img = RgbImage::from_raw(width, height, lo_bytes)
        .ok_or(PipelineError::MaskDimensionMismatch)?;

    let hi_path = dir.join(format!("{stem}_{label}_mask_hi.png"));
    let lo_path = dir.join(format!("{stem}_{label}_mask_lo.png"));
    hi_img.save(&hi_path)?;
    lo_img.save(&lo_path)?;

    let sac_path = dir.join(format!("{stem}_{label}_mask.sac"));
    let blob = sac::encode(&diff, None, width, height);
    std::fs::write(&sac_path, blob)?;

    Ok(MaskArtifacts {
        hi_path,
        lo_path,
        sac_path,
    })
}

/// Writes only the `.sac` blob for the final-comparison mask (no hi/lo
/// pair is specified for this artifact in the persisted layout).
pub fn write_final_comparison_sac(
    dir: &Path,
    stem: &str,
    original: &RgbImage,
    protected: &RgbImage,
) -> Result<PathBuf, PipelineError> {
    if original.dimensions() != protected.dimensions() {
        return Err(PipelineError::MaskDimensionMismatch);
    }
    std::fs::create_dir_all(dir)?;

    let (width, height) = original.dimensions();
    let diff = sac::signed_diff(original.as_raw(), protected.as_raw());
    let blob = sac::encode(&diff, None, width, height);

    let sac_path = dir.join(format!("{stem}_final-comparison_mask.sac"));
    std::fs::write(&sac_path, blob)?;
    Ok(sac_path)
}
