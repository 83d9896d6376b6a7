//! Protection pipeline: orchestrates the fixed-order pixel transforms of
//! `transforms`, the SAC codec, and the signing collaborator into the
//! per-job layer/summary layout described by the persisted directory
//! structure under a job's output directory.

use collaborators::{ManifestArtifacts, ManifestConfig, ManifestSigner};
use image::RgbImage;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

mod catalogue;
mod mask;

pub use catalogue::{build_projects, ProjectEntry};
pub use mask::{write_final_comparison_sac, write_stage_mask, MaskArtifacts};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("transform error: {0}")]
    Transform(#[from] transforms::TransformError),
    #[error("codec error: {0}")]
    Codec(#[from] sac::CodecError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image decode/encode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("mask arrays do not share the same dimensions")]
    MaskDimensionMismatch,
    #[error("failed to compute or persist the final-comparison mask")]
    FinalMaskFailed,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub enabled_stages: Vec<String>,
    pub watermark_text: String,
    pub tree_ring_amplitude: f32,
    pub tree_ring_frequency: f32,
    pub max_stage_dimension: u32,
    pub seed: u64,
    pub compute_stage_masks: bool,
    pub enable_c2pa: bool,
    pub manifest_config: ManifestConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            enabled_stages: transforms::STAGE_KEYS.iter().map(|s| s.to_string()).collect(),
            watermark_text: "artscraper-protected".to_string(),
            tree_ring_amplitude: 18.0,
            tree_ring_frequency: 9.0,
            max_stage_dimension: sac::MAX_STAGE_DIMENSION,
            seed: sac::DETERMINISTIC_SEED,
            compute_stage_masks: true,
            enable_c2pa: false,
            manifest_config: ManifestConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    pub filename: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerRecord {
    pub stage: String,
    pub description: String,
    pub path: Option<PathBuf>,
    pub processing_width: u32,
    pub processing_height: u32,
    pub error: Option<String>,
    pub is_protection_layer: bool,
    pub has_sac_mask: bool,
    pub mask_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub image: ImageInfo,
    pub analysis: Option<serde_json::Value>,
    pub layers: Vec<LayerRecord>,
    pub projects: Vec<ProjectEntry>,
}

fn stage_description(key: &str) -> &'static str {
    match key {
        "fawkes" => "Adds zero-mean Gaussian noise calibrated to disrupt facial-recognition embeddings.",
        "photoguard" => "Blends a Gaussian-blurred and edge-weighted variant to degrade inpainting models.",
        "mist" => "Boosts saturation and contrast, then unsharp-masks to distort diffusion-model style transfer.",
        "nightshade" => "Rolls and blends a shifted copy with noise to poison caption/image associations.",
        "invisible-watermark" => "Embeds a steganographic watermark in pixel LSBs, least-significant bit first.",
        "tree-ring" => "Modulates pixel intensity with a radial sine pattern detectable by frequency analysis.",
        "stegano-embed" => "Embeds a terminated steganographic payload in pixel LSBs, most-significant bit first.",
        "c2pa-manifest" => "Delegates to the signing collaborator to attach provenance and licensing metadata.",
        _ => "",
    }
}

/// Runs the full protection pipeline over `input_path`, writing layer
/// files and mask artifacts under `output_dir`, and returns the summary
/// that callers persist as `summary.json`.
pub fn run(
    input_path: &Path,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<PipelineSummary, PipelineError> {
    let filename = input_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    let stem = input_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());

    let dynamic = image::open(input_path)?;
    let format = image::ImageFormat::from_path(input_path)
        .map(|f| format!("{f:?}").to_lowercase())
        .unwrap_or_else(|_| "unknown".to_string());
    let original = dynamic.to_rgb8();
    let (width, height) = original.dimensions();

    let layers_dir = output_dir.join("layers");
    let mut layers = Vec::new();

    let original_dir = layers_dir.join("00-original");
    std::fs::create_dir_all(&original_dir)?;
    let original_dest = original_dir.join(&filename);
    std::fs::copy(input_path, &original_dest)?;
    layers.push(LayerRecord {
        stage: "original".to_string(),
        description: "Unmodified input as submitted.".to_string(),
        path: Some(original_dest),
        processing_width: width,
        processing_height: height,
        error: None,
        is_protection_layer: false,
        has_sac_mask: false,
        mask_path: None,
    });

    let (working_w, working_h) = transforms::working_size(width, height, config.max_stage_dimension);
    let mut working = if (working_w, working_h) == (width, height) {
        original.clone()
    } else {
        transforms::resample_to(&original, working_w, working_h)?
    };

    let mut last_full_size = original.clone();
    let mut stage_index: u32 = 1;

    for (i, key) in transforms::STAGE_KEYS.iter().enumerate() {
        if !config.enabled_stages.iter().any(|s| s == key) {
            continue;
        }
        let seed = config.seed.wrapping_add(i as u64 + 1);
        let outcome = apply_stage(key, &working, seed, config);

        let dir = layers_dir.join(format!("{stage_index:02}-{key}"));
        match outcome {
            Ok(stage_working) => {
                let full_size = if (working_w, working_h) == (width, height) {
                    stage_working.clone()
                } else {
                    transforms::resample_to(&stage_working, width, height)?
                };

                std::fs::create_dir_all(&dir)?;
                let layer_path = dir.join(&filename);
                full_size.save(&layer_path)?;

                let mask_path = if config.compute_stage_masks {
                    match mask::write_stage_mask(&dir, &stem, key, &last_full_size, &full_size) {
                        Ok(artifacts) => Some(artifacts.sac_path),
                        Err(e) => {
                            log::warn!("stage {key} mask computation failed: {e}");
                            None
                        }
                    }
                } else {
                    None
                };

                layers.push(LayerRecord {
                    stage: key.to_string(),
                    description: stage_description(key).to_string(),
                    path: Some(layer_path),
                    processing_width: working_w,
                    processing_height: working_h,
                    error: None,
                    is_protection_layer: true,
                    has_sac_mask: mask_path.is_some(),
                    mask_path,
                });

                working = stage_working;
                last_full_size = full_size;
            }
            Err(e) => {
                log::error!("stage {key} failed: {e}");
                layers.push(LayerRecord {
                    stage: key.to_string(),
                    description: stage_description(key).to_string(),
                    path: layers.last().and_then(|l| l.path.clone()),
                    processing_width: working_w,
                    processing_height: working_h,
                    error: Some(e.to_string()),
                    is_protection_layer: true,
                    has_sac_mask: false,
                    mask_path: None,
                });
            }
        }
        stage_index += 1;
    }

    if config.enable_c2pa {
        let c2pa_dir = output_dir.join("c2pa");
        let source_for_signing = layers
            .iter()
            .rev()
            .find(|l| l.is_protection_layer && l.error.is_none())
            .and_then(|l| l.path.clone())
            .unwrap_or_else(|| original_dest_fallback(&layers));

        let signer = collaborators::LocalManifestSigner::new();
        match signer.sign(&source_for_signing, &c2pa_dir, &config.manifest_config, None) {
            Ok(artifacts) => {
                layers.push(c2pa_layer_record(Some(&artifacts), None, working_w, working_h));
            }
            Err(e) => {
                log::warn!("c2pa-manifest signing failed, falling back to last protected layer: {e}");
                layers.push(c2pa_layer_record(None, Some(e.to_string()), working_w, working_h));
            }
        }
    }

    let final_dir = layers_dir.join(format!("{:02}-final-comparison", stage_index));
    let final_sac_path = mask::write_final_comparison_sac(&final_dir, &stem, &original, &last_full_size)
        .map_err(|_| PipelineError::FinalMaskFailed)?;
    layers.push(LayerRecord {
        stage: "final-comparison".to_string(),
        description: "Signed difference between the original input and the final protected layer.".to_string(),
        path: None,
        processing_width: width,
        processing_height: height,
        error: None,
        is_protection_layer: false,
        has_sac_mask: true,
        mask_path: Some(final_sac_path),
    });

    let projects = catalogue::build_projects(&layers);

    let summary = PipelineSummary {
        image: ImageInfo {
            filename,
            width,
            height,
            format,
        },
        analysis: None,
        layers,
        projects,
    };

    let summary_path = output_dir.join("summary.json");
    std::fs::write(&summary_path, serde_json::to_string_pretty(&summary).unwrap_or_default())?;

    Ok(summary)
}

fn original_dest_fallback(layers: &[LayerRecord]) -> PathBuf {
    layers
        .first()
        .and_then(|l| l.path.clone())
        .unwrap_or_default()
}

fn c2pa_layer_record(
    artifacts: Option<&ManifestArtifacts>,
    error: Option<String>,
    width: u32,
    height: u32,
) -> LayerRecord {
    LayerRecord {
        stage: "c2pa-manifest".to_string(),
        description: stage_description("c2pa-manifest").to_string(),
        path: artifacts.map(|a| a.signed_path.clone()),
        processing_width: width,
        processing_height: height,
        error,
        is_protection_layer: true,
        has_sac_mask: false,
        mask_path: None,
    }
}

fn apply_stage(
    key: &str,
    working: &RgbImage,
    seed: u64,
    config: &PipelineConfig,
) -> Result<RgbImage, transforms::TransformError> {
    match key {
        "fawkes" => transforms::fawkes(working, seed),
        "photoguard" => transforms::photoguard(working),
        "mist" => transforms::mist(working),
        "nightshade" => transforms::nightshade(working, seed),
        "invisible-watermark" => transforms::invisible_watermark(working, &config.watermark_text),
        "tree-ring" => transforms::tree_ring(working, config.tree_ring_amplitude, config.tree_ring_frequency),
        "stegano-embed" => transforms::stegano_embed(working, &config.watermark_text),
        _ => Ok(working.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_test_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]));
        let path = dir.join(name);
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn original_layer_is_always_first_and_preserves_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_png(dir.path(), "in.png", 32, 32);
        let out_dir = dir.path().join("out");

        let config = PipelineConfig {
            enabled_stages: Vec::new(),
            enable_c2pa: false,
            ..PipelineConfig::default()
        };
        let summary = run(&input, &out_dir, &config).unwrap();

        assert_eq!(summary.layers.first().unwrap().stage, "original");
        assert_eq!(summary.layers.last().unwrap().stage, "final-comparison");
        let original_bytes = std::fs::read(&input).unwrap();
        let saved_bytes = std::fs::read(summary.layers[0].path.as_ref().unwrap()).unwrap();
        assert_eq!(original_bytes, saved_bytes);
    }

    #[test]
    fn stages_run_in_fixed_order_and_produce_files() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_png(dir.path(), "in.png", 48, 32);
        let out_dir = dir.path().join("out");

        let config = PipelineConfig::default();
        let summary = run(&input, &out_dir, &config).unwrap();

        let stage_names: Vec<&str> = summary.layers.iter().map(|l| l.stage.as_str()).collect();
        assert_eq!(stage_names[0], "original");
        assert_eq!(
            &stage_names[1..8],
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
        assert_eq!(stage_names.last().unwrap(), &"final-comparison");

        for layer in &summary.layers {
            if layer.stage == "final-comparison" || layer.stage == "original" {
                continue;
            }
            assert!(layer.error.is_none());
            assert!(layer.path.as_ref().unwrap().is_file());
        }
    }

    #[test]
    fn final_comparison_mask_reconstructs_original_exactly() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_png(dir.path(), "in.png", 40, 40);
        let out_dir = dir.path().join("out");

        let summary = run(&input, &out_dir, &PipelineConfig::default()).unwrap();
        let final_layer = summary.layers.last().unwrap();
        let mask_bytes = std::fs::read(final_layer.mask_path.as_ref().unwrap()).unwrap();
        let blob = sac::decode(&mask_bytes).unwrap();

        let last_protected_layer = summary
            .layers
            .iter()
            .rev()
            .find(|l| l.is_protection_layer && l.error.is_none())
            .unwrap();
        let protected = image::open(last_protected_layer.path.as_ref().unwrap())
            .unwrap()
            .to_rgb8();
        let original = image::open(&input).unwrap().to_rgb8();

        let reconstructed = blob.reconstruct(protected.as_raw());
        assert_eq!(reconstructed, original.into_raw());
    }

    #[test]
    fn disabling_a_stage_does_not_reorder_others() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_png(dir.path(), "in.png", 32, 32);
        let out_dir = dir.path().join("out");

        let mut config = PipelineConfig::default();
        config.enabled_stages.retain(|s| s != "mist");
        let summary = run(&input, &out_dir, &config).unwrap();

        let stage_names: Vec<&str> = summary.layers.iter().map(|l| l.stage.as_str()).collect();
        assert!(!stage_names.contains(&"mist"));
        assert_eq!(
            &stage_names[1..7],
            &[
                "fawkes",
                "photoguard",
                "nightshade",
                "invisible-watermark",
                "tree-ring",
                "stegano-embed",
            ]
        );
    }
}
