//! Static project catalogue, grounded in
//! `original_source/artorize_runner/protection_pipeline.py`'s
//! `PROJECT_CATALOGUE`. Every entry is emitted in `summary.json.projects`
//! regardless of which stages actually ran, so the shape of the field is
//! stable across configurations.

use crate::LayerRecord;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ProjectEntry {
    pub name: String,
    pub applied: bool,
    pub evidence: String,
}

struct CatalogueItem {
    name: &'static str,
    stage_key: Option<&'static str>,
    gap_note: Option<&'static str>,
}

const CATALOGUE: &[CatalogueItem] = &[
    CatalogueItem {
        name: "fawkes",
        stage_key: Some("fawkes"),
        gap_note: None,
    },
    CatalogueItem {
        name: "photoguard",
        stage_key: Some("photoguard"),
        gap_note: None,
    },
    CatalogueItem {
        name: "mist",
        stage_key: Some("mist"),
        gap_note: None,
    },
    CatalogueItem {
        name: "nightshade",
        stage_key: Some("nightshade"),
        gap_note: None,
    },
    CatalogueItem {
        name: "glaze",
        stage_key: None,
        gap_note: Some("glaze is a style-transfer variant of mist's contract; no distinct transform is implemented"),
    },
    CatalogueItem {
        name: "watermark",
        stage_key: Some("invisible-watermark"),
        gap_note: None,
    },
    CatalogueItem {
        name: "tree-ring",
        stage_key: Some("tree-ring"),
        gap_note: None,
    },
    CatalogueItem {
        name: "stegano",
        stage_key: Some("stegano-embed"),
        gap_note: None,
    },
    CatalogueItem {
        name: "c2pa",
        stage_key: Some("c2pa-manifest"),
        gap_note: None,
    },
];

/// Builds the `projects` matrix from the layer records a run actually
/// produced. A catalogue entry is `applied` when its stage exists among
/// the layers and recorded no error.
pub fn build_projects(layers: &[LayerRecord]) -> Vec<ProjectEntry> {
    CATALOGUE
        .iter()
        .map(|item| match item.stage_key {
            None => ProjectEntry {
                name: item.name.to_string(),
                applied: false,
                evidence: item
                    .gap_note
                    .unwrap_or("no pixel-transform counterpart implemented")
                    .to_string(),
            },
            Some(stage_key) => match layers.iter().find(|l| l.stage == stage_key) {
                Some(layer) if layer.error.is_none() => ProjectEntry {
                    name: item.name.to_string(),
                    applied: true,
                    evidence: format!(
                        "layers/{stage}/{path}",
                        stage = stage_key,
                        path = layer
                            .path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default()
                    ),
                },
                Some(layer) => ProjectEntry {
                    name: item.name.to_string(),
                    applied: false,
                    evidence: format!(
                        "stage {stage_key} failed: {}",
                        layer.error.clone().unwrap_or_default()
                    ),
                },
                None => ProjectEntry {
                    name: item.name.to_string(),
                    applied: false,
                    evidence: format!("stage {stage_key} disabled for this run"),
                },
            },
        })
        .collect()
}
