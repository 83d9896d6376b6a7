//! Object-store collaborator, grounded in
//! `original_source/artorize_gateway/image_storage.py`'s local-storage
//! branch. The S3 branch is out of scope (external credentials) but the
//! trait seam is identical, so a future implementor can add one without
//! touching callers.

use async_trait::async_trait;
use image::imageops::FilterType;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    pub protected_image_url: String,
    pub thumbnail_url: String,
    pub sac_mask_url: Option<String>,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("source image not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("thumbnail generation failed: {0}")]
    Thumbnail(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload_protected_image(
        &self,
        image_path: &Path,
        job_id: &str,
        image_format: &str,
        sac_path: Option<&Path>,
    ) -> Result<UploadedImage, StoreError>;
}

const THUMBNAIL_MAX_SIZE: u32 = 300;

pub struct LocalObjectStore {
    output_dir: PathBuf,
    base_url: String,
}

impl LocalObjectStore {
    pub fn new(output_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn upload_protected_image(
        &self,
        image_path: &Path,
        job_id: &str,
        image_format: &str,
        sac_path: Option<&Path>,
    ) -> Result<UploadedImage, StoreError> {
        if !image_path.is_file() {
            return Err(StoreError::SourceNotFound(image_path.to_path_buf()));
        }

        let protected_dir = self.output_dir.join("protected");
        let thumbnails_dir = self.output_dir.join("thumbnails");
        tokio::fs::create_dir_all(&protected_dir).await?;
        tokio::fs::create_dir_all(&thumbnails_dir).await?;

        let full_filename = format!("{job_id}.{image_format}");
        let thumb_filename = format!("{job_id}_thumb.{image_format}");
        let full_path = protected_dir.join(&full_filename);
        let thumb_path = thumbnails_dir.join(&thumb_filename);

        tokio::fs::copy(image_path, &full_path).await?;

        let source = image_path.to_path_buf();
        let thumb_dest = thumb_path.clone();
        tokio::task::spawn_blocking(move || generate_thumbnail(&source, &thumb_dest))
            .await
            .map_err(|e| StoreError::Thumbnail(e.to_string()))??;

        let mut sac_mask_url = None;
        if let Some(sac_path) = sac_path {
            if sac_path.is_file() {
                let masks_dir = self.output_dir.join("masks");
                tokio::fs::create_dir_all(&masks_dir).await?;
                let mask_filename = format!("{job_id}.sac");
                let mask_dest = masks_dir.join(&mask_filename);
                tokio::fs::copy(sac_path, &mask_dest).await?;
                sac_mask_url = Some(format!("{}/masks/{}", self.base_url, mask_filename));
            }
        }

        Ok(UploadedImage {
            protected_image_url: format!("{}/protected/{}", self.base_url, full_filename),
            thumbnail_url: format!("{}/thumbnails/{}", self.base_url, thumb_filename),
            sac_mask_url,
        })
    }
}

fn generate_thumbnail(source: &Path, dest: &Path) -> Result<(), StoreError> {
    let img = image::open(source).map_err(|e| StoreError::Thumbnail(e.to_string()))?;
    let rgb = img.to_rgb8();
    let resized = image::DynamicImage::ImageRgb8(rgb).resize(
        THUMBNAIL_MAX_SIZE,
        THUMBNAIL_MAX_SIZE,
        FilterType::Lanczos3,
    );
    resized
        .save(dest)
        .map_err(|e| StoreError::Thumbnail(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn upload_of_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path(), "http://localhost:8000/v1/storage");
        let result = store
            .upload_protected_image(Path::new("/does/not/exist.png"), "job1", "png", None)
            .await;
        assert!(matches!(result, Err(StoreError::SourceNotFound(_))));
    }
}
