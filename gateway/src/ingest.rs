//! Image-input helpers shared across routes, grounded in
//! `original_source/artorize_gateway/input_utils.py`.

use crate::error::IngestError;
use std::path::{Path, PathBuf};

/// Streams `url` into `dest`, following redirects, under `timeout`.
pub async fn download_to_path(client: &reqwest::Client, url: &str, dest: &Path) -> Result<(), IngestError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?
        .error_for_status()
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| IngestError::DownloadFailed(e.to_string()))?;
    tokio::fs::write(dest, &bytes).await?;
    Ok(())
}

/// Expands `~` and resolves `raw` to an absolute path, failing if it is not a regular file.
pub fn resolve_local_path(raw: &str) -> Result<PathBuf, IngestError> {
    let expanded = if let Some(rest) = raw.strip_prefix("~/") {
        dirs_home().join(rest)
    } else if raw == "~" {
        dirs_home()
    } else {
        PathBuf::from(raw)
    };

    let resolved = expanded
        .canonicalize()
        .unwrap_or(expanded);

    if resolved.is_file() {
        Ok(resolved)
    } else {
        Err(IngestError::LocalPathNotFound(resolved))
    }
}

fn dirs_home() -> PathBuf {
    std::env::var_os("HOME").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("/"))
}

/// Splits a comma-separated form field into a trimmed, non-empty list.
pub fn parse_comma_separated(raw: Option<&str>) -> Option<Vec<String>> {
    let raw = raw?;
    let items: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

/// Parses a form-encoded boolean (`1`, `true`, `yes`, `on`), case-insensitively.
pub fn boolean_from_form(value: Option<&str>, default: bool) -> bool {
    match value {
        None => default,
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
    }
}

/// Extracts the filename's extension (with leading dot), defaulting to `.bin`.
pub fn suffix_of(filename: Option<&str>) -> String {
    let name = filename.unwrap_or("image");
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_else(|| ".bin".to_string())
}
