//! Hash extraction and similarity-search routes, grounded in
//! `original_source/artorize_gateway/similarity_routes.py`.

use crate::error::{ApiError, IngestError};
use crate::ingest::{download_to_path, resolve_local_path};
use crate::state::SharedState;
use axum::extract::{FromRequest, Multipart, State};
use axum::Json;
use collaborators::{HashProcessor, LocalHashProcessor, SimilarityBackend};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, Default)]
pub struct HashExtractionPayload {
    pub image_url: Option<String>,
    pub local_path: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HashExtractionResponse {
    pub hashes: BTreeMap<String, String>,
    pub metadata: collaborators::ImageMetadata,
}

#[derive(Debug, Deserialize, Default)]
pub struct SimilaritySearchPayload {
    pub image_url: Option<String>,
    pub local_path: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_threshold() -> f32 {
    0.85
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Serialize)]
pub struct SimilaritySearchResponse {
    pub query_hashes: BTreeMap<String, String>,
    pub similar_images: Vec<serde_json::Value>,
    pub total_matches: usize,
    pub search_time_ms: u64,
}

/// Materializes an input image (multipart field named `file`, or a JSON
/// payload with `image_url`/`local_path`) to a local path, downloading or
/// copying as needed under a scratch directory that the caller removes.
async fn materialize_input(
    state: &SharedState,
    multipart: Option<Multipart>,
    image_url: Option<&str>,
    local_path: Option<&str>,
) -> Result<(std::path::PathBuf, Option<tempfile::TempDir>), ApiError> {
    if let Some(mut multipart) = multipart {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?
        {
            if field.name() == Some("file") {
                let suffix = crate::ingest::suffix_of(field.file_name());
                let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                let dir = tempfile::tempdir().map_err(IngestError::Io)?;
                let path = dir.path().join(format!("input{suffix}"));
                tokio::fs::write(&path, &bytes).await.map_err(IngestError::Io)?;
                return Ok((path, Some(dir)));
            }
        }
        return Err(ApiError::Ingest(IngestError::MissingFile));
    }

    if let Some(local_path) = local_path {
        let path = resolve_local_path(local_path)?;
        return Ok((path, None));
    }
    if let Some(url) = image_url {
        let dir = tempfile::tempdir().map_err(IngestError::Io)?;
        let suffix = crate::ingest::suffix_of(Some(url));
        let path = dir.path().join(format!("input{suffix}"));
        download_to_path(&state.download_client, url, &path).await?;
        return Ok((path, Some(dir)));
    }

    Err(ApiError::Ingest(IngestError::MissingFile))
}

fn is_multipart(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

pub async fn extract_hashes(
    State(state): State<SharedState>,
    request: axum::extract::Request,
) -> Result<Json<HashExtractionResponse>, ApiError> {
    let multipart_flag = is_multipart(request.headers());
    let (path, _scratch) = if multipart_flag {
        let multipart = axum::extract::Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        materialize_input(&state, Some(multipart), None, None).await?
    } else {
        let bytes = axum::body::Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let payload: HashExtractionPayload = if bytes.is_empty() {
            HashExtractionPayload::default()
        } else {
            serde_json::from_slice(&bytes).map_err(IngestError::MalformedMetadata)?
        };
        materialize_input(&state, None, payload.image_url.as_deref(), payload.local_path.as_deref()).await?
    };

    let img = image::open(&path).map_err(|e| ApiError::BadRequest(format!("failed to decode image: {e}")))?;
    let format = image::ImageFormat::from_path(&path).ok().map(|f| format!("{f:?}"));
    let processor = LocalHashProcessor::new();
    let extracted = processor.extract(&img, format.as_deref());

    if let Some(error) = extracted.error {
        return Err(ApiError::BadRequest(error));
    }

    Ok(Json(HashExtractionResponse {
        hashes: extracted.hashes,
        metadata: extracted.metadata,
    }))
}

pub async fn find_similar(
    State(state): State<SharedState>,
    request: axum::extract::Request,
) -> Result<Json<SimilaritySearchResponse>, ApiError> {
    let multipart_flag = is_multipart(request.headers());
    let (path, _scratch, threshold, limit) = if multipart_flag {
        let multipart = axum::extract::Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let (path, scratch) = materialize_input(&state, Some(multipart), None, None).await?;
        (path, scratch, default_threshold(), default_limit())
    } else {
        let bytes = axum::body::Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let payload: SimilaritySearchPayload = if bytes.is_empty() {
            SimilaritySearchPayload {
                threshold: default_threshold(),
                limit: default_limit(),
                ..Default::default()
            }
        } else {
            serde_json::from_slice(&bytes).map_err(IngestError::MalformedMetadata)?
        };
        let (path, scratch) =
            materialize_input(&state, None, payload.image_url.as_deref(), payload.local_path.as_deref()).await?;
        (path, scratch, payload.threshold, payload.limit)
    };

    if !(0.0..=1.0).contains(&threshold) {
        return Err(ApiError::BadRequest("threshold must be between 0.0 and 1.0".to_string()));
    }
    if limit < 1 || limit > 100 {
        return Err(ApiError::BadRequest("limit must be between 1 and 100".to_string()));
    }

    let img = image::open(&path).map_err(|e| ApiError::BadRequest(format!("failed to decode image: {e}")))?;
    let format = image::ImageFormat::from_path(&path).ok().map(|f| format!("{f:?}"));
    let processor = LocalHashProcessor::new();
    let extracted = processor.extract(&img, format.as_deref());
    if let Some(error) = extracted.error {
        return Err(ApiError::BadRequest(error));
    }

    let search_result = state
        .similarity_backend
        .search(&extracted.hashes, threshold, limit)
        .await?;

    Ok(Json(SimilaritySearchResponse {
        query_hashes: extracted.hashes,
        similar_images: search_result.similar_images,
        total_matches: search_result.total_matches,
        search_time_ms: search_result.search_time_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_multipart_body, multipart_request, test_state, tiny_png_bytes};

    #[tokio::test]
    async fn extract_hashes_from_multipart_file() {
        let boundary = "TestBoundaryHash";
        let body = build_multipart_body(boundary, &[("file", Some("input.png"), &tiny_png_bytes())]);
        let request = multipart_request(boundary, body);
        let (state, _dir) = test_state();

        let Json(response) = extract_hashes(State(state), request).await.unwrap();
        assert!(!response.hashes.is_empty());
    }

    #[tokio::test]
    async fn find_similar_without_backend_configured_is_unavailable() {
        let boundary = "TestBoundarySimilar";
        let body = build_multipart_body(boundary, &[("file", Some("input.png"), &tiny_png_bytes())]);
        let request = multipart_request(boundary, body);
        let (state, _dir) = test_state();

        let err = find_similar(State(state), request).await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Similarity(collaborators::SimilarityError::NotConfigured)
        ));
    }

    #[tokio::test]
    async fn find_similar_rejects_out_of_range_threshold() {
        let (state, dir) = test_state();
        let input_path = dir.path().join("input.png");
        std::fs::write(&input_path, tiny_png_bytes()).unwrap();

        let payload = serde_json::json!({ "local_path": input_path.to_string_lossy(), "threshold": 1.5 });
        let request = crate::test_support::json_request(payload);

        let err = find_similar(State(state), request).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }
}
