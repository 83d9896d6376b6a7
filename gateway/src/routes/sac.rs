//! SAC mask encoding endpoints, grounded in
//! `original_source/artorize_gateway/sac_routes.py`. The batch/job-lookup
//! endpoints operate over the same `outputs/<job_id>/layers/**` tree the
//! pipeline writes, rather than the original's separate `.npz` staging format.

use crate::error::ApiError;
use crate::state::SharedState;
use axum::extract::{Multipart, Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn sac_headers(width: u32, height: u32, length_a: usize, length_b: usize) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, "application/octet-stream".parse().unwrap());
    headers.insert(
        header::CACHE_CONTROL,
        "public, max-age=31536000, immutable".parse().unwrap(),
    );
    headers.insert("X-SAC-Width", width.to_string().parse().unwrap());
    headers.insert("X-SAC-Height", height.to_string().parse().unwrap());
    headers.insert("X-SAC-Length-A", length_a.to_string().parse().unwrap());
    headers.insert("X-SAC-Length-B", length_b.to_string().parse().unwrap());
    headers
}

/// Decodes a hi/lo mask image pair into a single-channel signed-diff array
/// and encodes it per `build_sac`: both SAC array slots carry the same
/// plane, since the mask images are single-channel (grayscale).
fn encode_hi_lo_images(hi_bytes: &[u8], lo_bytes: &[u8]) -> Result<(Vec<u8>, u32, u32, usize), ApiError> {
    let hi = image::load_from_memory(hi_bytes).map_err(|e| ApiError::BadRequest(format!("invalid mask_hi image: {e}")))?;
    let lo = image::load_from_memory(lo_bytes).map_err(|e| ApiError::BadRequest(format!("invalid mask_lo image: {e}")))?;

    if hi.dimensions() != lo.dimensions() {
        return Err(ApiError::BadRequest("mask_hi and mask_lo dimensions differ".to_string()));
    }
    let (width, height) = hi.dimensions();

    let hi_raw: Vec<u8> = hi.to_luma8().into_raw();
    let lo_raw: Vec<u8> = lo.to_luma8().into_raw();
    let diff = sac::unpack_hi_lo(&hi_raw, &lo_raw);
    let length = diff.len();
    let bytes = sac::encode(&diff, Some(&diff), width, height);
    Ok((bytes, width, height, length))
}

pub async fn encode_mask_pair(mut multipart: Multipart) -> Result<impl IntoResponse, ApiError> {
    let mut hi_bytes: Option<Vec<u8>> = None;
    let mut lo_bytes: Option<Vec<u8>> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "mask_hi" => hi_bytes = Some(field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.to_vec()),
            "mask_lo" => lo_bytes = Some(field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.to_vec()),
            _ => {}
        }
    }

    let (Some(hi), Some(lo)) = (hi_bytes, lo_bytes) else {
        return Err(ApiError::BadRequest("both mask_hi and mask_lo are required".to_string()));
    };

    let (sac_bytes, width, height, length) = encode_hi_lo_images(&hi, &lo)?;
    let headers = sac_headers(width, height, length, length);
    Ok((StatusCode::OK, headers, sac_bytes))
}

/// Request body for `/v1/sac/encode/npz`. No crate in this stack reads the
/// binary `.npz` container the Python source accepts, so the hi/lo planes
/// travel as a JSON object instead — same "container with hi+lo arrays"
/// contract, different wire format.
#[derive(Debug, Deserialize)]
pub struct NpzContainer {
    pub hi: Vec<u8>,
    pub lo: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

pub async fn encode_from_npz(Json(container): Json<NpzContainer>) -> Result<impl IntoResponse, ApiError> {
    if container.hi.len() != container.lo.len() {
        return Err(ApiError::BadRequest("hi and lo arrays must be the same length".to_string()));
    }
    let expected = (container.width as usize) * (container.height as usize);
    if expected != 0 && container.hi.len() != expected {
        return Err(ApiError::BadRequest(format!(
            "array length {} does not match width*height {}",
            container.hi.len(),
            expected
        )));
    }

    let diff = sac::unpack_hi_lo(&container.hi, &container.lo);
    let length = diff.len();
    let bytes = sac::encode(&diff, Some(&diff), container.width, container.height);
    let headers = sac_headers(container.width, container.height, length, length);
    Ok((StatusCode::OK, headers, bytes))
}

#[derive(Debug, Deserialize)]
pub struct BatchSacRequest {
    pub job_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BatchSacResponse {
    pub encoded_count: usize,
    pub failed_count: usize,
    pub total_bytes: usize,
    pub results: BTreeMap<String, serde_json::Value>,
}

/// Collects every already-encoded `.sac` mask each job produced (per-stage
/// masks plus the final-comparison mask) rather than re-deriving them from
/// hi/lo images, since the pipeline already wrote them during `pipeline::run`.
pub async fn encode_batch(State(state): State<SharedState>, Json(request): Json<BatchSacRequest>) -> Result<impl IntoResponse, ApiError> {
    let mut results = BTreeMap::new();
    let mut total_bytes = 0usize;
    let mut failed = 0usize;

    for job_id in &request.job_ids {
        match state.jobs.get_result(job_id) {
            Ok(summary) => {
                let masks: Vec<serde_json::Value> = summary
                    .layers
                    .iter()
                    .filter_map(|l| l.mask_path.as_ref())
                    .filter(|p| p.is_file())
                    .map(|p| {
                        let size = std::fs::metadata(p).map(|m| m.len()).unwrap_or(0);
                        total_bytes += size as usize;
                        serde_json::json!({ "sac_path": p.to_string_lossy(), "size_bytes": size })
                    })
                    .collect();
                if masks.is_empty() {
                    failed += 1;
                } else {
                    results.insert(job_id.clone(), serde_json::json!({ "masks": masks }));
                }
            }
            Err(_) => failed += 1,
        }
    }

    if results.is_empty() {
        return Err(ApiError::NotFound("no mask pairs found in specified jobs".to_string()));
    }

    Ok(Json(BatchSacResponse {
        encoded_count: results.len(),
        failed_count: failed,
        total_bytes,
        results,
    }))
}

pub async fn encode_job_mask(State(state): State<SharedState>, AxumPath(job_id): AxumPath<String>) -> Result<impl IntoResponse, ApiError> {
    let summary = state.jobs.get_result(&job_id)?;
    let sac_path = summary
        .layers
        .iter()
        .find(|l| l.stage == "final-comparison")
        .and_then(|l| l.mask_path.clone())
        .ok_or_else(|| ApiError::NotFound("no final-comparison mask found for job".to_string()))?;

    if !sac_path.is_file() {
        return Err(ApiError::NotFound("SAC mask file missing on disk".to_string()));
    }

    let bytes = tokio::fs::read(&sac_path).await.map_err(crate::error::IngestError::Io)?;
    let header = sac::decode_header(&bytes)?;
    let headers = sac_headers(header.width, header.height, header.length_a as usize, header.length_b as usize);
    Ok((StatusCode::OK, headers, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_multipart_body, test_state, tiny_png_bytes};
    use axum::extract::FromRequest;

    #[tokio::test]
    async fn encode_mask_pair_returns_sac_blob_with_matching_dimensions() {
        let boundary = "TestBoundaryMask";
        let png = tiny_png_bytes();
        let body = build_multipart_body(
            boundary,
            &[("mask_hi", Some("hi.png"), &png), ("mask_lo", Some("lo.png"), &png)],
        );
        let request = crate::test_support::multipart_request(boundary, body);
        let (state, _dir) = test_state();
        let multipart = Multipart::from_request(request, &state).await.unwrap();

        let response = encode_mask_pair(multipart).await.unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("X-SAC-Width").unwrap(), "8");
        assert_eq!(response.headers().get("X-SAC-Height").unwrap(), "8");
    }

    #[tokio::test]
    async fn encode_from_npz_rejects_mismatched_lengths() {
        let container = NpzContainer {
            hi: vec![0x80, 0x80],
            lo: vec![0x00],
            width: 1,
            height: 1,
        };
        let err = encode_from_npz(Json(container)).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn encode_from_npz_encodes_matching_arrays() {
        let container = NpzContainer {
            hi: vec![0x80, 0x80],
            lo: vec![0x00, 0x00],
            width: 2,
            height: 1,
        };
        let response = encode_from_npz(Json(container)).await.unwrap().into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn encode_batch_reports_not_found_when_no_jobs_match() {
        let (state, _dir) = test_state();
        let request = BatchSacRequest {
            job_ids: vec!["missing-job".to_string()],
        };
        let err = encode_batch(State(state), Json(request)).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[tokio::test]
    async fn encode_job_mask_errors_for_unknown_job() {
        let (state, _dir) = test_state();
        let err = encode_job_mask(State(state), AxumPath("missing-job".to_string())).await.unwrap_err();
        assert!(matches!(err, ApiError::Job(jobs::JobError::NotFound(_) | jobs::JobError::NotDone(_))));
    }
}
