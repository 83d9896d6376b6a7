//! Job submission, status, result, and layer-retrieval routes, grounded
//! in `original_source/artorize_gateway/app.py`'s `submit_job`,
//! `process_artwork`, `get_status`, `get_result`, `get_layer`, and
//! `delete_job` handlers.

use crate::error::{ApiError, IngestError};
use crate::ingest::{boolean_from_form, download_to_path, parse_comma_separated, resolve_local_path, suffix_of};
use crate::state::SharedState;
use axum::body::Bytes;
use axum::extract::{FromRequest, Multipart, Path as AxumPath, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobs::{JobId, NewJobRequest};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct JobCreateResponse {
    pub job_id: JobId,
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: JobId,
    pub status: String,
    pub submitted_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobResultResponse {
    pub job_id: JobId,
    pub summary: pipeline::PipelineSummary,
    pub output_dir: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct JobPayload {
    pub image_url: Option<String>,
    pub local_path: Option<String>,
    pub processors: Option<Vec<String>>,
    pub include_hash_analysis: Option<bool>,
    pub include_protection: Option<bool>,
    pub enable_tineye: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct ArtworkMetadata {
    pub job_id: Option<String>,
    pub artist_name: Option<String>,
    pub artwork_title: Option<String>,
    pub callback_url: String,
    pub callback_auth_token: String,
    pub processors: Option<Vec<String>>,
    pub watermark_strategy: Option<String>,
    pub watermark_strength: Option<f32>,
    pub tags: Option<Vec<String>>,
    pub backend_url: Option<String>,
    pub backend_auth_token: Option<String>,
    pub artwork_description: Option<String>,
    pub artwork_creation_time: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessArtworkResponse {
    pub job_id: JobId,
    pub status: String,
    pub estimated_time_seconds: u32,
    pub message: String,
}

fn is_multipart(request: &Request) -> bool {
    request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("multipart/form-data"))
        .unwrap_or(false)
}

pub async fn submit_job(State(state): State<SharedState>, request: Request) -> Result<Json<JobCreateResponse>, ApiError> {
    if is_multipart(&request) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        submit_from_multipart(state, multipart).await
    } else {
        let bytes = Bytes::from_request(request, &state)
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ApiError::Ingest(IngestError::MissingFile));
        }
        let payload: JobPayload = serde_json::from_slice(&bytes).map_err(IngestError::MalformedMetadata)?;
        submit_from_payload(state, payload).await
    }
}

async fn submit_from_multipart(state: SharedState, mut multipart: Multipart) -> Result<Json<JobCreateResponse>, ApiError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut include_hash_analysis: Option<String> = None;
    let mut include_protection: Option<String> = None;
    let mut enable_tineye: Option<String> = None;
    let mut processors: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                file_bytes = Some(field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.to_vec());
            }
            "include_hash_analysis" => include_hash_analysis = Some(field.text().await.unwrap_or_default()),
            "include_protection" => include_protection = Some(field.text().await.unwrap_or_default()),
            "enable_tineye" => enable_tineye = Some(field.text().await.unwrap_or_default()),
            "processors" => processors = Some(field.text().await.unwrap_or_default()),
            _ => {}
        }
    }

    let Some(bytes) = file_bytes else {
        return Err(ApiError::Ingest(IngestError::MissingFile));
    };

    let req = NewJobRequest {
        suffix: suffix_of(filename.as_deref()),
        include_hash_analysis: boolean_from_form(include_hash_analysis.as_deref(), true),
        include_protection: boolean_from_form(include_protection.as_deref(), true),
        enable_tineye: boolean_from_form(enable_tineye.as_deref(), false),
        processors: parse_comma_separated(processors.as_deref()),
        ..Default::default()
    };

    let record = state.jobs.submit(std::io::Cursor::new(bytes), req).await?;
    Ok(Json(JobCreateResponse {
        job_id: record.job_id,
        status: record.status.to_string(),
    }))
}

async fn submit_from_payload(state: SharedState, payload: JobPayload) -> Result<Json<JobCreateResponse>, ApiError> {
    if payload.image_url.is_none() && payload.local_path.is_none() {
        return Err(ApiError::BadRequest("image_url or local_path required".to_string()));
    }
    if payload.image_url.is_some() && payload.local_path.is_some() {
        return Err(ApiError::Ingest(IngestError::ConflictingSources));
    }

    let (bytes, suffix) = if let Some(local_path) = &payload.local_path {
        let source = resolve_local_path(local_path)?;
        let suffix = suffix_of(source.file_name().and_then(|n| n.to_str()));
        let bytes = tokio::fs::read(&source).await.map_err(IngestError::Io)?;
        (bytes, suffix)
    } else {
        let url = payload.image_url.as_ref().unwrap();
        let suffix = suffix_of(Some(url));
        let tmp = tempfile::NamedTempFile::new().map_err(IngestError::Io)?;
        download_to_path(&state.download_client, url, tmp.path()).await?;
        let bytes = tokio::fs::read(tmp.path()).await.map_err(IngestError::Io)?;
        (bytes, suffix)
    };

    let req = NewJobRequest {
        suffix,
        include_hash_analysis: payload.include_hash_analysis.unwrap_or(true),
        include_protection: payload.include_protection.unwrap_or(true),
        enable_tineye: payload.enable_tineye.unwrap_or(false),
        processors: payload.processors,
        ..Default::default()
    };

    let record = state.jobs.submit(std::io::Cursor::new(bytes), req).await?;
    Ok(Json(JobCreateResponse {
        job_id: record.job_id,
        status: record.status.to_string(),
    }))
}

pub async fn process_artwork(State(state): State<SharedState>, mut multipart: Multipart) -> Result<(StatusCode, Json<ProcessArtworkResponse>), ApiError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut filename: Option<String> = None;
    let mut metadata_json: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                file_bytes = Some(field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?.to_vec());
            }
            "metadata" => metadata_json = Some(field.text().await.unwrap_or_default()),
            _ => {}
        }
    }

    let Some(bytes) = file_bytes else {
        return Err(ApiError::Ingest(IngestError::MissingFile));
    };
    let Some(metadata_json) = metadata_json else {
        return Err(ApiError::BadRequest("metadata JSON required".to_string()));
    };
    let metadata: ArtworkMetadata = serde_json::from_str(&metadata_json).map_err(IngestError::MalformedMetadata)?;

    if metadata.backend_url.is_some() && metadata.backend_auth_token.is_none() {
        return Err(ApiError::BadRequest(
            "backend_auth_token is required when backend_url is provided".to_string(),
        ));
    }

    let req = NewJobRequest {
        suffix: suffix_of(filename.as_deref()),
        include_hash_analysis: true,
        include_protection: true,
        enable_tineye: false,
        processors: metadata.processors,
        callback_url: Some(metadata.callback_url),
        callback_auth_token: Some(metadata.callback_auth_token),
        backend_url: metadata.backend_url,
        backend_auth_token: metadata.backend_auth_token,
        artist_name: metadata.artist_name,
        artwork_title: metadata.artwork_title,
        artwork_description: metadata.artwork_description,
        artwork_tags: metadata.tags.unwrap_or_default(),
        artwork_creation_time: metadata.artwork_creation_time,
        watermark_strategy: metadata.watermark_strategy,
        watermark_strength: metadata.watermark_strength,
    };

    let record = state.jobs.submit(std::io::Cursor::new(bytes), req).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ProcessArtworkResponse {
            job_id: record.job_id,
            status: "processing".to_string(),
            estimated_time_seconds: 45,
            message: "Job queued for processing. Callback will be sent upon completion.".to_string(),
        }),
    ))
}

pub async fn get_status(State(state): State<SharedState>, AxumPath(job_id): AxumPath<String>) -> Result<Json<JobStatusResponse>, ApiError> {
    let record = state.jobs.get_status(&job_id)?;
    Ok(Json(JobStatusResponse {
        job_id: record.job_id,
        status: record.status.to_string(),
        submitted_at: record.submitted_at,
        updated_at: record.updated_at,
        error: record.error,
    }))
}

pub async fn get_result(State(state): State<SharedState>, AxumPath(job_id): AxumPath<String>) -> Result<Json<JobResultResponse>, ApiError> {
    let record = state.jobs.get_status(&job_id)?;
    let summary = state.jobs.get_result(&job_id)?;
    Ok(Json(JobResultResponse {
        job_id: record.job_id,
        output_dir: record.output_root.to_string_lossy().into_owned(),
        summary,
    }))
}

pub async fn get_layer(
    State(state): State<SharedState>,
    AxumPath((job_id, stage)): AxumPath<(String, String)>,
) -> Result<Response, ApiError> {
    let path = state
        .jobs
        .get_layer_path(&job_id, &stage)?
        .ok_or_else(|| ApiError::NotFound(format!("layer not found: {stage}")))?;

    if !path.is_file() {
        return Err(ApiError::NotFound("layer file missing".to_string()));
    }

    let bytes = tokio::fs::read(&path).await.map_err(IngestError::Io)?;
    let content_type = guess_content_type(&path);
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type)],
        bytes,
    )
        .into_response())
}

pub async fn delete_job(State(state): State<SharedState>, AxumPath(job_id): AxumPath<String>) -> Result<Json<serde_json::Value>, ApiError> {
    state.jobs.delete(&job_id).await?;
    Ok(Json(serde_json::json!({ "job_id": job_id, "status": "deleted" })))
}

fn guess_content_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("sac") => "application/octet-stream",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::test_support::{build_multipart_body, json_request, multipart_request, test_state, tiny_png_bytes};
    use axum::extract::State;

    #[tokio::test]
    async fn submit_from_payload_rejects_missing_source() {
        let (state, _dir) = test_state();
        let err = submit_from_payload(state, JobPayload::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn submit_from_payload_rejects_conflicting_sources() {
        let (state, _dir) = test_state();
        let payload = JobPayload {
            image_url: Some("https://example.com/a.png".to_string()),
            local_path: Some("/tmp/a.png".to_string()),
            ..Default::default()
        };
        let err = submit_from_payload(state, payload).await.unwrap_err();
        assert!(matches!(err, ApiError::Ingest(IngestError::ConflictingSources)));
    }

    #[tokio::test]
    async fn submit_job_json_with_local_path_queues_job() {
        let (state, dir) = test_state();
        let input_path = dir.path().join("source.png");
        std::fs::write(&input_path, tiny_png_bytes()).unwrap();

        let body = serde_json::json!({ "local_path": input_path.to_string_lossy() });
        let request = json_request(body);

        let Json(response) = submit_job(State(state.clone()), request).await.unwrap();
        assert_eq!(response.status, "queued");

        let record = state.jobs.get_status(&response.job_id).unwrap();
        assert_eq!(record.job_id, response.job_id);
    }

    #[tokio::test]
    async fn submit_job_multipart_with_file_field_queues_job() {
        let (state, _dir) = test_state();
        let boundary = "TestBoundary123";
        let body = build_multipart_body(
            boundary,
            &[("file", Some("upload.png"), &tiny_png_bytes())],
        );
        let request = multipart_request(boundary, body);

        let Json(response) = submit_job(State(state), request).await.unwrap();
        assert_eq!(response.status, "queued");
    }

    #[tokio::test]
    async fn get_status_unknown_job_is_not_found() {
        let (state, _dir) = test_state();
        let err = get_status(State(state), AxumPath("missing".to_string())).await.unwrap_err();
        assert!(matches!(err, ApiError::Job(jobs::JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn get_result_before_completion_is_conflict() {
        let (state, dir) = test_state();
        let input_path = dir.path().join("source.png");
        std::fs::write(&input_path, tiny_png_bytes()).unwrap();
        let body = serde_json::json!({ "local_path": input_path.to_string_lossy() });
        let Json(created) = submit_job(State(state.clone()), json_request(body)).await.unwrap();

        let err = get_result(State(state), AxumPath(created.job_id)).await.unwrap_err();
        assert!(matches!(err, ApiError::Job(jobs::JobError::NotDone(_))));
    }

    #[tokio::test]
    async fn delete_job_removes_record() {
        let (state, dir) = test_state();
        let input_path = dir.path().join("source.png");
        std::fs::write(&input_path, tiny_png_bytes()).unwrap();
        let body = serde_json::json!({ "local_path": input_path.to_string_lossy() });
        let Json(created) = submit_job(State(state.clone()), json_request(body)).await.unwrap();

        delete_job(State(state.clone()), AxumPath(created.job_id.clone())).await.unwrap();
        let err = get_status(State(state), AxumPath(created.job_id)).await.unwrap_err();
        assert!(matches!(err, ApiError::Job(jobs::JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn process_artwork_requires_auth_token_when_backend_url_set() {
        let (state, _dir) = test_state();
        let boundary = "TestBoundary456";
        let metadata = serde_json::json!({
            "callback_url": "https://example.com/cb",
            "callback_auth_token": "secret",
            "backend_url": "https://example.com/backend",
        })
        .to_string();
        let body = build_multipart_body(
            boundary,
            &[
                ("file", Some("upload.png"), &tiny_png_bytes()),
                ("metadata", None, metadata.as_bytes()),
            ],
        );
        let request = multipart_request(boundary, body);
        let multipart = Multipart::from_request(request, &state).await.unwrap();

        let err = process_artwork(State(state), multipart).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn process_artwork_accepts_valid_submission() {
        let (state, _dir) = test_state();
        let boundary = "TestBoundary789";
        let metadata = serde_json::json!({
            "callback_url": "https://example.com/cb",
            "callback_auth_token": "secret",
        })
        .to_string();
        let body = build_multipart_body(
            boundary,
            &[
                ("file", Some("upload.png"), &tiny_png_bytes()),
                ("metadata", None, metadata.as_bytes()),
            ],
        );
        let request = multipart_request(boundary, body);
        let multipart = Multipart::from_request(request, &state).await.unwrap();

        let (status, Json(response)) = process_artwork(State(state), multipart).await.unwrap();
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(response.status, "processing");
    }
}
