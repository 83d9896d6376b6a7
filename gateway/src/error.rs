//! HTTP-facing error types. `IngestError`/`CallbackError` mirror the
//! taxonomy of SPEC_FULL §7.1; `ApiError` is the single type route
//! handlers return so the status-code mapping lives in one place.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("no file or payload provided")]
    MissingFile,
    #[error("both image_url and local_path were provided; exactly one is allowed")]
    ConflictingSources,
    #[error("malformed metadata JSON: {0}")]
    MalformedMetadata(#[from] serde_json::Error),
    #[error("failed to download image: {0}")]
    DownloadFailed(String),
    #[error("local path not found: {0}")]
    LocalPathNotFound(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("callback request timed out")]
    Timeout,
    #[error("callback network error: {0}")]
    Network(String),
    #[error("callback endpoint returned {0}")]
    NonSuccess(u16),
    #[error("callback authentication failed (401)")]
    AuthFailed,
}

/// Single error type for route handlers; converts to the status codes of
/// SPEC_FULL §6/§7 (400 malformed input, 404 unknown job/layer, 409 not
/// complete, 503 required downstream unavailable).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Job(#[from] jobs::JobError),
    #[error(transparent)]
    Codec(#[from] sac::CodecError),
    #[error(transparent)]
    Similarity(#[from] collaborators::SimilarityError),
    #[error("required downstream unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Ingest(IngestError::MissingFile) => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            ApiError::Ingest(IngestError::ConflictingSources) => {
                (StatusCode::BAD_REQUEST, "CONFLICTING_SOURCES")
            }
            ApiError::Ingest(IngestError::MalformedMetadata(_)) => {
                (StatusCode::BAD_REQUEST, "MALFORMED_METADATA")
            }
            ApiError::Ingest(IngestError::LocalPathNotFound(_)) => {
                (StatusCode::BAD_REQUEST, "LOCAL_PATH_NOT_FOUND")
            }
            ApiError::Ingest(IngestError::DownloadFailed(_)) => {
                (StatusCode::BAD_REQUEST, "DOWNLOAD_FAILED")
            }
            ApiError::Ingest(IngestError::Io(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_IO_ERROR")
            }
            ApiError::Job(jobs::JobError::NotFound(_)) => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND"),
            ApiError::Job(jobs::JobError::NotDone(_)) => (StatusCode::CONFLICT, "JOB_NOT_DONE"),
            ApiError::Job(jobs::JobError::AlreadyExists(_)) => {
                (StatusCode::CONFLICT, "JOB_ALREADY_EXISTS")
            }
            ApiError::Job(jobs::JobError::Io(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_IO_ERROR")
            }
            ApiError::Codec(_) => (StatusCode::BAD_REQUEST, "MALFORMED_SAC_INPUT"),
            ApiError::Similarity(collaborators::SimilarityError::NotConfigured) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SIMILARITY_NOT_CONFIGURED")
            }
            ApiError::Similarity(collaborators::SimilarityError::Transport(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SIMILARITY_TRANSPORT_ERROR")
            }
            ApiError::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        };

        let body = Json(json!({ "error": { "code": code, "message": self.to_string() } }));
        (status, body).into_response()
    }
}
