//! Artwork-backend upload collaborator, grounded in
//! `original_source/artorize_gateway/backend_upload.py`. The error
//! classification — 401 terminal, 429 retried with exponential backoff,
//! other non-2xx terminal, timeouts/network errors retried — is core to
//! §7's error taxonomy and is implemented fully; only the backend service
//! itself is external.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub original_image_path: PathBuf,
    pub protected_image_path: PathBuf,
    pub mask_path: PathBuf,
    pub analysis: serde_json::Value,
    pub summary: serde_json::Value,
    pub title: String,
    pub artist: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub created_at: Option<String>,
    pub extra: Option<serde_json::Value>,
}

#[derive(Error, Debug)]
pub enum BackendUploadError {
    #[error("backend authentication failed: token invalid, expired, or already used")]
    AuthFailed,
    #[error("backend rate limit exceeded after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("backend upload timed out after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("backend network error after {attempts} attempts: {message}")]
    Network { attempts: u32, message: String },
    #[error("backend returned {status}: {body}")]
    Other { status: u16, body: String },
    #[error("required file missing for backend upload: {0}")]
    MissingFile(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait ArtworkBackend: Send + Sync {
    async fn upload_artwork(
        &self,
        backend_url: &str,
        auth_token: Option<&str>,
        request: UploadRequest,
    ) -> Result<serde_json::Value, BackendUploadError>;

    async fn is_healthy(&self, backend_url: &str) -> bool;
}

pub struct HttpArtworkBackend {
    client: reqwest::Client,
    max_retries: u32,
    retry_delay: Duration,
}

impl HttpArtworkBackend {
    pub fn new(timeout: Duration, max_retries: u32, retry_delay: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            max_retries,
            retry_delay,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay * 2u32.saturating_pow(attempt)
    }

    async fn build_form(&self, request: &UploadRequest) -> Result<reqwest::multipart::Form, BackendUploadError> {
        require_file(&request.original_image_path, "original image")?;
        require_file(&request.protected_image_path, "protected image")?;
        require_file(&request.mask_path, "SAC mask file")?;

        let original = tokio::fs::read(&request.original_image_path).await?;
        let protected = tokio::fs::read(&request.protected_image_path).await?;
        let mask = tokio::fs::read(&request.mask_path).await?;

        let mut form = reqwest::multipart::Form::new()
            .text("title", request.title.clone())
            .text("artist", request.artist.clone())
            .part(
                "original",
                reqwest::multipart::Part::bytes(original)
                    .file_name(file_name(&request.original_image_path))
                    .mime_str("image/jpeg")
                    .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new())),
            )
            .part(
                "protected",
                reqwest::multipart::Part::bytes(protected)
                    .file_name(file_name(&request.protected_image_path))
                    .mime_str("image/jpeg")
                    .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new())),
            )
            .part(
                "mask",
                reqwest::multipart::Part::bytes(mask)
                    .file_name(file_name(&request.mask_path))
                    .mime_str("application/octet-stream")
                    .unwrap_or_else(|_| reqwest::multipart::Part::bytes(Vec::new())),
            )
            .part(
                "analysis",
                reqwest::multipart::Part::text(request.analysis.to_string())
                    .file_name("analysis.json")
                    .mime_str("application/json")
                    .unwrap_or_else(|_| reqwest::multipart::Part::text("{}")),
            )
            .part(
                "summary",
                reqwest::multipart::Part::text(request.summary.to_string())
                    .file_name("summary.json")
                    .mime_str("application/json")
                    .unwrap_or_else(|_| reqwest::multipart::Part::text("{}")),
            );

        if let Some(description) = &request.description {
            form = form.text("description", description.clone());
        }
        if !request.tags.is_empty() {
            form = form.text("tags", request.tags.join(","));
        }
        if let Some(created_at) = &request.created_at {
            form = form.text("createdAt", created_at.clone());
        }
        if let Some(extra) = &request.extra {
            form = form.text("extra", extra.to_string());
        }

        Ok(form)
    }
}

fn require_file(path: &std::path::Path, label: &str) -> Result<(), BackendUploadError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(BackendUploadError::MissingFile(label.to_string()))
    }
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string())
}

#[async_trait]
impl ArtworkBackend for HttpArtworkBackend {
    async fn upload_artwork(
        &self,
        backend_url: &str,
        auth_token: Option<&str>,
        request: UploadRequest,
    ) -> Result<serde_json::Value, BackendUploadError> {
        let url = format!("{}/artworks", backend_url.trim_end_matches('/'));

        for attempt in 0..self.max_retries {
            let form = self.build_form(&request).await?;
            let mut builder = self.client.post(&url).multipart(form);
            if let Some(token) = auth_token {
                builder = builder.bearer_auth(token);
            } else {
                log::warn!("no authentication token provided for backend upload");
            }

            let response = match builder.send().await {
                Ok(resp) => resp,
                Err(e) if e.is_timeout() => {
                    log::error!(
                        "backend upload timeout (attempt {}/{}): {e}",
                        attempt + 1,
                        self.max_retries
                    );
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Err(BackendUploadError::Timeout {
                        attempts: self.max_retries,
                    });
                }
                Err(e) => {
                    log::error!(
                        "backend network error (attempt {}/{}): {e}",
                        attempt + 1,
                        self.max_retries
                    );
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Err(BackendUploadError::Network {
                        attempts: self.max_retries,
                        message: e.to_string(),
                    });
                }
            };

            match response.status() {
                StatusCode::CREATED => {
                    return response
                        .json::<serde_json::Value>()
                        .await
                        .map_err(|e| BackendUploadError::Network {
                            attempts: attempt + 1,
                            message: e.to_string(),
                        });
                }
                StatusCode::UNAUTHORIZED => {
                    log::error!("backend authentication failed (status 401)");
                    return Err(BackendUploadError::AuthFailed);
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    log::warn!(
                        "backend rate limited (429), attempt {}/{}",
                        attempt + 1,
                        self.max_retries
                    );
                    if attempt + 1 < self.max_retries {
                        tokio::time::sleep(self.backoff(attempt)).await;
                        continue;
                    }
                    return Err(BackendUploadError::RateLimited {
                        attempts: self.max_retries,
                    });
                }
                status => {
                    let body = response.text().await.unwrap_or_default();
                    log::error!("backend returned {status}: {body}");
                    return Err(BackendUploadError::Other {
                        status: status.as_u16(),
                        body,
                    });
                }
            }
        }

        Err(BackendUploadError::Network {
            attempts: self.max_retries,
            message: "exhausted retries".to_string(),
        })
    }

    async fn is_healthy(&self, backend_url: &str) -> bool {
        let url = format!("{}/health", backend_url.trim_end_matches('/'));
        matches!(self.client.get(&url).send().await, Ok(resp) if resp.status().is_success())
    }
}
