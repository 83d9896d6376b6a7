//! Progress/completion callback delivery, grounded in
//! `original_source/artorize_gateway/callback_client.py`'s `CallbackClient`.
//! Completion callbacks retry with a fixed delay; progress callbacks use
//! the same fixed-delay policy. 401 is terminal for the backend-upload
//! path (handled separately by `collaborators::backend`) but completion
//! callbacks themselves have no special-cased status beyond "non-2xx, log
//! and move on after exhausting retries" per the Python source.

use crate::state::SharedState;
use async_trait::async_trait;
use collaborators::ArtworkBackend;
use jobs::{JobCallbacks, JobId};
use serde_json::json;
use std::sync::Arc;

pub struct HttpJobCallbacks {
    state: SharedState,
    client: reqwest::Client,
}

impl HttpJobCallbacks {
    pub fn new(state: SharedState) -> Arc<Self> {
        let client = reqwest::Client::builder()
            .timeout(state.config.callback_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Arc::new(Self { state, client })
    }

    async fn post_with_retry(&self, url: &str, auth_token: Option<&str>, payload: serde_json::Value) -> bool {
        let attempts = self.state.config.callback_retry_attempts.max(1);
        for attempt in 0..attempts {
            let mut builder = self.client.post(url).json(&payload);
            if let Some(token) = auth_token {
                builder = builder.header("Authorization", token);
            }
            match builder.send().await {
                Ok(resp) if resp.status().is_success() => return true,
                Ok(resp) => {
                    log::warn!(
                        "callback to {url} returned {} (attempt {}/{attempts})",
                        resp.status(),
                        attempt + 1
                    );
                }
                Err(e) => {
                    log::error!("callback to {url} failed (attempt {}/{attempts}): {e}", attempt + 1);
                }
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(self.state.config.callback_retry_delay).await;
            }
        }
        log::error!("callback to {url} exhausted all {attempts} attempts, dropping");
        false
    }

    fn progress_url(completion_url: &str) -> String {
        completion_url.replace("process-complete", "process-progress")
    }
}

#[async_trait]
impl JobCallbacks for HttpJobCallbacks {
    async fn on_progress(
        &self,
        job_id: &JobId,
        current_step: &str,
        step_number: u32,
        total_steps: u32,
        percentage: u32,
        details: serde_json::Value,
    ) {
        let Some(record) = self.state.jobs.get_status(job_id).ok() else {
            return;
        };
        let Some(callback_url) = &record.callback_url else {
            return;
        };
        let progress_url = Self::progress_url(callback_url);
        let payload = json!({
            "job_id": job_id,
            "current_step": current_step,
            "step_number": step_number,
            "total_steps": total_steps,
            "percentage": percentage,
            "details": details,
        });
        self.post_with_retry(&progress_url, record.callback_auth_token.as_deref(), payload)
            .await;
    }

    async fn on_completion(
        &self,
        job_id: &JobId,
        result: Option<&pipeline::PipelineSummary>,
        error: Option<&str>,
    ) {
        let Some(record) = self.state.jobs.get_status(job_id).ok() else {
            return;
        };

        let payload = match (result, error) {
            (Some(summary), None) => self.success_payload(job_id, &record, summary).await,
            _ => json!({
                "job_id": job_id,
                "status": "failed",
                "processing_time_ms": elapsed_ms(&record),
                "error": {
                    "code": "PROCESSING_FAILED",
                    "message": error.unwrap_or("unknown error"),
                },
            }),
        };

        if let Some(callback_url) = &record.callback_url {
            self.post_with_retry(callback_url, record.callback_auth_token.as_deref(), payload)
                .await;
        }
    }
}

impl HttpJobCallbacks {
    async fn success_payload(
        &self,
        job_id: &JobId,
        record: &jobs::JobRecord,
        summary: &pipeline::PipelineSummary,
    ) -> serde_json::Value {
        if let Some(backend_url) = &record.backend_url {
            return self.backend_upload_payload(job_id, record, summary, backend_url).await;
        }

        let protected_layer = summary
            .layers
            .iter()
            .rev()
            .find(|l| l.is_protection_layer && l.error.is_none())
            .or_else(|| summary.layers.first());
        let Some(protected_layer) = protected_layer.and_then(|l| l.path.clone()) else {
            return json!({
                "job_id": job_id,
                "status": "failed",
                "processing_time_ms": elapsed_ms(record),
                "error": {"code": "PROCESSING_FAILED", "message": "no protected layer produced"},
            });
        };

        let mask_path = summary.layers.last().and_then(|l| l.mask_path.clone());
        match self
            .state
            .object_store
            .upload_protected_image(&protected_layer, job_id, "png", mask_path.as_deref())
            .await
        {
            Ok(uploaded) => json!({
                "job_id": job_id,
                "status": "completed",
                "processing_time_ms": elapsed_ms(record),
                "result": {
                    "protected_image_url": uploaded.protected_image_url,
                    "thumbnail_url": uploaded.thumbnail_url,
                    "sac_mask_url": uploaded.sac_mask_url,
                    "hashes": summary.analysis.clone(),
                    "metadata": {"width": summary.image.width, "height": summary.image.height},
                    "watermark": {
                        "strategy": record.watermark_strategy.clone().unwrap_or_else(|| "invisible-watermark".to_string()),
                        "strength": record.watermark_strength.unwrap_or(1.0),
                    },
                },
            }),
            Err(e) => json!({
                "job_id": job_id,
                "status": "failed",
                "processing_time_ms": elapsed_ms(record),
                "error": {"code": "STORAGE_UPLOAD_FAILED", "message": e.to_string()},
            }),
        }
    }

    async fn backend_upload_payload(
        &self,
        job_id: &JobId,
        record: &jobs::JobRecord,
        summary: &pipeline::PipelineSummary,
        backend_url: &str,
    ) -> serde_json::Value {
        let protected_layer = summary
            .layers
            .iter()
            .rev()
            .find(|l| l.is_protection_layer && l.error.is_none())
            .and_then(|l| l.path.clone());
        let original_layer = summary.layers.first().and_then(|l| l.path.clone());
        let mask_path = summary.layers.last().and_then(|l| l.mask_path.clone());

        let (Some(protected), Some(original), Some(mask)) = (protected_layer, original_layer, mask_path) else {
            return json!({
                "job_id": job_id,
                "status": "failed",
                "processing_time_ms": elapsed_ms(record),
                "error": {"code": "PROCESSING_FAILED", "message": "missing artifacts for backend upload"},
            });
        };

        let request = collaborators::UploadRequest {
            original_image_path: original,
            protected_image_path: protected,
            mask_path: mask,
            analysis: summary.analysis.clone().unwrap_or(serde_json::Value::Null),
            summary: serde_json::to_value(summary).unwrap_or(serde_json::Value::Null),
            title: record.artwork_title.clone().unwrap_or_else(|| "Untitled".to_string()),
            artist: record.artist_name.clone().unwrap_or_else(|| "Unknown".to_string()),
            description: record.artwork_description.clone(),
            tags: record.artwork_tags.clone(),
            created_at: record.artwork_creation_time.clone(),
            extra: None,
        };

        match self
            .state
            .artwork_backend
            .upload_artwork(backend_url, record.backend_auth_token.as_deref(), request)
            .await
        {
            Ok(response) => json!({
                "job_id": job_id,
                "status": "completed",
                "backend_artwork_id": response.get("id").cloned().unwrap_or(serde_json::Value::Null),
                "processing_time_ms": elapsed_ms(record),
            }),
            Err(e) => {
                let code = match &e {
                    collaborators::BackendUploadError::AuthFailed => "BACKEND_AUTH_FAILED",
                    _ => "BACKEND_UPLOAD_FAILED",
                };
                json!({
                    "job_id": job_id,
                    "status": "failed",
                    "processing_time_ms": elapsed_ms(record),
                    "error": {"code": code, "message": e.to_string()},
                })
            }
        }
    }
}

fn elapsed_ms(record: &jobs::JobRecord) -> i64 {
    (record.updated_at - record.submitted_at).num_milliseconds().max(0)
}
