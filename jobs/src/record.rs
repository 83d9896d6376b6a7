//! Job record and status types, grounded in `original_source/artorize_gateway/app.py`'s
//! `JobRecord`/`GatewayState`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Done,
    Error,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Request fields carried from the HTTP layer into a new job. Kept free of
/// any HTTP-framework types so the job manager has no dependency on the
/// transport that created the request.
#[derive(Debug, Clone, Default)]
pub struct NewJobRequest {
    pub suffix: String,
    pub include_hash_analysis: bool,
    pub include_protection: bool,
    pub enable_tineye: bool,
    pub processors: Option<Vec<String>>,
    pub callback_url: Option<String>,
    pub callback_auth_token: Option<String>,
    pub backend_url: Option<String>,
    pub backend_auth_token: Option<String>,
    pub artist_name: Option<String>,
    pub artwork_title: Option<String>,
    pub artwork_description: Option<String>,
    pub artwork_tags: Vec<String>,
    pub artwork_creation_time: Option<String>,
    pub watermark_strategy: Option<String>,
    pub watermark_strength: Option<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub input_path: PathBuf,
    pub input_dir: PathBuf,
    pub output_root: PathBuf,
    pub include_hash_analysis: bool,
    pub include_protection: bool,
    pub enable_tineye: bool,
    pub processors: Option<Vec<String>>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<pipeline::PipelineSummary>,
    pub callback_url: Option<String>,
    pub callback_auth_token: Option<String>,
    pub backend_url: Option<String>,
    pub backend_auth_token: Option<String>,
    pub artist_name: Option<String>,
    pub artwork_title: Option<String>,
    pub artwork_description: Option<String>,
    pub artwork_tags: Vec<String>,
    pub artwork_creation_time: Option<String>,
    pub watermark_strategy: Option<String>,
    pub watermark_strength: Option<f32>,
}

impl JobRecord {
    pub fn new(
        job_id: JobId,
        input_path: PathBuf,
        input_dir: PathBuf,
        output_root: PathBuf,
        req: &NewJobRequest,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            job_id,
            input_path,
            input_dir,
            output_root,
            include_hash_analysis: req.include_hash_analysis,
            include_protection: req.include_protection,
            enable_tineye: req.enable_tineye,
            processors: req.processors.clone(),
            status: JobStatus::Queued,
            error: None,
            submitted_at: now,
            updated_at: now,
            result: None,
            callback_url: req.callback_url.clone(),
            callback_auth_token: req.callback_auth_token.clone(),
            backend_url: req.backend_url.clone(),
            backend_auth_token: req.backend_auth_token.clone(),
            artist_name: req.artist_name.clone(),
            artwork_title: req.artwork_title.clone(),
            artwork_description: req.artwork_description.clone(),
            artwork_tags: req.artwork_tags.clone(),
            artwork_creation_time: req.artwork_creation_time.clone(),
            watermark_strategy: req.watermark_strategy.clone(),
            watermark_strength: req.watermark_strength,
        }
    }

    /// Advances `status` (when given) and always refreshes `updated_at`, mirroring
    /// the Python source's `JobRecord.touch`.
    pub fn touch(&mut self, status: Option<JobStatus>, error: Option<String>, now: DateTime<Utc>) {
        if let Some(status) = status {
            self.status = status;
        }
        if error.is_some() {
            self.error = error;
        }
        self.updated_at = now;
    }
}
