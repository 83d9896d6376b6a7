//! The job manager: a FIFO queue of job ids, a single-writer-per-key
//! record map, and a bounded worker pool, grounded in
//! `original_source/artorize_gateway/app.py`'s `GatewayState`.

use crate::record::{JobId, JobRecord, JobStatus, NewJobRequest};
use crate::worker::{run_worker, JobCallbacks};
use chrono::Utc;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

const CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job not found: {0}")]
    NotFound(JobId),
    #[error("job not done: {0}")]
    NotDone(JobId),
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct JobManager {
    jobs: DashMap<JobId, JobRecord>,
    queue_tx: mpsc::UnboundedSender<JobId>,
    queue_rx: Mutex<mpsc::UnboundedReceiver<JobId>>,
    base_dir: PathBuf,
    output_parent: PathBuf,
}

impl JobManager {
    pub fn new(base_dir: impl Into<PathBuf>, output_parent: impl Into<PathBuf>) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            jobs: DashMap::new(),
            queue_tx,
            queue_rx: Mutex::new(queue_rx),
            base_dir: base_dir.into(),
            output_parent: output_parent.into(),
        })
    }

    /// Spawns `worker_count` worker tasks sharing this manager and the
    /// callback delivery implementation. Returns their join handles so a
    /// caller can await graceful shutdown.
    pub fn spawn_workers(
        self: &Arc<Self>,
        worker_count: usize,
        callbacks: Arc<dyn JobCallbacks>,
        pipeline_config: pipeline::PipelineConfig,
    ) -> Vec<tokio::task::JoinHandle<()>> {
        (0..worker_count.max(1))
            .map(|_| {
                let manager = Arc::clone(self);
                let callbacks = Arc::clone(&callbacks);
                let config = pipeline_config.clone();
                tokio::spawn(run_worker(manager, callbacks, config))
            })
            .collect()
    }

    /// Persists `reader`'s bytes in 1 MiB chunks under
    /// `<base_dir>/<id>/input/<id><suffix>`, creates a `queued` record,
    /// and enqueues it.
    pub async fn submit<R: AsyncRead + Unpin>(
        &self,
        mut reader: R,
        req: NewJobRequest,
    ) -> Result<JobRecord, JobError> {
        use tokio::io::AsyncReadExt;

        let job_id = uuid::Uuid::new_v4().simple().to_string();
        let job_dir = self.base_dir.join(&job_id);
        let input_dir = job_dir.join("input");
        tokio::fs::create_dir_all(&input_dir).await?;
        let output_root = self.output_parent.join(&job_id);

        let suffix = if req.suffix.is_empty() { ".bin".to_string() } else { req.suffix.clone() };
        let stored_path = input_dir.join(format!("{job_id}{suffix}"));

        let mut file = tokio::fs::File::create(&stored_path).await?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            file.write_all(&buf[..n]).await?;
        }
        file.flush().await?;

        let now = Utc::now();
        let record = JobRecord::new(job_id.clone(), stored_path, input_dir, output_root, &req, now);

        if self.jobs.contains_key(&job_id) {
            return Err(JobError::AlreadyExists(job_id));
        }
        self.jobs.insert(job_id.clone(), record.clone());
        let _ = self.queue_tx.send(job_id);

        Ok(record)
    }

    pub fn get_status(&self, id: &str) -> Result<JobRecord, JobError> {
        self.jobs
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    pub fn get_result(&self, id: &str) -> Result<pipeline::PipelineSummary, JobError> {
        let record = self.get_status(id)?;
        match record.status {
            JobStatus::Done => record.result.ok_or_else(|| JobError::NotDone(id.to_string())),
            _ => Err(JobError::NotDone(id.to_string())),
        }
    }

    /// Returns the layer file path for `stage`, if the job is done and the
    /// stage exists in its summary. `Ok(None)` distinguishes "job is done
    /// but stage absent" (404) from "job not done" (409, `NotDone`).
    pub fn get_layer_path(&self, id: &str, stage: &str) -> Result<Option<PathBuf>, JobError> {
        let summary = self.get_result(id)?;
        Ok(summary
            .layers
            .into_iter()
            .find(|l| l.stage == stage)
            .and_then(|l| l.path))
    }

    /// Removes the record and best-effort deletes its input and output
    /// directories.
    pub async fn delete(&self, id: &str) -> Result<(), JobError> {
        let (_, record) = self
            .jobs
            .remove(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))?;
        let _ = tokio::fs::remove_dir_all(&record.input_dir).await;
        let _ = tokio::fs::remove_dir_all(&record.output_root).await;
        Ok(())
    }

    pub(crate) async fn dequeue(&self) -> Option<JobId> {
        self.queue_rx.lock().await.recv().await
    }

    pub(crate) fn lookup(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.get(id).map(|r| r.clone())
    }

    pub(crate) fn transition_running(&self, id: &JobId) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.touch(Some(JobStatus::Running), None, Utc::now());
        }
    }

    pub(crate) fn complete(&self, id: &JobId, summary: pipeline::PipelineSummary) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.result = Some(summary);
            record.touch(Some(JobStatus::Done), None, Utc::now());
        }
    }

    pub(crate) fn fail(&self, id: &JobId, message: String) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.touch(Some(JobStatus::Error), Some(message), Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::NoopCallbacks;

    fn tiny_png() -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.png");
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([10, 20, 30]));
        img.save(&path).unwrap();
        std::fs::read(&path).unwrap()
    }

    #[tokio::test]
    async fn submit_creates_queued_record_and_persists_input() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().join("base"), dir.path().join("out"));

        let bytes = tiny_png();
        let record = manager
            .submit(
                std::io::Cursor::new(bytes.clone()),
                NewJobRequest {
                    suffix: ".png".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(record.status, JobStatus::Queued);
        let stored = tokio::fs::read(&record.input_path).await.unwrap();
        assert_eq!(stored, bytes);
    }

    #[tokio::test]
    async fn get_result_is_not_done_before_completion() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().join("base"), dir.path().join("out"));
        let record = manager
            .submit(std::io::Cursor::new(tiny_png()), NewJobRequest::default())
            .await
            .unwrap();

        let result = manager.get_result(&record.job_id);
        assert!(matches!(result, Err(JobError::NotDone(_))));
    }

    #[tokio::test]
    async fn delete_removes_record_and_reports_not_found_after() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().join("base"), dir.path().join("out"));
        let record = manager
            .submit(std::io::Cursor::new(tiny_png()), NewJobRequest::default())
            .await
            .unwrap();

        manager.delete(&record.job_id).await.unwrap();
        assert!(matches!(manager.get_status(&record.job_id), Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn worker_processes_queued_job_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let manager = JobManager::new(dir.path().join("base"), dir.path().join("out"));
        let record = manager
            .submit(
                std::io::Cursor::new(tiny_png()),
                NewJobRequest {
                    suffix: ".png".to_string(),
                    include_protection: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let handles = manager.spawn_workers(1, Arc::new(NoopCallbacks), pipeline::PipelineConfig::default());

        let mut status = manager.get_status(&record.job_id).unwrap().status;
        for _ in 0..200 {
            status = manager.get_status(&record.job_id).unwrap().status;
            if status == JobStatus::Done || status == JobStatus::Error {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }
        assert_eq!(status, JobStatus::Done);

        for handle in handles {
            handle.abort();
        }
    }
}
