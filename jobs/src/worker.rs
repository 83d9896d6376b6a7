//! Worker pool, grounded in `original_source/artorize_gateway/app.py`'s
//! `_worker_loop`: dequeue an id, transition the record, run the pipeline
//! on a blocking thread, and fire progress/completion callbacks at the
//! checkpoints `app.py` hard-codes (steps 1-3 of 4, at 25/50/75%).

use crate::manager::JobManager;
use crate::record::JobId;
use async_trait::async_trait;
use std::sync::Arc;

/// Callback-delivery seam. The job manager only knows *when* to notify, not
/// *how* — the HTTP layer supplies the real implementation (outbound POSTs
/// with retry/backoff); tests can supply a recording stub.
#[async_trait]
pub trait JobCallbacks: Send + Sync {
    async fn on_progress(
        &self,
        job_id: &JobId,
        current_step: &str,
        step_number: u32,
        total_steps: u32,
        percentage: u32,
        details: serde_json::Value,
    );

    async fn on_completion(
        &self,
        job_id: &JobId,
        result: Option<&pipeline::PipelineSummary>,
        error: Option<&str>,
    );
}

/// A `JobCallbacks` implementor that does nothing, for jobs with no
/// callback configured or for tests that don't care about delivery.
pub struct NoopCallbacks;

#[async_trait]
impl JobCallbacks for NoopCallbacks {
    async fn on_progress(&self, _: &JobId, _: &str, _: u32, _: u32, _: u32, _: serde_json::Value) {}
    async fn on_completion(&self, _: &JobId, _: Option<&pipeline::PipelineSummary>, _: Option<&str>) {}
}

const TOTAL_STEPS: u32 = 4;

pub(crate) async fn run_worker(
    manager: Arc<JobManager>,
    callbacks: Arc<dyn JobCallbacks>,
    pipeline_config: pipeline::PipelineConfig,
) {
    loop {
        let job_id = match manager.dequeue().await {
            Some(id) => id,
            None => break,
        };

        let Some(mut record) = manager.lookup(&job_id) else {
            continue;
        };
        manager.transition_running(&job_id);

        callbacks
            .on_progress(
                &job_id,
                "metadata",
                1,
                TOTAL_STEPS,
                25,
                serde_json::json!({"status": "starting"}),
            )
            .await;

        callbacks
            .on_progress(
                &job_id,
                "protection",
                2,
                TOTAL_STEPS,
                50,
                serde_json::json!({"status": "processing"}),
            )
            .await;

        record = manager.lookup(&job_id).unwrap_or(record);
        let input_path = record.input_path.clone();
        let output_root = record.output_root.clone();
        let include_hash_analysis = record.include_hash_analysis;
        let mut config = pipeline_config.clone();
        if !record.include_protection {
            config.enabled_stages.clear();
            config.enable_c2pa = false;
        } else if let Some(subset) = &record.processors {
            config
                .enabled_stages
                .retain(|stage| subset.iter().any(|p| p.eq_ignore_ascii_case(stage)));
        }

        let outcome = tokio::task::spawn_blocking(move || {
            let mut summary = pipeline::run(&input_path, &output_root, &config)?;
            if include_hash_analysis {
                attach_hash_analysis(&mut summary, &input_path);
            }
            Ok::<_, pipeline::PipelineError>(summary)
        })
        .await;

        callbacks
            .on_progress(
                &job_id,
                "upload",
                3,
                TOTAL_STEPS,
                75,
                serde_json::json!({"status": "uploading"}),
            )
            .await;

        match outcome {
            Ok(Ok(summary)) => {
                manager.complete(&job_id, summary.clone());
                callbacks.on_completion(&job_id, Some(&summary), None).await;
            }
            Ok(Err(e)) => {
                let message = e.to_string();
                manager.fail(&job_id, message.clone());
                callbacks.on_completion(&job_id, None, Some(&message)).await;
            }
            Err(join_err) => {
                let message = format!("pipeline task panicked: {join_err}");
                manager.fail(&job_id, message.clone());
                callbacks.on_completion(&job_id, None, Some(&message)).await;
            }
        }
    }
}

fn attach_hash_analysis(summary: &mut pipeline::PipelineSummary, input_path: &std::path::Path) {
    let Ok(dynamic) = image::open(input_path) else {
        log::warn!("hash analysis skipped: could not reopen {}", input_path.display());
        return;
    };
    let format = input_path
        .extension()
        .map(|e| e.to_string_lossy().into_owned());
    let processor = collaborators::LocalHashProcessor::new();
    let extracted = collaborators::HashProcessor::extract(&processor, &dynamic, format.as_deref());
    summary.analysis = Some(serde_json::json!({
        "hashes": extracted.hashes,
        "metadata": {
            "width": extracted.metadata.width,
            "height": extracted.metadata.height,
            "format": extracted.metadata.format,
            "mode": extracted.metadata.mode,
        },
        "error": extracted.error,
    }));
}
