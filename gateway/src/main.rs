mod callbacks;
mod config;
mod error;
mod ingest;
mod routes;
mod state;

#[cfg(test)]
mod test_support;

use axum::routing::{delete, get, post};
use axum::Router;
use config::Config;
use state::{AppState, SharedState};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/v1/jobs", post(routes::jobs::submit_job))
        .route("/v1/jobs/:job_id", get(routes::jobs::get_status).delete(routes::jobs::delete_job))
        .route("/v1/jobs/:job_id/result", get(routes::jobs::get_result))
        .route("/v1/jobs/:job_id/layers/:stage", get(routes::jobs::get_layer))
        .route("/v1/process/artwork", post(routes::jobs::process_artwork))
        .route("/v1/sac/encode", post(routes::sac::encode_mask_pair))
        .route("/v1/sac/encode/npz", post(routes::sac::encode_from_npz))
        .route("/v1/sac/encode/batch", post(routes::sac::encode_batch))
        .route("/v1/sac/encode/job/:job_id", get(routes::sac::encode_job_mask))
        .route("/v1/images/extract-hashes", post(routes::images::extract_hashes))
        .route("/v1/images/find-similar", post(routes::images::find_similar))
        .route("/health", get(routes::health::health_check))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::from_env();
    tokio::fs::create_dir_all(&config.base_dir).await?;
    tokio::fs::create_dir_all(&config.output_parent).await?;

    let bind_addr = config.bind_addr.clone();
    let worker_concurrency = config.worker_concurrency;
    let state = AppState::new(config);

    let callbacks = callbacks::HttpJobCallbacks::new(Arc::clone(&state));
    let worker_handles = state
        .jobs
        .spawn_workers(worker_concurrency, callbacks, pipeline::PipelineConfig::default());

    log::info!("gateway listening on {bind_addr}, {worker_concurrency} worker(s)");

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for handle in worker_handles {
        handle.abort();
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::info!("shutdown signal received, draining in-flight requests");
}
