//! Aggregate health check, grounded in
//! `original_source/artorize_gateway/app.py`'s `health_check` handler.

use crate::state::SharedState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use collaborators::SimilarityBackend;
use serde_json::json;

pub async fn health_check(State(state): State<SharedState>) -> (StatusCode, Json<serde_json::Value>) {
    let similarity_healthy = state.similarity_backend.is_healthy().await;
    let similarity_status = if state.config.similarity_backend_url.is_some() {
        if similarity_healthy { "healthy" } else { "unhealthy" }
    } else {
        "not_configured"
    };

    let backend_status = if let Some(backend_url) = &state.config.backend_url {
        if state.artwork_backend.is_healthy(backend_url).await {
            "healthy"
        } else {
            "unhealthy"
        }
    } else {
        "not_configured"
    };

    let mut overall = "healthy";
    if similarity_status == "unhealthy" || backend_status == "unhealthy" {
        overall = "degraded";
    }

    let body = json!({
        "status": overall,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "components": {
            "gateway": { "status": "healthy", "version": env!("CARGO_PKG_VERSION") },
            "storage_backend": {
                "status": similarity_status,
                "url": state.config.similarity_backend_url,
                "description": "Similarity search and artwork database service",
            },
            "backend_upload": {
                "status": backend_status,
                "url": state.config.backend_url,
                "description": "Artwork storage and management service",
            },
        },
    });

    let status_code = if overall == "unhealthy" { StatusCode::SERVICE_UNAVAILABLE } else { StatusCode::OK };
    (status_code, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;

    #[tokio::test]
    async fn reports_healthy_with_no_backends_configured() {
        let (state, _dir) = test_state();
        let (status, Json(body)) = health_check(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["storage_backend"]["status"], "not_configured");
        assert_eq!(body["components"]["backend_upload"]["status"], "not_configured");
    }
}
