//! Environment-driven configuration, grounded in
//! `original_source/artorize_gateway/app.py`'s `GatewayConfig`. This
//! loader is itself ambient plumbing, not a core subsystem, but every
//! binary needs one.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub base_dir: PathBuf,
    pub output_parent: PathBuf,
    pub worker_concurrency: usize,
    pub request_timeout: Duration,
    pub callback_timeout: Duration,
    pub callback_retry_attempts: u32,
    pub callback_retry_delay: Duration,
    pub local_storage_base_url: String,
    pub backend_url: Option<String>,
    pub backend_timeout: Duration,
    pub backend_auth_token: Option<String>,
    pub backend_upload_max_retries: u32,
    pub backend_upload_retry_delay: Duration,
    pub similarity_backend_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_string("GATEWAY_BIND_ADDR", "0.0.0.0:8080"),
            base_dir: PathBuf::from(env_string("GATEWAY_BASE_DIR", "gateway_jobs")),
            output_parent: PathBuf::from(env_string("GATEWAY_OUTPUT_DIR", "outputs")),
            worker_concurrency: env_parse("GATEWAY_WORKER_CONCURRENCY", 1),
            request_timeout: Duration::from_secs_f64(env_parse("GATEWAY_REQUEST_TIMEOUT", 30.0)),
            callback_timeout: Duration::from_secs_f64(env_parse("GATEWAY_CALLBACK_TIMEOUT", 10.0)),
            callback_retry_attempts: env_parse("GATEWAY_CALLBACK_RETRY_ATTEMPTS", 3),
            callback_retry_delay: Duration::from_secs_f64(env_parse("GATEWAY_CALLBACK_RETRY_DELAY", 2.0)),
            local_storage_base_url: env_string(
                "GATEWAY_LOCAL_STORAGE_BASE_URL",
                "http://localhost:8080/v1/storage",
            ),
            backend_url: std::env::var("GATEWAY_BACKEND_URL").ok(),
            backend_timeout: Duration::from_secs_f64(env_parse("GATEWAY_BACKEND_TIMEOUT", 30.0)),
            backend_auth_token: std::env::var("GATEWAY_BACKEND_AUTH_TOKEN").ok(),
            backend_upload_max_retries: env_parse("GATEWAY_BACKEND_UPLOAD_MAX_RETRIES", 3),
            backend_upload_retry_delay: Duration::from_secs_f64(env_parse(
                "GATEWAY_BACKEND_UPLOAD_RETRY_DELAY",
                2.0,
            )),
            similarity_backend_url: std::env::var("GATEWAY_SIMILARITY_BACKEND_URL").ok(),
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
