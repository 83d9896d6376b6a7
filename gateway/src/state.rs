use crate::config::Config;
use collaborators::{HttpArtworkBackend, LocalObjectStore, NotConfiguredSimilarityBackend};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub jobs: Arc<jobs::JobManager>,
    pub object_store: Arc<LocalObjectStore>,
    pub similarity_backend: Arc<NotConfiguredSimilarityBackend>,
    pub artwork_backend: Arc<HttpArtworkBackend>,
    pub download_client: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Arc<Self> {
        let object_store = Arc::new(LocalObjectStore::new(
            config.output_parent.join("served"),
            config.local_storage_base_url.clone(),
        ));
        let artwork_backend = Arc::new(HttpArtworkBackend::new(
            config.backend_timeout,
            config.backend_upload_max_retries,
            config.backend_upload_retry_delay,
        ));
        let download_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        let jobs = jobs::JobManager::new(config.base_dir.clone(), config.output_parent.clone());

        Arc::new(Self {
            config,
            jobs,
            object_store,
            similarity_backend: Arc::new(NotConfiguredSimilarityBackend::new()),
            artwork_backend,
            download_client,
        })
    }
}

pub type SharedState = Arc<AppState>;
