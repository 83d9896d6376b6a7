//! Similarity-search collaborator, grounded in
//! `original_source/artorize_gateway/storage_client.py`, whose reference
//! implementation is itself an unconfigured stub returning a structured
//! "unavailable" response. This crate mirrors that rather than inventing
//! a real nearest-neighbor index.

use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub similar_images: Vec<serde_json::Value>,
    pub total_matches: usize,
    pub search_time_ms: u64,
}

#[derive(Error, Debug)]
pub enum SimilarityError {
    #[error("similarity backend not configured")]
    NotConfigured,
    #[error("similarity backend request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait SimilarityBackend: Send + Sync {
    async fn search(
        &self,
        hashes: &BTreeMap<String, String>,
        threshold: f32,
        limit: usize,
    ) -> Result<SimilarityResult, SimilarityError>;

    /// Health probe, used by the gateway's `/health` aggregation.
    async fn is_healthy(&self) -> bool;
}

pub struct NotConfiguredSimilarityBackend;

impl NotConfiguredSimilarityBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NotConfiguredSimilarityBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimilarityBackend for NotConfiguredSimilarityBackend {
    async fn search(
        &self,
        _hashes: &BTreeMap<String, String>,
        _threshold: f32,
        _limit: usize,
    ) -> Result<SimilarityResult, SimilarityError> {
        Err(SimilarityError::NotConfigured)
    }

    async fn is_healthy(&self) -> bool {
        false
    }
}
