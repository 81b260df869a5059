// src/analyze/mod.rs
//! Scoring engine: one contract, two interchangeable backends.
//!
//! The backend is picked once per process from configuration (credential
//! present → model, absent → stub). Per-item fallback on model failure is a
//! runtime decision inside the model backend, not a separate dispatch path.

pub mod model;
pub mod rubric;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::info;

use crate::config::ai::AiConfig;
use crate::item::{Item, ItemDetails, ItemType};
use rubric::MenaAnalysis;

pub use model::ModelBackend;

/// Backend name recorded when the model path degraded to stub values.
pub const FALLBACK_MODEL_NAME: &str = "fallback-stub";
/// Backend name recorded in intentional stub mode (no credential).
pub const STUB_MODEL_NAME: &str = "stub";

/// What a backend sees of an item: the normalized fields, nothing persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ItemSnapshot {
    pub title: String,
    pub company_name: Option<String>,
    pub item_type: ItemType,
    pub summary: Option<String>,
    pub details: ItemDetails,
}

impl From<&Item> for ItemSnapshot {
    fn from(item: &Item) -> Self {
        Self {
            title: item.title.clone(),
            company_name: item.company_name.clone(),
            item_type: item.item_type,
            summary: item.summary.clone(),
            details: item.details.clone(),
        }
    }
}

/// Uniform scoring contract. Infallible by design: backends that can fail
/// internally must degrade to stub values rather than error past this seam.
#[async_trait]
pub trait ScoreBackend: Send + Sync {
    async fn score(&self, item: &ItemSnapshot) -> MenaAnalysis;
    fn name(&self) -> &'static str;
}

/// Deterministic offline backend: score 50, rubric of five 10s, fixed
/// rationale. Used when no credential is configured.
pub struct StubBackend;

#[async_trait]
impl ScoreBackend for StubBackend {
    async fn score(&self, _item: &ItemSnapshot) -> MenaAnalysis {
        MenaAnalysis::stub_values(STUB_MODEL_NAME)
    }
    fn name(&self) -> &'static str {
        "stub"
    }
}

pub type DynScoreBackend = Arc<dyn ScoreBackend>;

/// Factory: pick the backend from configuration state, once.
pub fn build_backend_from_config(cfg: &AiConfig) -> DynScoreBackend {
    match cfg.resolved_key() {
        Some(key) => {
            info!(model = %cfg.model, "scoring backend: model");
            Arc::new(ModelBackend::new(cfg, key))
        }
        None => {
            info!("scoring backend: stub (no model credential configured)");
            Arc::new(StubBackend)
        }
    }
}
