//! api.rs — the outward trigger boundary. Browsing, favorites, tags and the
//! rest of the product surface live elsewhere; this router only triggers
//! ingestion runs and serves their audit records.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::ingest::coordinator::{Coordinator, RunOutcome};
use crate::store::{IngestionRun, ItemStore, RunId};

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub store: Arc<dyn ItemStore>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/ingest/run", post(trigger_ingest))
        .route("/ingest/runs/{id}", get(get_run))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Deserialize, Default)]
struct TriggerParams {
    /// Restrict the run to one source by name.
    source: Option<String>,
}

/// Manual trigger. Returns the finalized run summary, or `skipped` when a
/// run is already in flight. Scoring continues draining in the background;
/// poll the run record for the audit trail.
async fn trigger_ingest(
    State(state): State<AppState>,
    Query(params): Query<TriggerParams>,
) -> Result<Json<RunOutcome>, (StatusCode, String)> {
    match state.coordinator.run(params.source.as_deref()).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("persistence failure: {e:#}"),
        )),
    }
}

async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<RunId>,
) -> Result<Json<IngestionRun>, StatusCode> {
    match state.store.get_run(id) {
        Ok(Some(run)) => Ok(Json(run)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
