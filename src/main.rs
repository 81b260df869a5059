//! MENA Signal — Binary Entrypoint
//! Boots the Axum HTTP server and the background ingestion pipeline:
//! scheduler → coordinator → scoring worker pool.
//!
//! See `README.md` for quickstart.

use std::sync::Arc;

use shuttle_axum::ShuttleAxum;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mena_signal::analyze::build_backend_from_config;
use mena_signal::api::{create_router, AppState};
use mena_signal::config::{ai::AiConfig, sources::load_sources_default, PipelineConfig};
use mena_signal::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use mena_signal::ingest::coordinator::Coordinator;
use mena_signal::metrics::Metrics;
use mena_signal::store::MemoryStore;

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR SHUTTLE_ENV in {local, development, dev})
///   - INGEST_DEV_LOG=1
fn enable_dev_tracing() {
    let dev_flag = std::env::var("INGEST_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("SHUTTLE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ingest=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_dev_tracing();

    let pipeline_cfg = PipelineConfig::from_env();
    let ai_cfg = AiConfig::load_or_default();
    let sources = match load_sources_default() {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to load sources config, starting with none");
            Vec::new()
        }
    };

    let store = Arc::new(MemoryStore::new());
    let backend = build_backend_from_config(&ai_cfg);
    let (coordinator, shutdown) = Coordinator::new(store.clone(), backend, sources, &pipeline_cfg);

    // Keep the shutdown channel alive for the process lifetime.
    std::mem::forget(shutdown);

    spawn_scheduler(
        IngestSchedulerCfg {
            interval_secs: pipeline_cfg.interval_secs,
            run_on_start: true,
        },
        coordinator.clone(),
    );

    let metrics = Metrics::init(pipeline_cfg.interval_secs);
    let state = AppState {
        coordinator,
        store,
    };
    let router = create_router(state).merge(metrics.router());

    Ok(router.into())
}
