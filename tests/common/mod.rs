// tests/common/mod.rs
//
// Shared helpers: a throwaway HTTP server for fixture feeds and a few
// constructors used across the integration suites.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};

use mena_signal::config::PipelineConfig;
use mena_signal::ingest::coordinator::Coordinator;
use mena_signal::ingest::types::{Source, SourceCategory, SourceKind};

/// Serve fixed bodies on an ephemeral local port. Returns the base URL.
pub async fn serve_feeds(routes: Vec<(&'static str, String)>) -> String {
    let mut router = Router::new();
    for (path, body) in routes {
        router = router.route(
            path,
            get(move || {
                let body = body.clone();
                async move { body }
            }),
        );
    }
    spawn_router(router).await
}

/// Serve a route that always answers 500.
pub fn failing_route(router: Router, path: &'static str) -> Router {
    router.route(
        path,
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    )
}

pub async fn spawn_router(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve test feeds");
    });
    format!("http://{addr}")
}

pub fn rss_source(name: &str, base: &str, path: &str) -> Source {
    Source {
        name: name.to_string(),
        kind: SourceKind::Rss,
        endpoint: format!("{base}{path}"),
        category: Some(SourceCategory::Funding),
        enabled: true,
    }
}

pub fn atom_source(name: &str, base: &str, path: &str) -> Source {
    Source {
        name: name.to_string(),
        kind: SourceKind::Atom,
        endpoint: format!("{base}{path}"),
        category: Some(SourceCategory::Companies),
        enabled: true,
    }
}

pub fn test_pipeline_config() -> PipelineConfig {
    PipelineConfig {
        interval_secs: 1800,
        workers: 2,
        fetch_timeout_secs: 5,
        queue_capacity: 64,
    }
}

/// Poll until the scoring queue has fully drained.
pub async fn wait_scoring_idle(coordinator: &Arc<Coordinator>) {
    for _ in 0..500 {
        if coordinator.scoring_idle() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scoring queue did not drain in time");
}
