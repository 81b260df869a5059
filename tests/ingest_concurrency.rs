// tests/ingest_concurrency.rs
//
// Concurrency contracts:
// - at most one in-flight scoring job per fingerprint
// - a fingerprint can be scored again once its job has drained
// - overlapping run triggers are skipped, never run in parallel

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mena_signal::analyze::rubric::MenaAnalysis;
use mena_signal::analyze::{ItemSnapshot, ScoreBackend, StubBackend};
use mena_signal::ingest::coordinator::{Coordinator, RunOutcome};
use mena_signal::item::{ItemDetails, ItemType, NewItem};
use mena_signal::store::{ItemStore, MemoryStore};

use common::{rss_source, spawn_router, test_pipeline_config, wait_scoring_idle};

/// Counts executions and blocks each one until the gate gets permits.
struct GatedBackend {
    executions: AtomicUsize,
    gate: tokio::sync::Semaphore,
}

#[async_trait]
impl ScoreBackend for GatedBackend {
    async fn score(&self, _item: &ItemSnapshot) -> MenaAnalysis {
        self.executions.fetch_add(1, Ordering::SeqCst);
        let permit = self.gate.acquire().await.expect("gate closed");
        permit.forget();
        MenaAnalysis::stub_values("gated")
    }
    fn name(&self) -> &'static str {
        "gated"
    }
}

fn new_item(title: &str) -> NewItem {
    NewItem {
        item_type: ItemType::Company,
        title: title.into(),
        company_name: None,
        url: format!("https://example.test/{title}"),
        source_name: "TechWire".into(),
        published_at: None,
        summary: None,
        details: ItemDetails::default(),
    }
}

#[tokio::test]
async fn simultaneous_enqueues_for_one_fingerprint_score_once() {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(GatedBackend {
        executions: AtomicUsize::new(0),
        gate: tokio::sync::Semaphore::new(0),
    });
    let (coordinator, _shutdown) = Coordinator::new(
        store.clone(),
        backend.clone(),
        Vec::new(),
        &test_pipeline_config(),
    );

    let item = store
        .create_item_if_absent("fp-contested", new_item("a"))
        .unwrap()
        .unwrap();

    tokio::join!(
        coordinator.enqueue_scoring(&item, "fp-contested".into()),
        coordinator.enqueue_scoring(&item, "fp-contested".into()),
    );

    backend.gate.add_permits(8);
    wait_scoring_idle(&coordinator).await;
    assert_eq!(
        backend.executions.load(Ordering::SeqCst),
        1,
        "second enqueue must be dropped while the first is in flight"
    );
}

#[tokio::test]
async fn fingerprint_can_be_rescored_after_the_job_drains() {
    let store = Arc::new(MemoryStore::new());
    let backend = Arc::new(GatedBackend {
        executions: AtomicUsize::new(0),
        gate: tokio::sync::Semaphore::new(8),
    });
    let (coordinator, _shutdown) = Coordinator::new(
        store.clone(),
        backend.clone(),
        Vec::new(),
        &test_pipeline_config(),
    );

    let item = store
        .create_item_if_absent("fp-again", new_item("a"))
        .unwrap()
        .unwrap();

    coordinator.enqueue_scoring(&item, "fp-again".into()).await;
    wait_scoring_idle(&coordinator).await;
    coordinator.enqueue_scoring(&item, "fp-again".into()).await;
    wait_scoring_idle(&coordinator).await;

    assert_eq!(backend.executions.load(Ordering::SeqCst), 2);
    let analysis = store.analysis_for(item.id).unwrap().unwrap();
    assert_eq!(analysis.model_name, "gated", "re-analysis replaced the record");
}

#[tokio::test]
async fn shutdown_aborts_in_flight_fetches_and_marks_sources_incomplete() {
    // A feed that would take far longer than the test allows.
    let router = axum::Router::new().route(
        "/stuck.rss",
        axum::routing::get(|| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            "<rss><channel/></rss>"
        }),
    );
    let base = spawn_router(router).await;

    let store = Arc::new(MemoryStore::new());
    let (coordinator, shutdown) = Coordinator::new(
        store.clone(),
        Arc::new(StubBackend),
        vec![rss_source("Stuck", &base, "/stuck.rss")],
        &test_pipeline_config(),
    );

    let running = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(None).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.send(true).expect("signal shutdown");

    let outcome = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("run must terminate promptly on shutdown")
        .unwrap();
    let RunOutcome::Completed(summary) = outcome else {
        panic!("aborted run still finalizes");
    };
    assert_eq!(summary.new_items, 0);

    let run = store.get_run(summary.run_id).unwrap().unwrap();
    assert!(run.finished_at.is_some());
    assert!(run.sources[0].incomplete, "abandoned source is marked incomplete");
}

#[tokio::test]
async fn overlapping_triggers_are_skipped() {
    // A feed that answers slowly enough to hold the run lock.
    let router = axum::Router::new().route(
        "/slow.rss",
        axum::routing::get(|| async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            r#"<rss><channel><item><title>t</title><link>https://s.test/1</link></item></channel></rss>"#
        }),
    );
    let base = spawn_router(router).await;

    let store = Arc::new(MemoryStore::new());
    let (coordinator, _shutdown) = Coordinator::new(
        store.clone(),
        Arc::new(StubBackend),
        vec![rss_source("Slow", &base, "/slow.rss")],
        &test_pipeline_config(),
    );

    let racing = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.run(None).await.unwrap() })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second = coordinator.run(None).await.unwrap();
    assert_eq!(second, RunOutcome::Skipped);

    let first = racing.await.unwrap();
    assert!(matches!(first, RunOutcome::Completed(s) if s.new_items == 1));
}
