// tests/ingest_scheduler.rs
mod common;

use std::sync::Arc;
use std::time::Duration;

use mena_signal::analyze::StubBackend;
use mena_signal::ingest::coordinator::Coordinator;
use mena_signal::ingest::scheduler::{spawn_scheduler, IngestSchedulerCfg};
use mena_signal::store::{ItemStore, MemoryStore};

use common::{rss_source, serve_feeds, test_pipeline_config};

const FUNDING_RSS: &str = include_str!("fixtures/funding_rss.xml");

#[tokio::test]
async fn startup_tick_triggers_a_full_run() {
    let base = serve_feeds(vec![("/funding.rss", FUNDING_RSS.to_string())]).await;
    let store = Arc::new(MemoryStore::new());
    let (coordinator, _shutdown) = Coordinator::new(
        store.clone(),
        Arc::new(StubBackend),
        vec![rss_source("TechWire", &base, "/funding.rss")],
        &test_pipeline_config(),
    );

    let handle = spawn_scheduler(
        IngestSchedulerCfg {
            interval_secs: 3600,
            run_on_start: true,
        },
        coordinator,
    );

    let mut created = 0;
    for _ in 0..500 {
        created = store.item_count().unwrap();
        if created == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    handle.abort();
    assert_eq!(created, 3, "scheduler's startup tick should ingest the feed");
}
