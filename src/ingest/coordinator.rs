// src/ingest/coordinator.rs
//! Orchestrates one ingestion run across all enabled sources and owns the
//! scoring queue. Runs never overlap: a trigger that fires while a run is
//! processing is skipped. Scoring drains on a fixed worker pool, decoupled
//! from fetch/parse so model latency never blocks feed polling.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};

use anyhow::{Context, Result};
use metrics::{counter, gauge};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::analyze::{DynScoreBackend, ItemSnapshot};
use crate::config::PipelineConfig;
use crate::item::{Item, ItemId, NewItem};
use crate::store::{ItemStore, RunId, RunStatus, SourceCounts};

use super::dedup::{fingerprint, Deduplicator};
use super::extract;
use super::fetcher::{FeedFetcher, FetchOutcome};
use super::parser;
use super::types::{Source, SourceKind};

/// One unit of work for the scoring pool.
struct ScoreJob {
    item_id: ItemId,
    fingerprint: String,
    snapshot: ItemSnapshot,
}

/// Result of a trigger: either a finalized run, or a skip because the
/// previous run still held the run lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RunOutcome {
    Completed(RunSummary),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub fetched: usize,
    pub new_items: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Started,
    FetchingSources,
    Processing,
    Finalized,
}

pub struct Coordinator {
    store: Arc<dyn ItemStore>,
    dedup: Deduplicator,
    fetcher: FeedFetcher,
    sources: RwLock<Vec<Source>>,
    /// Per-endpoint content token from the previous cycle.
    tokens: Mutex<HashMap<String, String>>,
    /// Fingerprints with a scoring job outstanding.
    inflight: Arc<Mutex<HashSet<String>>>,
    /// Held for the whole run; `try_lock` failure means "skip this trigger".
    run_lock: tokio::sync::Mutex<()>,
    queue: mpsc::Sender<ScoreJob>,
    shutdown: watch::Receiver<bool>,
}

impl Coordinator {
    /// Build the coordinator and spawn its scoring worker pool. The returned
    /// sender aborts in-flight runs when set to `true` (shutdown).
    pub fn new(
        store: Arc<dyn ItemStore>,
        backend: DynScoreBackend,
        sources: Vec<Source>,
        cfg: &PipelineConfig,
    ) -> (Arc<Self>, watch::Sender<bool>) {
        super::ensure_metrics_described();

        let (queue_tx, queue_rx) = mpsc::channel::<ScoreJob>(cfg.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let inflight = Arc::new(Mutex::new(HashSet::new()));

        let queue_rx = Arc::new(tokio::sync::Mutex::new(queue_rx));
        for worker in 0..cfg.workers {
            tokio::spawn(score_worker(
                worker,
                Arc::clone(&queue_rx),
                Arc::clone(&store),
                Arc::clone(&backend),
                Arc::clone(&inflight),
            ));
        }

        let coordinator = Arc::new(Self {
            dedup: Deduplicator::new(Arc::clone(&store)),
            store,
            fetcher: FeedFetcher::new(cfg.fetch_timeout_secs),
            sources: RwLock::new(sources),
            tokens: Mutex::new(HashMap::new()),
            inflight,
            run_lock: tokio::sync::Mutex::new(()),
            queue: queue_tx,
            shutdown: shutdown_rx,
        });
        (coordinator, shutdown_tx)
    }

    /// Replace the source list observed by the *next* run.
    pub fn set_sources(&self, sources: Vec<Source>) {
        *self.sources.write().expect("sources lock poisoned") = sources;
    }

    /// Execute one run over enabled feed sources, optionally restricted to a
    /// single source by name. Returns `Skipped` when a run is already in
    /// flight; errors only on persistence-boundary failure.
    pub async fn run(self: &Arc<Self>, only: Option<&str>) -> Result<RunOutcome> {
        let Ok(_guard) = self.run_lock.try_lock() else {
            warn!("ingestion trigger skipped: previous run still processing");
            counter!("ingest_runs_skipped_total").increment(1);
            return Ok(RunOutcome::Skipped);
        };

        let mut state = RunState::Started;
        let run_id = self.store.begin_run().context("recording run start")?;
        counter!("ingest_runs_total").increment(1);
        info!(run_id, ?state, "ingestion run started");

        state = RunState::FetchingSources;
        debug!(run_id, ?state, "run state");
        let snapshot: Vec<Source> = {
            let g = self.sources.read().expect("sources lock poisoned");
            g.iter()
                .filter(|s| s.enabled)
                .filter(|s| s.kind != SourceKind::Manual)
                .filter(|s| only.is_none_or(|name| s.name == name))
                .cloned()
                .collect()
        };

        state = RunState::Processing;
        debug!(run_id, ?state, sources = snapshot.len(), "run state");
        let mut tasks = JoinSet::new();
        for src in snapshot {
            let this = Arc::clone(self);
            tasks.spawn(async move {
                let mut shutdown = this.shutdown.clone();
                tokio::select! {
                    out = this.process_source(&src) => out,
                    _ = async {
                        // A dropped sender means shutdown can never fire.
                        if shutdown.wait_for(|v| *v).await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    } => {
                        let mut counts = SourceCounts::named(&src.name);
                        counts.incomplete = true;
                        (counts, None)
                    }
                }
            });
        }

        let mut per_source: Vec<SourceCounts> = Vec::new();
        let mut run_error: Option<String> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((counts, fatal)) => {
                    if let Some(e) = fatal {
                        run_error.get_or_insert(e);
                    }
                    per_source.push(counts);
                }
                Err(e) => {
                    warn!(error = %e, "source task failed to join");
                    run_error.get_or_insert_with(|| format!("source task panicked: {e}"));
                }
            }
        }
        per_source.sort_by(|a, b| a.source.cmp(&b.source));

        state = RunState::Finalized;
        debug!(run_id, ?state, "run state");
        let status = if run_error.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        let summary = summarize(run_id, status, &per_source);
        self.store
            .finalize_run(run_id, status, per_source, run_error)
            .context("recording run end")?;
        gauge!("ingest_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);
        info!(
            run_id,
            sources_ok = summary.sources_ok,
            sources_failed = summary.sources_failed,
            new_items = summary.new_items,
            duplicates = summary.duplicates,
            "ingestion run finalized"
        );
        Ok(RunOutcome::Completed(summary))
    }

    /// Fetch → parse → dedupe → extract → create → enqueue, for one source.
    /// Returns the per-source counts plus a fatal persistence error, if any.
    async fn process_source(&self, src: &Source) -> (SourceCounts, Option<String>) {
        let mut counts = SourceCounts::named(&src.name);

        let prev_token = {
            let g = self.tokens.lock().expect("tokens lock poisoned");
            g.get(&src.endpoint).cloned()
        };

        let body = match self.fetcher.fetch(&src.endpoint, prev_token.as_deref()).await {
            Ok(FetchOutcome::Fetched { body, token }) => {
                let mut g = self.tokens.lock().expect("tokens lock poisoned");
                g.insert(src.endpoint.clone(), token);
                body
            }
            Ok(FetchOutcome::Unchanged) => {
                debug!(source = %src.name, "feed unchanged since last cycle");
                return (counts, None);
            }
            Err(e) => {
                warn!(source = %src.name, reason = e.reason_code(), error = %e, "fetch failed");
                counter!("ingest_source_errors_total").increment(1);
                counts.error = Some(format!("{}: {e}", e.reason_code()));
                return (counts, None);
            }
        };

        let parsed = match parser::parse_feed(src.kind, &body) {
            Ok(p) => p,
            Err(e) => {
                warn!(source = %src.name, error = %e, "feed parse failed");
                counter!("ingest_source_errors_total").increment(1);
                counts.error = Some(format!("parse-failed: {e}"));
                return (counts, None);
            }
        };
        counts.fetched = parsed.entries.len();
        counts.failed = parsed.skipped;

        for entry in parsed.entries {
            let fp = fingerprint(entry.link.as_deref(), &entry.title, &src.name);

            match self.dedup.is_known(&fp) {
                Ok(true) => {
                    counts.duplicates += 1;
                    counter!("ingest_duplicates_total").increment(1);
                    continue;
                }
                Ok(false) => {}
                Err(e) => return (counts, Some(format!("dedup lookup: {e:#}"))),
            }

            let summary = entry.summary.clone().unwrap_or_default();
            let item_type = extract::classify(&entry.title, &summary, src.category);
            let details = extract::extract_details(item_type, &entry.title, &summary, src.category);
            let new = NewItem {
                item_type,
                company_name: extract::extract_company_name(&entry.title),
                title: entry.title,
                url: entry.link.unwrap_or_default(),
                source_name: src.name.clone(),
                published_at: entry.published_at,
                summary: entry.summary,
                details,
            };

            match self.store.create_item_if_absent(&fp, new) {
                Ok(Some(item)) => {
                    counts.new_items += 1;
                    counter!("ingest_items_new_total").increment(1);
                    self.enqueue_scoring(&item, fp).await;
                }
                Ok(None) => {
                    // Lost the race to another source seeing the same URL.
                    counts.duplicates += 1;
                    counter!("ingest_duplicates_total").increment(1);
                }
                Err(e) => return (counts, Some(format!("create item: {e:#}"))),
            }
        }

        (counts, None)
    }

    /// Queue an item for scoring, at most one in-flight job per fingerprint.
    /// A second enqueue while a job is outstanding is dropped, not duplicated.
    pub async fn enqueue_scoring(&self, item: &Item, fingerprint: String) {
        {
            let mut g = self.inflight.lock().expect("inflight lock poisoned");
            if !g.insert(fingerprint.clone()) {
                debug!(item = item.id, "scoring enqueue dropped: job already in flight");
                counter!("score_inflight_dropped_total").increment(1);
                return;
            }
        }
        let job = ScoreJob {
            item_id: item.id,
            fingerprint: fingerprint.clone(),
            snapshot: ItemSnapshot::from(item),
        };
        if self.queue.send(job).await.is_err() {
            warn!(item = item.id, "scoring queue closed, job dropped");
            let mut g = self.inflight.lock().expect("inflight lock poisoned");
            g.remove(&fingerprint);
        }
    }

    /// True while any scoring job is queued or executing. Test hook.
    pub fn scoring_idle(&self) -> bool {
        self.inflight.lock().expect("inflight lock poisoned").is_empty()
    }
}

fn summarize(run_id: RunId, status: RunStatus, per_source: &[SourceCounts]) -> RunSummary {
    let failed = per_source.iter().filter(|c| c.error.is_some()).count();
    RunSummary {
        run_id,
        status,
        sources_ok: per_source.len() - failed,
        sources_failed: failed,
        fetched: per_source.iter().map(|c| c.fetched).sum(),
        new_items: per_source.iter().map(|c| c.new_items).sum(),
        duplicates: per_source.iter().map(|c| c.duplicates).sum(),
    }
}

async fn score_worker(
    worker: usize,
    queue: Arc<tokio::sync::Mutex<mpsc::Receiver<ScoreJob>>>,
    store: Arc<dyn ItemStore>,
    backend: DynScoreBackend,
    inflight: Arc<Mutex<HashSet<String>>>,
) {
    loop {
        let job = { queue.lock().await.recv().await };
        let Some(job) = job else {
            debug!(worker, "scoring queue closed, worker exiting");
            break;
        };

        let analysis = backend.score(&job.snapshot).await;
        counter!("score_jobs_total").increment(1);
        if let Err(e) = store.save_analysis(job.item_id, analysis) {
            warn!(worker, item = job.item_id, error = %e, "failed to persist analysis");
        }

        let mut g = inflight.lock().expect("inflight lock poisoned");
        g.remove(&job.fingerprint);
    }
}
