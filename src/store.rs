//! store.rs — persistence boundary for the pipeline.
//!
//! The pipeline does not implement storage; it talks to an `ItemStore` whose
//! calls are assumed transactional one by one. The in-memory implementation
//! here backs tests and local runs, guarded by a single mutex.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analyze::rubric::MenaAnalysis;
use crate::item::{Item, ItemId, NewItem};

pub type RunId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

/// Per-source outcome recorded on the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceCounts {
    pub source: String,
    /// Candidate entries parsed from the feed.
    pub fetched: usize,
    pub new_items: usize,
    pub duplicates: usize,
    /// Entries skipped (missing fields) or rejected by the store.
    pub failed: usize,
    /// Source-level fetch/parse failure, as "reason-code: detail".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// True when the run was aborted before this source finished.
    #[serde(default)]
    pub incomplete: bool,
}

impl SourceCounts {
    pub fn named(source: &str) -> Self {
        Self {
            source: source.to_string(),
            ..Self::default()
        }
    }
}

/// Audit record for one ingestion run. Created at run start, finalized at run
/// end, immutable afterward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionRun {
    pub id: RunId,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    #[serde(default)]
    pub sources: Vec<SourceCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The boundary the pipeline persists through. Every call is transactional on
/// its own; there is no cross-call transaction.
pub trait ItemStore: Send + Sync {
    /// Create the item unless the fingerprint is already known.
    /// Returns the created item, or `None` on a fingerprint collision.
    fn create_item_if_absent(&self, fingerprint: &str, new: NewItem) -> Result<Option<Item>>;

    fn is_known(&self, fingerprint: &str) -> Result<bool>;

    /// Attach the live analysis, replacing any previous one.
    fn save_analysis(&self, item_id: ItemId, analysis: MenaAnalysis) -> Result<()>;

    fn begin_run(&self) -> Result<RunId>;

    fn finalize_run(
        &self,
        id: RunId,
        status: RunStatus,
        sources: Vec<SourceCounts>,
        error: Option<String>,
    ) -> Result<()>;

    fn get_run(&self, id: RunId) -> Result<Option<IngestionRun>>;

    fn get_item(&self, id: ItemId) -> Result<Option<Item>>;

    fn analysis_for(&self, item_id: ItemId) -> Result<Option<MenaAnalysis>>;

    fn item_count(&self) -> Result<usize>;
}

#[derive(Default)]
struct MemoryInner {
    items: HashMap<ItemId, Item>,
    by_fingerprint: HashMap<String, ItemId>,
    analyses: HashMap<ItemId, MenaAnalysis>,
    runs: HashMap<RunId, IngestionRun>,
    next_item_id: ItemId,
    next_run_id: RunId,
}

/// Reference in-memory store. Short critical sections behind one mutex keep
/// `create_item_if_absent` atomic under concurrent sources.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ItemStore for MemoryStore {
    fn create_item_if_absent(&self, fingerprint: &str, new: NewItem) -> Result<Option<Item>> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        if g.by_fingerprint.contains_key(fingerprint) {
            return Ok(None);
        }
        g.next_item_id += 1;
        let id = g.next_item_id;
        let item = Item::from_new(id, fingerprint, new);
        g.by_fingerprint.insert(fingerprint.to_string(), id);
        g.items.insert(id, item.clone());
        Ok(Some(item))
    }

    fn is_known(&self, fingerprint: &str) -> Result<bool> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.by_fingerprint.contains_key(fingerprint))
    }

    fn save_analysis(&self, item_id: ItemId, analysis: MenaAnalysis) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        anyhow::ensure!(g.items.contains_key(&item_id), "unknown item {item_id}");
        g.analyses.insert(item_id, analysis);
        Ok(())
    }

    fn begin_run(&self) -> Result<RunId> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        g.next_run_id += 1;
        let id = g.next_run_id;
        g.runs.insert(
            id,
            IngestionRun {
                id,
                started_at: Utc::now(),
                finished_at: None,
                status: RunStatus::Running,
                sources: Vec::new(),
                error: None,
            },
        );
        Ok(id)
    }

    fn finalize_run(
        &self,
        id: RunId,
        status: RunStatus,
        sources: Vec<SourceCounts>,
        error: Option<String>,
    ) -> Result<()> {
        let mut g = self.inner.lock().expect("store mutex poisoned");
        let run = g
            .runs
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("unknown run {id}"))?;
        run.finished_at = Some(Utc::now());
        run.status = status;
        run.sources = sources;
        run.error = error;
        Ok(())
    }

    fn get_run(&self, id: RunId) -> Result<Option<IngestionRun>> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.runs.get(&id).cloned())
    }

    fn get_item(&self, id: ItemId) -> Result<Option<Item>> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.items.get(&id).cloned())
    }

    fn analysis_for(&self, item_id: ItemId) -> Result<Option<MenaAnalysis>> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.analyses.get(&item_id).cloned())
    }

    fn item_count(&self) -> Result<usize> {
        let g = self.inner.lock().expect("store mutex poisoned");
        Ok(g.items.len())
    }
}
