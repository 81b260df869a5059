// src/ingest/scheduler.rs
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::coordinator::{Coordinator, RunOutcome};

#[derive(Clone, Copy, Debug)]
pub struct IngestSchedulerCfg {
    pub interval_secs: u64,
    /// Run once immediately at startup before the first tick.
    pub run_on_start: bool,
}

/// Spawn the periodic trigger. Each tick requests a full run; overlapping
/// ticks are skipped by the coordinator's run lock (and logged here).
pub fn spawn_scheduler(cfg: IngestSchedulerCfg, coordinator: Arc<Coordinator>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(cfg.interval_secs.max(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        if !cfg.run_on_start {
            // The first interval tick fires immediately; consume it.
            ticker.tick().await;
        }

        loop {
            ticker.tick().await;
            match coordinator.run(None).await {
                Ok(RunOutcome::Completed(summary)) => {
                    info!(
                        target: "ingest",
                        run_id = summary.run_id,
                        new_items = summary.new_items,
                        duplicates = summary.duplicates,
                        sources_failed = summary.sources_failed,
                        "scheduled ingest tick"
                    );
                }
                Ok(RunOutcome::Skipped) => {
                    info!(target: "ingest", "scheduled tick skipped: run in progress");
                }
                Err(e) => {
                    warn!(target: "ingest", error = %e, "scheduled run failed at the persistence boundary");
                }
            }
        }
    })
}
