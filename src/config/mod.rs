// src/config/mod.rs
pub mod ai;
pub mod sources;

/// Pipeline knobs read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Scheduler interval between runs.
    pub interval_secs: u64,
    /// Fixed worker pool size draining the scoring queue.
    pub workers: usize,
    /// Deadline for one feed fetch.
    pub fetch_timeout_secs: u64,
    /// Scoring queue bound; enqueues beyond it wait.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30 * 60,
            workers: 4,
            fetch_timeout_secs: 10,
            queue_capacity: 256,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            interval_secs: env_parse("INGEST_INTERVAL_SECS", d.interval_secs),
            workers: env_parse("SCORE_WORKERS", d.workers).max(1),
            fetch_timeout_secs: env_parse("FETCH_TIMEOUT_SECS", d.fetch_timeout_secs),
            queue_capacity: env_parse("SCORE_QUEUE_CAPACITY", d.queue_capacity).max(1),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
