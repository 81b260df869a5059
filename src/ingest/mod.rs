// src/ingest/mod.rs
pub mod coordinator;
pub mod dedup;
pub mod extract;
pub mod fetcher;
pub mod parser;
pub mod scheduler;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_runs_total", "Ingestion runs started.");
        describe_counter!(
            "ingest_runs_skipped_total",
            "Triggers skipped because a run was already in flight."
        );
        describe_counter!("ingest_entries_total", "Candidate entries parsed from feeds.");
        describe_counter!("ingest_items_new_total", "Items created on first sighting.");
        describe_counter!(
            "ingest_duplicates_total",
            "Candidates dropped by fingerprint dedup."
        );
        describe_counter!(
            "ingest_entries_skipped_total",
            "Malformed entries skipped inside otherwise valid feeds."
        );
        describe_counter!(
            "ingest_source_errors_total",
            "Source-level fetch/parse failures."
        );
        describe_counter!("score_jobs_total", "Scoring jobs executed by the worker pool.");
        describe_counter!(
            "score_degraded_total",
            "Scoring jobs that fell back to stub values after model failure."
        );
        describe_counter!(
            "score_inflight_dropped_total",
            "Enqueues dropped because the fingerprint already had a job in flight."
        );
        describe_histogram!("ingest_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "ingest_last_run_ts",
            "Unix ts when the ingestion pipeline last ran."
        );
    });
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Summary cap applied when candidate entries are built.
pub const SUMMARY_MAX_CHARS: usize = 500;

pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        s.chars().take(max).collect()
    } else {
        s.to_string()
    }
}
