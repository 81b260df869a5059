// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Feed dialect / source kind declared in configuration. Unknown kinds are
/// kept (not silently coerced) so the parser can fail closed on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Rss,
    Atom,
    /// Populated through the management surface, never polled.
    Manual,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceCategory {
    Funding,
    Companies,
    News,
}

/// One configured source, read by the coordinator at run start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    pub kind: SourceKind,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<SourceCategory>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Ephemeral parser output. Either promoted to an `Item` or discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub title: String,
    pub link: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
}

/// Single-attempt fetch failures. The coordinator records the reason code on
/// the run; retry policy lives one layer up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("fetch timed out")]
    Timeout,
    #[error("endpoint unreachable")]
    Unreachable,
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("malformed response body")]
    Malformed,
}

impl FetchError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            FetchError::Timeout => "timeout",
            FetchError::Unreachable => "unreachable",
            FetchError::HttpStatus(_) => "http-error",
            FetchError::Malformed => "malformed-response",
        }
    }
}

/// Feed-level parse failure. Entry-level problems never surface here; they
/// are skipped per entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid feed xml: {0}")]
    InvalidXml(String),
    #[error("unsupported source kind")]
    UnsupportedKind,
}
