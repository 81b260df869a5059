// src/ingest/fetcher.rs
//! One-shot feed retrieval. Exactly one attempt per call; the coordinator
//! owns retry policy. Failures are reason-coded, never panics.

use std::time::Duration;

use sha2::{Digest, Sha256};

use super::types::FetchError;

/// Result of a successful poll. The token is handed back on the next cycle
/// for a cheap unchanged-content check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched { body: String, token: String },
    /// Body hashed to the previous token; nothing new to parse.
    Unchanged,
}

#[derive(Clone)]
pub struct FeedFetcher {
    http: reqwest::Client,
}

impl FeedFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("mena-signal/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("reqwest client");
        Self { http }
    }

    pub async fn fetch(
        &self,
        endpoint: &str,
        prev_token: Option<&str>,
    ) -> Result<FetchOutcome, FetchError> {
        let resp = self.http.get(endpoint).send().await.map_err(classify)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = resp.text().await.map_err(|_| FetchError::Malformed)?;
        if body.trim().is_empty() {
            return Err(FetchError::Malformed);
        }

        let token = content_token(&body);
        if prev_token == Some(token.as_str()) {
            return Ok(FetchOutcome::Unchanged);
        }
        Ok(FetchOutcome::Fetched { body, token })
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Unreachable
    }
}

/// Content token for conditional fetches: SHA-256 of the raw body.
pub fn content_token(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}
