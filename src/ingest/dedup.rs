// src/ingest/dedup.rs
//! Fingerprinting and novelty checks.
//!
//! Fingerprint collision is the sole dedup signal: a republish of a known
//! fingerprint is always dropped, even if the body changed (items are frozen
//! on first sight).

use std::sync::Arc;

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use url::Url;

use crate::store::ItemStore;

/// Query parameters that carry tracking state, never identity.
const TRACKING_PARAMS: [&str; 7] = [
    "fbclid", "gclid", "mc_cid", "mc_eid", "igshid", "ref", "utm",
];

fn is_tracking_param(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k.starts_with("utm_") || TRACKING_PARAMS.contains(&k.as_str())
}

/// Canonical form of a URL for fingerprinting: scheme/host/path lowercased,
/// default port dropped, tracking params stripped, trailing slash trimmed.
/// Returns `None` when the input does not parse as an absolute URL.
pub fn canonical_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme().to_ascii_lowercase();
    let path = parsed.path().to_ascii_lowercase();
    let path = path.trim_end_matches('/');

    let kept: Vec<String> = parsed
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| {
            if v.is_empty() {
                k.into_owned()
            } else {
                format!("{k}={v}")
            }
        })
        .collect();

    let mut out = format!("{scheme}://{host}");
    // Default ports are normalized away by the parser; keep explicit ones.
    if let Some(port) = parsed.port() {
        out.push_str(&format!(":{port}"));
    }
    out.push_str(path);
    if !kept.is_empty() {
        out.push('?');
        out.push_str(&kept.join("&"));
    }
    Some(out)
}

/// Stable dedup key for a candidate entry. Prefers the canonical URL; falls
/// back to normalized title + source when no usable URL is present.
pub fn fingerprint(url: Option<&str>, title: &str, source: &str) -> String {
    let basis = url
        .and_then(canonical_url)
        .unwrap_or_else(|| format!("{}|{}", normalize_title(title), source));

    let mut hasher = Sha256::new();
    hasher.update(basis.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_title(title: &str) -> String {
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws
        .replace_all(title.trim(), " ")
        .to_ascii_lowercase()
        .to_string()
}

/// Novelty check against persisted item fingerprints. Safe under concurrent
/// calls for different fingerprints; never mutates anything.
#[derive(Clone)]
pub struct Deduplicator {
    store: Arc<dyn ItemStore>,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self { store }
    }

    pub fn is_known(&self, fp: &str) -> anyhow::Result<bool> {
        self.store.is_known(fp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_params_do_not_change_fingerprint() {
        let a = fingerprint(
            Some("https://news.test/article/123?utm_source=rss&utm_medium=feed"),
            "t",
            "s",
        );
        let b = fingerprint(Some("https://news.test/article/123"), "t", "s");
        assert_eq!(a, b);
    }

    #[test]
    fn case_and_trailing_slash_are_normalized() {
        let a = fingerprint(Some("HTTPS://News.Test/Article/"), "t", "s");
        let b = fingerprint(Some("https://news.test/article"), "t", "s");
        assert_eq!(a, b);
    }

    #[test]
    fn distinct_hosts_never_collide() {
        let a = fingerprint(Some("https://a.test/story"), "t", "s");
        let b = fingerprint(Some("https://b.test/story"), "t", "s");
        assert_ne!(a, b);
    }

    #[test]
    fn explicit_ports_distinguish_default_ports_do_not() {
        let default_port = fingerprint(Some("http://a.test:80/story"), "t", "s");
        let bare = fingerprint(Some("http://a.test/story"), "t", "s");
        assert_eq!(default_port, bare);
        let odd_port = fingerprint(Some("http://a.test:8080/story"), "t", "s");
        assert_ne!(odd_port, bare);
    }

    #[test]
    fn meaningful_query_params_are_kept() {
        let a = fingerprint(Some("https://a.test/story?id=1"), "t", "s");
        let b = fingerprint(Some("https://a.test/story?id=2"), "t", "s");
        assert_ne!(a, b);
    }

    #[test]
    fn title_fallback_when_no_url() {
        let a = fingerprint(None, "  Acme   Raises $10M ", "TechWire");
        let b = fingerprint(None, "acme raises $10m", "TechWire");
        assert_eq!(a, b);
        let c = fingerprint(None, "acme raises $10m", "OtherWire");
        assert_ne!(a, c);
    }
}
