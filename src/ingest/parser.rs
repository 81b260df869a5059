// src/ingest/parser.rs
//! Feed parsing, one dialect per declared source kind.
//!
//! Fault isolation is per entry: an entry missing its link is skipped and
//! counted, it never aborts the rest of the feed. Only a top-level XML
//! failure (or an undeclared dialect) is a feed-level `ParseError`.

use anyhow::Context;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use super::types::{CandidateEntry, ParseError, SourceKind};
use super::{normalize_text, truncate_chars, SUMMARY_MAX_CHARS};

#[derive(Debug, Default, PartialEq)]
pub struct ParsedFeed {
    pub entries: Vec<CandidateEntry>,
    /// Entries dropped for missing required fields.
    pub skipped: usize,
}

/// Parse raw feed text according to the source's declared kind. Unknown and
/// manual kinds fail closed rather than guessing the dialect.
pub fn parse_feed(kind: SourceKind, body: &str) -> Result<ParsedFeed, ParseError> {
    let t0 = std::time::Instant::now();

    let xml_clean = scrub_html_entities_for_xml(body);
    let parsed = match kind {
        SourceKind::Rss => parse_rss(&xml_clean),
        SourceKind::Atom => parse_atom(&xml_clean),
        SourceKind::Manual | SourceKind::Unknown => return Err(ParseError::UnsupportedKind),
    }?;

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("ingest_parse_ms").record(ms);
    counter!("ingest_entries_total").increment(parsed.entries.len() as u64);
    counter!("ingest_entries_skipped_total").increment(parsed.skipped as u64);

    Ok(parsed)
}

// ---- RSS 2.0 ----

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}
#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}
#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

fn parse_rss(xml: &str) -> Result<ParsedFeed, ParseError> {
    let rss: Rss = from_str(xml)
        .context("parsing rss xml")
        .map_err(|e| ParseError::InvalidXml(format!("{e:#}")))?;

    let mut out = ParsedFeed::default();
    for it in rss.channel.item {
        match build_entry(it.title, it.link, it.pub_date, it.description) {
            Some(e) => out.entries.push(e),
            None => out.skipped += 1,
        }
    }
    Ok(out)
}

// ---- Atom ----

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}
#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<String>,
    #[serde(rename = "link", default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<String>,
}
#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

fn parse_atom(xml: &str) -> Result<ParsedFeed, ParseError> {
    let feed: AtomFeed = from_str(xml)
        .context("parsing atom xml")
        .map_err(|e| ParseError::InvalidXml(format!("{e:#}")))?;

    let mut out = ParsedFeed::default();
    for it in feed.entry {
        // Prefer rel="alternate" (or unqualified) links, the entry's page.
        let link = it
            .link
            .iter()
            .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
            .or_else(|| it.link.first())
            .and_then(|l| l.href.clone());
        let date = it.published.or(it.updated);
        match build_entry(it.title, link, date, it.summary) {
            Some(e) => out.entries.push(e),
            None => out.skipped += 1,
        }
    }
    Ok(out)
}

// ---- Shared entry assembly ----

fn build_entry(
    title: Option<String>,
    link: Option<String>,
    date: Option<String>,
    summary: Option<String>,
) -> Option<CandidateEntry> {
    let link = link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty())?;

    let title = match title.as_deref().map(normalize_text) {
        Some(t) if !t.is_empty() => t,
        _ => "Untitled".to_string(),
    };

    let summary = summary
        .as_deref()
        .map(normalize_text)
        .filter(|s| !s.is_empty())
        .map(|s| truncate_chars(&s, SUMMARY_MAX_CHARS));

    Some(CandidateEntry {
        title,
        link: Some(link),
        published_at: date.as_deref().and_then(parse_feed_date),
        summary,
    })
}

/// Accepts RFC 2822 ("Mon, 01 Jul 2024 10:00:00 GMT") and RFC 3339
/// ("2024-07-01T10:00:00Z"); anything else becomes `None`.
fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS_SAMPLE: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>TechWire Funding</title>
    <item>
      <title>Acme raises $12M Series A</title>
      <link>https://techwire.test/acme-series-a</link>
      <pubDate>Mon, 01 Jul 2024 10:00:00 GMT</pubDate>
      <description>&lt;p&gt;Acme, a Riyadh fintech, raised &#36;12M.&lt;/p&gt;</description>
    </item>
    <item>
      <title>No link here</title>
      <description>orphan entry</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn rss_parses_and_skips_linkless_entry() {
        let out = parse_feed(SourceKind::Rss, RSS_SAMPLE).unwrap();
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.skipped, 1);
        let e = &out.entries[0];
        assert_eq!(e.title, "Acme raises $12M Series A");
        assert_eq!(e.link.as_deref(), Some("https://techwire.test/acme-series-a"));
        assert!(e.published_at.is_some());
        assert_eq!(e.summary.as_deref(), Some("Acme, a Riyadh fintech, raised $12M."));
    }

    #[test]
    fn atom_parses_alternate_link_and_rfc3339_date() {
        let xml = r#"<?xml version="1.0"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <title>Launchpad debuts Arabic LLM</title>
    <link rel="self" href="https://launchpad.test/entry.atom"/>
    <link rel="alternate" href="https://launchpad.test/arabic-llm"/>
    <published>2024-07-02T08:30:00Z</published>
    <summary>An Arabic-first model for GCC enterprises.</summary>
  </entry>
</feed>"#;
        let out = parse_feed(SourceKind::Atom, xml).unwrap();
        assert_eq!(out.entries.len(), 1);
        assert_eq!(
            out.entries[0].link.as_deref(),
            Some("https://launchpad.test/arabic-llm")
        );
        assert!(out.entries[0].published_at.is_some());
    }

    #[test]
    fn top_level_garbage_is_a_feed_error() {
        let err = parse_feed(SourceKind::Rss, "this is not xml at all").unwrap_err();
        assert!(matches!(err, ParseError::InvalidXml(_)));
    }

    #[test]
    fn manual_and_unknown_kinds_fail_closed() {
        assert_eq!(
            parse_feed(SourceKind::Manual, RSS_SAMPLE).unwrap_err(),
            ParseError::UnsupportedKind
        );
        assert_eq!(
            parse_feed(SourceKind::Unknown, RSS_SAMPLE).unwrap_err(),
            ParseError::UnsupportedKind
        );
    }

    #[test]
    fn missing_title_defaults_to_untitled() {
        let xml = r#"<rss><channel><item><link>https://a.test/x</link></item></channel></rss>"#;
        let out = parse_feed(SourceKind::Rss, xml).unwrap();
        assert_eq!(out.entries[0].title, "Untitled");
    }

    #[test]
    fn bad_date_becomes_none() {
        let xml = r#"<rss><channel><item>
            <title>t</title>
            <link>https://a.test/x</link>
            <pubDate>yesterday-ish</pubDate>
        </item></channel></rss>"#;
        let out = parse_feed(SourceKind::Rss, xml).unwrap();
        assert!(out.entries[0].published_at.is_none());
    }
}
