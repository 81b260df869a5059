// src/ingest/extract.rs
//! Best-effort attribute extraction over entry text. Pattern matching only:
//! a miss yields `None`, never an error, and never blocks item creation.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::item::{CompanyDetails, FundingDetails, ItemDetails, ItemType, RoundType};

use super::types::SourceCategory;
use super::truncate_chars;

const FUNDING_KEYWORDS: [&str; 16] = [
    "raise",
    "raised",
    "funding",
    "series",
    "seed",
    "investment",
    "million",
    "billion",
    "$",
    "valuation",
    "round",
    "venture",
    "backed",
    "investor",
    "capital",
    "led by",
];

/// Decide whether an entry is about a funding event or a company. Keyword
/// scan first, source category as a hint, company as the default.
pub fn classify(title: &str, summary: &str, category: Option<SourceCategory>) -> ItemType {
    let title_lower = title.to_lowercase();
    let summary_lower = summary.to_lowercase();

    for kw in FUNDING_KEYWORDS {
        if title_lower.contains(kw) || summary_lower.contains(kw) {
            return ItemType::Funding;
        }
    }
    if category == Some(SourceCategory::Funding) {
        return ItemType::Funding;
    }
    ItemType::Company
}

/// Company name from the title (heuristic): capitalized run before a common
/// announcement verb, or before a comma, else leading words up to a verb.
pub fn extract_company_name(title: &str) -> Option<String> {
    static RES: OnceCell<Vec<Regex>> = OnceCell::new();
    let res = RES.get_or_init(|| {
        [
            r"^([A-Z][A-Za-z0-9\s\.]+?)(?:\s+raises?\s)",
            r"^([A-Z][A-Za-z0-9\s\.]+?)(?:\s+announces?\s)",
            r"^([A-Z][A-Za-z0-9\s\.]+?)(?:\s+secures?\s)",
            r"^([A-Z][A-Za-z0-9\s\.]+?)(?:\s+closes?\s)",
            r"^([A-Z][A-Za-z0-9\s\.]+?)(?:\s+gets?\s)",
            r"^([A-Z][A-Za-z0-9\s\.]+?)(?:,\s)",
        ]
        .iter()
        .map(|p| Regex::new(p).unwrap())
        .collect()
    });

    for re in res.iter() {
        if let Some(cap) = re.captures(title) {
            return Some(cap[1].trim().to_string());
        }
    }

    // Fallback: first few words until a verb or separator.
    let stop = ["raises", "announces", "secures", "closes", "gets", "lands", "-", "–", "|"];
    let mut words = Vec::new();
    for w in title.split_whitespace().take(5) {
        if stop.contains(&w.to_lowercase().as_str()) {
            break;
        }
        words.push(w);
    }
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn round_type(text: &str) -> Option<RoundType> {
    static RE_SERIES: OnceCell<Regex> = OnceCell::new();
    let re_series = RE_SERIES.get_or_init(|| Regex::new(r"series\s+([a-z])\b").unwrap());

    if text.contains("pre-seed") || text.contains("pre seed") {
        return Some(RoundType::PreSeed);
    }
    if let Some(cap) = re_series.captures(text) {
        return Some(match &cap[1] {
            "a" => RoundType::SeriesA,
            "b" => RoundType::SeriesB,
            "c" => RoundType::SeriesC,
            _ => RoundType::Unknown,
        });
    }
    if text.contains("seed") {
        return Some(RoundType::Seed);
    }
    if text.contains("growth round") {
        return Some(RoundType::Growth);
    }
    None
}

/// Amount in whole USD from "$12M" / "$1.2B" / "$500K" / "$10 million" /
/// "12 million dollars". Multipliers: K 1e3, M 1e6, B 1e9.
fn amount_usd(text: &str) -> Option<f64> {
    static RE_DOLLAR: OnceCell<Regex> = OnceCell::new();
    static RE_WORDED: OnceCell<Regex> = OnceCell::new();
    let re_dollar = RE_DOLLAR.get_or_init(|| {
        Regex::new(r"\$\s*(\d+(?:\.\d+)?)\s*(billion|million|thousand|b|m|k)\b").unwrap()
    });
    let re_worded = RE_WORDED
        .get_or_init(|| Regex::new(r"(\d+(?:\.\d+)?)\s*(billion|million)\s+dollars").unwrap());

    let (value, unit) = if let Some(cap) = re_dollar.captures(text) {
        (cap[1].parse::<f64>().ok()?, cap[2].to_string())
    } else if let Some(cap) = re_worded.captures(text) {
        (cap[1].parse::<f64>().ok()?, cap[2].to_string())
    } else {
        return None;
    };

    let mult = match unit.as_str() {
        "billion" | "b" => 1e9,
        "million" | "m" => 1e6,
        "thousand" | "k" => 1e3,
        _ => return None,
    };
    Some(value * mult)
}

const REGIONS: [&str; 16] = [
    "MENA",
    "Saudi Arabia",
    "Riyadh",
    "UAE",
    "Dubai",
    "Abu Dhabi",
    "Egypt",
    "Qatar",
    "Kuwait",
    "Bahrain",
    "Oman",
    "Jordan",
    "Morocco",
    "Tunisia",
    "Middle East",
    "North Africa",
];

/// Free-text best-effort geography token: first region name found.
fn geography(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    REGIONS
        .iter()
        .find(|r| lower.contains(&r.to_lowercase()))
        .map(|r| r.to_string())
}

fn stage_hint(text: &str) -> Option<String> {
    if text.contains("series b") || text.contains("series c") || text.contains("growth") {
        Some("growth".to_string())
    } else if text.contains("seed") || text.contains("early stage") || text.contains("early-stage")
    {
        Some("early".to_string())
    } else {
        None
    }
}

pub fn extract_funding_details(title: &str, summary: &str) -> FundingDetails {
    let text = format!("{title} {summary}").to_lowercase();
    FundingDetails {
        round_type: Some(round_type(&text).unwrap_or(RoundType::Unknown)),
        amount_usd: amount_usd(&text),
        investors: Vec::new(),
        geography: geography(&format!("{title} {summary}")),
    }
}

pub fn extract_company_details(
    title: &str,
    summary: &str,
    category: Option<SourceCategory>,
) -> CompanyDetails {
    let text = format!("{title} {summary}").to_lowercase();
    CompanyDetails {
        one_liner: if summary.is_empty() {
            None
        } else {
            Some(truncate_chars(summary, 200))
        },
        category: category.map(|c| {
            match c {
                SourceCategory::Funding => "funding",
                SourceCategory::Companies => "companies",
                SourceCategory::News => "news",
            }
            .to_string()
        }),
        stage_hint: stage_hint(&text),
        geography: geography(&format!("{title} {summary}")),
    }
}

/// Details matching the item's type; the other side stays empty.
pub fn extract_details(
    item_type: ItemType,
    title: &str,
    summary: &str,
    category: Option<SourceCategory>,
) -> ItemDetails {
    match item_type {
        ItemType::Funding => ItemDetails {
            funding: Some(extract_funding_details(title, summary)),
            company: None,
        },
        ItemType::Company => ItemDetails {
            funding: None,
            company: Some(extract_company_details(title, summary, category)),
        },
    }
}
