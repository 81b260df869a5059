//! item.rs — persisted domain types: items plus their one-to-one detail rows.
//!
//! An `Item` is created exactly once, on first sighting of its fingerprint.
//! Only the `hidden` flag and the owned analysis may change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type ItemId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Funding,
    Company,
}

/// Closed set of funding round labels. Anything the extractor cannot place
/// lands in `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoundType {
    PreSeed,
    Seed,
    SeriesA,
    SeriesB,
    SeriesC,
    Growth,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundingDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_type: Option<RoundType>,
    /// Whole USD, derived from patterns like "$12M" / "$1.2B".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_usd: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub investors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geography: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_liner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geography: Option<String>,
}

/// Structured attributes attached at creation time. At most one side is set,
/// matching the item's type; both absent is fine (extraction is best-effort).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub funding: Option<FundingDetails>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<CompanyDetails>,
}

/// Fields the coordinator supplies when promoting a candidate entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub item_type: ItemType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub url: String,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: ItemDetails,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub fingerprint: String,
    pub item_type: ItemType,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    pub url: String,
    pub source_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: ItemDetails,
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn from_new(id: ItemId, fingerprint: &str, new: NewItem) -> Self {
        Self {
            id,
            fingerprint: fingerprint.to_string(),
            item_type: new.item_type,
            title: new.title,
            company_name: new.company_name,
            url: new.url,
            source_name: new.source_name,
            published_at: new.published_at,
            summary: new.summary,
            details: new.details,
            hidden: false,
            created_at: Utc::now(),
        }
    }
}
