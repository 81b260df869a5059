// src/analyze/rubric.rs
//! Rubric shape shared by every scoring backend.
//!
//! Invariant: each dimension is in 0..=20 and the five dimensions sum exactly
//! to the fit score. Model output that violates this is rejected here and
//! handled by the retry/fallback policy in the model backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DIMENSION_MAX: u8 = 20;
pub const SCORE_MAX: u8 = 100;

/// Five-dimension breakdown of MENA applicability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rubric {
    pub budget_buyer_exists: u8,
    pub localization_arabic_bilingual: u8,
    pub regulatory_friction: u8,
    pub distribution_path: u8,
    pub time_to_revenue: u8,
}

impl Rubric {
    pub fn uniform(v: u8) -> Self {
        Self {
            budget_buyer_exists: v,
            localization_arabic_bilingual: v,
            regulatory_friction: v,
            distribution_path: v,
            time_to_revenue: v,
        }
    }

    pub fn dimensions(&self) -> [u8; 5] {
        [
            self.budget_buyer_exists,
            self.localization_arabic_bilingual,
            self.regulatory_friction,
            self.distribution_path,
            self.time_to_revenue,
        ]
    }

    pub fn sum(&self) -> u16 {
        self.dimensions().iter().map(|&d| u16::from(d)).sum()
    }
}

/// One live analysis per item; re-analysis replaces it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenaAnalysis {
    pub fit_score: u8,
    pub rubric: Rubric,
    pub mena_summary: String,
    pub model_name: String,
    pub created_at: DateTime<Utc>,
}

pub const STUB_SUMMARY: &str = "This opportunity requires further analysis to assess MENA \
applicability. Key factors to evaluate include regional buyer appetite, localization \
requirements, and regulatory considerations.";

impl MenaAnalysis {
    /// Deterministic stub values: score 50, five 10s, generic rationale.
    /// `model_name` distinguishes intentional stub mode ("stub") from the
    /// degraded path ("fallback-stub").
    pub fn stub_values(model_name: &str) -> Self {
        Self {
            fit_score: 50,
            rubric: Rubric::uniform(10),
            mena_summary: STUB_SUMMARY.to_string(),
            model_name: model_name.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Why a reported analysis was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RubricViolation {
    #[error("fit score {0} exceeds {SCORE_MAX}")]
    ScoreOutOfRange(u16),
    #[error("dimension '{name}' value {value} exceeds {DIMENSION_MAX}")]
    DimensionOutOfRange { name: &'static str, value: u16 },
    #[error("rubric sums to {sum}, fit score is {score}")]
    SumMismatch { sum: u16, score: u16 },
}

const DIMENSION_NAMES: [&str; 5] = [
    "budget_buyer_exists",
    "localization_arabic_bilingual",
    "regulatory_friction",
    "distribution_path",
    "time_to_revenue",
];

/// Validate raw (wide) values as reported by a model and narrow them into a
/// `Rubric` + score. The sum check is strict: clamping is not enough to make
/// the stored invariant hold.
pub fn validate_reported(score: u16, dims: [u16; 5]) -> Result<(u8, Rubric), RubricViolation> {
    if score > u16::from(SCORE_MAX) {
        return Err(RubricViolation::ScoreOutOfRange(score));
    }
    for (name, &value) in DIMENSION_NAMES.iter().zip(dims.iter()) {
        if value > u16::from(DIMENSION_MAX) {
            return Err(RubricViolation::DimensionOutOfRange { name, value });
        }
    }
    let sum: u16 = dims.iter().sum();
    if sum != score {
        return Err(RubricViolation::SumMismatch { sum, score });
    }
    let rubric = Rubric {
        budget_buyer_exists: dims[0] as u8,
        localization_arabic_bilingual: dims[1] as u8,
        regulatory_friction: dims[2] as u8,
        distribution_path: dims[3] as u8,
        time_to_revenue: dims[4] as u8,
    };
    Ok((score as u8, rubric))
}
