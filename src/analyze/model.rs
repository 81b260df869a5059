// src/analyze/model.rs
//! Model-backed analyzer: chat-completions request, strict validation, one
//! retry with a harder instruction, then stub values marked as degraded.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::ai::AiConfig;

use super::rubric::{validate_reported, MenaAnalysis};
use super::{ItemSnapshot, ScoreBackend, FALLBACK_MODEL_NAME};

const SYSTEM_PROMPT: &str = "You are a MENA market analyst. Respond only with valid JSON.";

const STRICT_SUFFIX: &str = "Your previous answer did not validate. Respond with ONLY the JSON \
object, no prose and no code fences. The five rubric values must be integers between 0 and 20 \
and must sum exactly to fit_score.";

pub struct ModelBackend {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ModelBackend {
    pub fn new(cfg: &AiConfig, api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("mena-signal/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
        }
    }

    async fn try_model(&self, item: &ItemSnapshot) -> Result<MenaAnalysis> {
        let prompt = build_prompt(item);

        // First attempt. Transport errors skip the retry: the stricter
        // instruction only helps against malformed output.
        let content = self.request(&prompt).await?;
        match parse_reported(&content) {
            Ok((score, rubric, summary)) => {
                return Ok(self.analysis(score, rubric, summary));
            }
            Err(e) => {
                warn!(error = %e, "model output failed validation, retrying strict");
            }
        }

        let strict_prompt = format!("{prompt}\n\n{STRICT_SUFFIX}");
        let content = self.request(&strict_prompt).await?;
        let (score, rubric, summary) =
            parse_reported(&content).map_err(|e| anyhow!("strict retry still invalid: {e}"))?;
        Ok(self.analysis(score, rubric, summary))
    }

    fn analysis(&self, score: u8, rubric: super::rubric::Rubric, summary: String) -> MenaAnalysis {
        MenaAnalysis {
            fit_score: score,
            rubric,
            mena_summary: summary,
            model_name: self.model.clone(),
            created_at: Utc::now(),
        }
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                Msg {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.3,
            max_tokens: 500,
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("model request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("model endpoint returned {}", resp.status());
        }
        let body: Resp = resp.json().await.context("model response not json")?;
        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("model response had no choices"))
    }
}

#[async_trait]
impl ScoreBackend for ModelBackend {
    async fn score(&self, item: &ItemSnapshot) -> MenaAnalysis {
        match self.try_model(item).await {
            Ok(analysis) => analysis,
            Err(e) => {
                warn!(error = %e, "model scoring degraded to stub values");
                counter!("score_degraded_total").increment(1);
                MenaAnalysis::stub_values(FALLBACK_MODEL_NAME)
            }
        }
    }
    fn name(&self) -> &'static str {
        "model"
    }
}

/// Structured prompt describing the item and the five rubric dimensions.
pub fn build_prompt(item: &ItemSnapshot) -> String {
    let mut context = String::new();
    if let Some(f) = &item.details.funding {
        if let Some(rt) = &f.round_type {
            context.push_str(&format!(
                "Round Type: {}\n",
                serde_json::to_value(rt)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default()
            ));
        }
        if let Some(amount) = f.amount_usd {
            context.push_str(&format!("Amount: ${amount:.0}\n"));
        }
        if !f.investors.is_empty() {
            context.push_str(&format!("Investors: {}\n", f.investors.join(", ")));
        }
    }
    if let Some(c) = &item.details.company {
        if let Some(cat) = &c.category {
            context.push_str(&format!("Category: {cat}\n"));
        }
        if let Some(stage) = &c.stage_hint {
            context.push_str(&format!("Stage: {stage}\n"));
        }
    }

    let item_type = match item.item_type {
        crate::item::ItemType::Funding => "funding",
        crate::item::ItemType::Company => "company",
    };

    format!(
        r#"You are an AI analyst specializing in MENA (Middle East & North Africa) market opportunity assessment.

Analyze the following AI company/funding news and determine its applicability for the MENA market.

Title: {title}
Company: {company}
Type: {item_type}
Summary: {summary}
{context}
Score each dimension from 0-20:

1. budget_buyer_exists (0-20): Does MENA have buyers with budget for this? Consider government and sovereign wealth fund relevance, enterprise adoption in GCC, SMB market fit.
2. localization_arabic_bilingual (0-20): How easy is localization? Software-only vs hardware-dependent, Arabic language requirements, cultural adaptation.
3. regulatory_friction (0-20): Higher score = easier regulatory path. Data sovereignty, industry regulations, approval requirements.
4. distribution_path (0-20): Clear path to market? Channel partners, local competition, go-to-market complexity.
5. time_to_revenue (0-20): How quickly can this generate MENA revenue? Sales cycle, implementation complexity, customer education.

Respond ONLY with valid JSON:
{{
  "fit_score": <sum of all dimensions, 0-100>,
  "mena_summary": "<2-3 sentences on MENA applicability>",
  "rubric": {{
    "budget_buyer_exists": <0-20>,
    "localization_arabic_bilingual": <0-20>,
    "regulatory_friction": <0-20>,
    "distribution_path": <0-20>,
    "time_to_revenue": <0-20>
  }}
}}"#,
        title = item.title,
        company = item.company_name.as_deref().unwrap_or("Unknown"),
        summary = item.summary.as_deref().unwrap_or("No summary available"),
    )
}

/// Parse a model reply into validated rubric values. Lenient about markdown
/// fences, strict about the numbers.
pub fn parse_reported(content: &str) -> Result<(u8, super::rubric::Rubric, String)> {
    #[derive(Deserialize)]
    struct ReportedRubric {
        budget_buyer_exists: i64,
        localization_arabic_bilingual: i64,
        regulatory_friction: i64,
        distribution_path: i64,
        time_to_revenue: i64,
    }
    #[derive(Deserialize)]
    struct Reported {
        fit_score: i64,
        #[serde(default)]
        mena_summary: String,
        rubric: ReportedRubric,
    }

    let json = strip_fences(content);
    let reported: Reported =
        serde_json::from_str(json).context("model reply is not the expected json shape")?;

    let to_u16 = |v: i64, name: &str| -> Result<u16> {
        u16::try_from(v).map_err(|_| anyhow!("'{name}' out of range: {v}"))
    };
    let score = to_u16(reported.fit_score, "fit_score")?;
    let dims = [
        to_u16(reported.rubric.budget_buyer_exists, "budget_buyer_exists")?,
        to_u16(
            reported.rubric.localization_arabic_bilingual,
            "localization_arabic_bilingual",
        )?,
        to_u16(reported.rubric.regulatory_friction, "regulatory_friction")?,
        to_u16(reported.rubric.distribution_path, "distribution_path")?,
        to_u16(reported.rubric.time_to_revenue, "time_to_revenue")?,
    ];

    let (score, rubric) = validate_reported(score, dims)?;

    let mut summary = reported.mena_summary;
    if summary.chars().count() > 1000 {
        summary = summary.chars().take(1000).collect();
    }
    if summary.is_empty() {
        summary = "Analysis completed.".to_string();
    }
    Ok((score, rubric, summary))
}

fn strip_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest).trim_start();
    match rest.find("```") {
        Some(end) => rest[..end].trim(),
        None => rest.trim(),
    }
}
