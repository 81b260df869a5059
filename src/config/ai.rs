// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout() -> u64 {
    20
}

/// Model-backend configuration, loaded from `config/ai.json`.
///
/// An absent credential is an expected state, not an error: it selects the
/// stub scoring path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// "openai" (case-insensitive) is the only wired provider.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// "ENV" means: read from OPENAI_API_KEY. Empty means: no credential.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: default_base_url(),
            api_key: String::new(),
            request_timeout_secs: default_timeout(),
        }
    }
}

impl AiConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;
        cfg.provider = cfg.provider.to_lowercase();
        if cfg.request_timeout_secs == 0 {
            cfg.request_timeout_secs = default_timeout();
        }
        Ok(cfg)
    }

    /// Load from `config/ai.json`; a missing or unreadable file yields the
    /// default (credential-less) config.
    pub fn load_or_default() -> Self {
        Self::load_from_file("config/ai.json").unwrap_or_default()
    }

    /// The credential, if one is configured. "ENV" defers to OPENAI_API_KEY.
    pub fn resolved_key(&self) -> Option<String> {
        let raw = self.api_key.trim();
        let key = if raw.eq_ignore_ascii_case("env") {
            env::var("OPENAI_API_KEY").unwrap_or_default()
        } else {
            raw.to_string()
        };
        if key.is_empty() {
            None
        } else {
            Some(key)
        }
    }
}
