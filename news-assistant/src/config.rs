//! Application configuration: feed list, model settings, credential.
//!
//! Sources, lowest precedence first: the secrets file (`secrets.toml`, or the
//! path in `NEWS_ASSISTANT_SECRETS`), then `NEWS_ASSISTANT_*` environment
//! variables. `.env` is loaded into the environment beforehand.

use crate::agent::DEFAULT_LLM_TIMEOUT;
use crate::llm_adapter::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::prompt::DEFAULT_ASSISTANT_NAME;
use crate::traits::GenerationParams;
use crate::types::{AssistantError, FetchConfig, Result};
use crate::utils;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";
pub const API_KEY_VAR: &str = "GEMINI_API_KEY";

pub const DEFAULT_FEEDS: &[&str] = &[
    "https://www.iotinsider.com/feed/",
    "https://iot-analytics.com/feed/",
    "https://www.iottechnews.com/feed/",
];

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    /// Feed URLs. Read from NEWS_ASSISTANT_FEEDS as a comma-separated list.
    #[serde(default)]
    pub feeds: Vec<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub api_base_url: Option<String>,

    #[serde(default)]
    pub entries_per_feed: Option<usize>,

    #[serde(default)]
    pub max_concurrent_fetches: Option<usize>,

    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,

    #[serde(default)]
    pub llm_timeout_secs: Option<u64>,

    #[serde(default)]
    pub temperature: Option<f32>,

    #[serde(default)]
    pub top_p: Option<f32>,

    #[serde(default)]
    pub top_k: Option<u32>,

    #[serde(default)]
    pub assistant_name: Option<String>,

    /// Gemini key from the secrets file. The process environment takes precedence.
    #[serde(default, alias = "GEMINI_API_KEY")]
    pub gemini_api_key: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        let secrets_path = std::env::var("NEWS_ASSISTANT_SECRETS")
            .unwrap_or_else(|_| DEFAULT_SECRETS_FILE.to_string());
        Self::load_from(&secrets_path)
    }

    pub fn load_from(secrets_path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::File::new(secrets_path, config::FileFormat::Toml).required(false),
            )
            .add_source(
                config::Environment::with_prefix("NEWS_ASSISTANT")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("feeds"),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Gemini key from `GEMINI_API_KEY`, falling back to the secrets file.
    pub fn api_key(&self) -> Result<String> {
        pick_api_key(std::env::var(API_KEY_VAR).ok(), self.gemini_api_key.as_deref())
    }

    /// Configured feeds with invalid URLs dropped, or the built-in list.
    pub fn feeds_or_default(&self) -> Vec<String> {
        let feeds: Vec<String> = self
            .feeds
            .iter()
            .map(|feed| feed.trim().to_string())
            .filter(|feed| {
                let valid = utils::url::is_valid_feed_url(feed);
                if !valid && !feed.is_empty() {
                    warn!("Ignoring invalid feed URL: {}", feed);
                }
                valid
            })
            .collect();

        if feeds.is_empty() {
            DEFAULT_FEEDS.iter().map(|feed| feed.to_string()).collect()
        } else {
            feeds
        }
    }

    pub fn model_or_default(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string())
    }

    pub fn api_base_url_or_default(&self) -> String {
        self.api_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
    }

    pub fn assistant_name_or_default(&self) -> String {
        self.assistant_name
            .clone()
            .unwrap_or_else(|| DEFAULT_ASSISTANT_NAME.to_string())
    }

    pub fn fetch_config(&self) -> FetchConfig {
        let defaults = FetchConfig::default();
        FetchConfig {
            timeout_seconds: self.fetch_timeout_secs.unwrap_or(defaults.timeout_seconds),
            entries_per_feed: self.entries_per_feed.unwrap_or(defaults.entries_per_feed),
            max_concurrent_fetches: self
                .max_concurrent_fetches
                .unwrap_or(defaults.max_concurrent_fetches),
            ..defaults
        }
    }

    pub fn generation_params(&self) -> GenerationParams {
        let defaults = GenerationParams::default();
        GenerationParams {
            temperature: self.temperature.unwrap_or(defaults.temperature),
            top_p: self.top_p.unwrap_or(defaults.top_p),
            top_k: self.top_k.unwrap_or(defaults.top_k),
        }
    }

    pub fn llm_timeout(&self) -> Duration {
        self.llm_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_LLM_TIMEOUT)
    }
}

fn pick_api_key(from_env: Option<String>, from_file: Option<&str>) -> Result<String> {
    from_env
        .filter(|key| !key.trim().is_empty())
        .or_else(|| {
            from_file
                .filter(|key| !key.trim().is_empty())
                .map(str::to_string)
        })
        .ok_or(AssistantError::MissingCredential)
}
