use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel date shown for entries that carry no published date at all.
pub const RECENT_SENTINEL: &str = "Recent";

/// One normalized article of the current fetch cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub link: String,
    pub published_at: String,
    pub tags: Vec<String>,
    pub authors: Vec<String>,
    pub source: String,
    /// Timestamp the item sorts by. `None` exactly when `published_at` is the "Recent" sentinel.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl NewsItem {
    /// Sidebar excerpt: the first `max_chars` characters of the description.
    pub fn preview(&self, max_chars: usize) -> String {
        let mut chars = self.description.chars();
        let head: String = chars.by_ref().take(max_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head.trim_end())
        } else {
            head
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    Fetch,
    Parse,
    EmptyFeed,
    Entry,
}

/// A recovered, non-fatal problem with one feed or one entry of a feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedWarning {
    pub feed_url: String,
    pub kind: WarningKind,
    pub message: String,
}

impl FeedWarning {
    pub fn new(feed_url: &str, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            feed_url: feed_url.to_string(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FeedWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.kind {
            WarningKind::Fetch => "Error fetching feed",
            WarningKind::Parse => "Feed error",
            WarningKind::EmptyFeed => "No entries found in the RSS feed",
            WarningKind::Entry => "Error processing entry",
        };
        write!(f, "{} ({}): {}", label, self.feed_url, self.message)
    }
}

/// Everything one aggregation cycle produced.
#[derive(Debug, Clone, Default)]
pub struct NewsBatch {
    pub items: Vec<NewsItem>,
    pub context: String,
    pub warnings: Vec<FeedWarning>,
}

/// Envelope the front end serializes when it prints the news list as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsResponse {
    pub section_title: String,
    pub items: Vec<NewsItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
    pub entries_per_feed: usize,
    pub max_concurrent_fetches: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "IoT-News-Assistant/1.0".to_string(),
            timeout_seconds: 30,
            max_feed_size_mb: 10,
            max_redirects: 5,
            entries_per_feed: 5,
            max_concurrent_fetches: 4,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    FeedStatus { url: String, status: u16 },

    #[error("Feed exceeds the {limit_mb}MB size limit ({url})")]
    FeedTooLarge { url: String, limit_mb: usize },

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("No valid entries could be processed from any feed ({} warnings)", warnings.len())]
    NoNewsAvailable { warnings: Vec<FeedWarning> },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("GEMINI_API_KEY is not set in the environment or the secrets file")]
    MissingCredential,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AssistantError>;
