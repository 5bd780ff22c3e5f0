pub mod types;
pub mod traits;
pub mod sanitizer;
pub mod normalizer;
pub mod parser;
pub mod fetcher;
pub mod aggregator;
pub mod prompt;
pub mod formatter;
pub mod llm_adapter;
pub mod agent;
pub mod orchestrator;
pub mod config;
pub mod utils;

pub use types::*;
pub use traits::{FeedSource, GenerationParams, LlmClient, TextStream};
pub use sanitizer::HtmlSanitizer;
pub use normalizer::{FeedEntryNormalizer, RawEntry, RawField};
pub use parser::FeedParser;
pub use fetcher::Fetcher;
pub use aggregator::FeedAggregator;
pub use prompt::ContextPromptBuilder;
pub use formatter::ResponseFormatter;
pub use llm_adapter::{GeminiClient, MockLlmClient, MockReply};
pub use agent::ResponseAgent;
pub use orchestrator::{ConversationOrchestrator, RefreshReport, REFRESH_PROMPT};
pub use config::AppConfig;
