use crate::types::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Stream of raw text chunks as the model produces them.
pub type TextStream = BoxStream<'static, Result<String>>;

/// Anything that can hand back the raw document behind a feed URL.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable name for this source implementation
    fn source_name(&self) -> String;

    /// Fetch the raw feed document at `url`
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Sampling parameters passed with every generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

/// A hosted text-generation model.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the name of this client
    fn client_name(&self) -> String;

    /// Generate the complete answer for `prompt` in one call
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Generate the answer for `prompt` as a stream of text chunks
    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream>;
}
