use crate::traits::{GenerationParams, LlmClient, TextStream};
use crate::types::{AssistantError, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Client for the Gemini `generateContent` REST API.
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AssistantError::MissingCredential);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url, self.model, method)
    }

    async fn post(
        &self,
        url: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<reqwest::Response> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: params.temperature,
                top_p: params.top_p,
                top_k: params.top_k,
            },
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::Llm(format!(
                "HTTP {}: {}",
                status,
                api_error_message(&body).unwrap_or(body)
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for GeminiClient {
    fn client_name(&self) -> String {
        format!("Gemini ({})", self.model)
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        debug!("Sending {} byte prompt to {}", prompt.len(), self.model);
        let response = self.post(&self.endpoint("generateContent"), prompt, params).await?;
        let body: GenerateContentResponse = response.json().await?;
        let text = body.into_text()?;
        info!("Received {} byte answer from {}", text.len(), self.model);
        Ok(text)
    }

    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream> {
        debug!("Streaming {} byte prompt to {}", prompt.len(), self.model);
        let url = format!("{}?alt=sse", self.endpoint("streamGenerateContent"));
        let response = self.post(&url, prompt, params).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();
        Ok(sse_text_stream(body))
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }

    /// Text of the first candidate, or an error when the API returned none.
    fn into_text(self) -> Result<String> {
        if let Some(error) = self.error {
            return Err(AssistantError::Llm(error.message));
        }
        if self.candidates.is_empty() {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(AssistantError::Llm(format!("empty response: {}", reason)));
        }
        Ok(self.text())
    }
}

fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
}

struct SseState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    ready: VecDeque<Result<String>>,
    finished: bool,
}

impl SseState {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            if let Some(event) = parse_sse_line(line.trim_end()) {
                self.ready.push_back(event);
            }
        }
    }
}

/// Decode one `data:` line of the server-sent event stream.
fn parse_sse_line(line: &str) -> Option<Result<String>> {
    let data = line.strip_prefix("data:")?.trim();
    if data.is_empty() || data == "[DONE]" {
        return None;
    }
    match serde_json::from_str::<GenerateContentResponse>(data) {
        Ok(response) => {
            if let Some(error) = response.error {
                return Some(Err(AssistantError::Llm(error.message)));
            }
            let text = response.text();
            if text.is_empty() {
                None
            } else {
                Some(Ok(text))
            }
        }
        Err(e) => Some(Err(AssistantError::Serialization(e))),
    }
}

fn sse_text_stream(body: BoxStream<'static, reqwest::Result<Vec<u8>>>) -> TextStream {
    let state = SseState {
        body,
        buffer: Vec::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.body.next().await {
                Some(Ok(bytes)) => {
                    state.buffer.extend_from_slice(&bytes);
                    state.drain_lines();
                }
                Some(Err(e)) => {
                    state.finished = true;
                    state.ready.push_back(Err(AssistantError::Http(e)));
                }
                None => {
                    state.finished = true;
                    state.buffer.push(b'\n');
                    state.drain_lines();
                }
            }
        }
    })
    .boxed()
}

/// What a `MockLlmClient` answers with.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// The prompt itself
    Echo,
    /// The prompt followed by the given text
    EchoWith(String),
    Fixed(String),
    Fail(String),
    /// Streams `text`, then fails with `error`; single-shot calls just fail
    FailAfter { text: String, error: String },
}

/// Scriptable client for development and tests; counts its calls.
pub struct MockLlmClient {
    name: String,
    reply: MockReply,
    chunk_size: usize,
    response_delay_ms: u64,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<String>>,
}

impl MockLlmClient {
    pub fn new(name: impl Into<String>, reply: MockReply) -> Self {
        Self {
            name: name.into(),
            reply,
            chunk_size: 16,
            response_delay_ms: 0,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    pub fn echo() -> Self {
        Self::new("echo", MockReply::Echo)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Delay before each streamed chunk.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.response_delay_ms = delay_ms;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.last_prompt.lock().ok().and_then(|prompt| prompt.clone())
    }

    fn record(&self, prompt: &str) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last_prompt.lock() {
            *last = Some(prompt.to_string());
        }
    }

    fn respond(&self, prompt: &str) -> Result<String> {
        self.record(prompt);

        match &self.reply {
            MockReply::Echo => Ok(prompt.to_string()),
            MockReply::EchoWith(suffix) => Ok(format!("{}{}", prompt, suffix)),
            MockReply::Fixed(text) => Ok(text.clone()),
            MockReply::Fail(message) | MockReply::FailAfter { error: message, .. } => {
                Err(AssistantError::Llm(message.clone()))
            }
        }
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn client_name(&self) -> String {
        format!("Mock LLM Client ({})", self.name)
    }

    async fn generate(&self, prompt: &str, _params: &GenerationParams) -> Result<String> {
        self.respond(prompt)
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<TextStream> {
        let (text, trailing_error) = match &self.reply {
            MockReply::FailAfter { text, error } => {
                self.record(prompt);
                (text.clone(), Some(AssistantError::Llm(error.clone())))
            }
            _ => (self.respond(prompt)?, None),
        };

        let chars: Vec<char> = text.chars().collect();
        let mut items: Vec<Result<String>> = chars
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.iter().collect()))
            .collect();
        items.extend(trailing_error.map(Err));
        let delay = Duration::from_millis(self.response_delay_ms);

        Ok(stream::iter(items)
            .then(move |item| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed())
    }
}
