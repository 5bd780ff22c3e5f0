use crate::formatter::ResponseFormatter;
use crate::prompt::ContextPromptBuilder;
use crate::traits::{GenerationParams, LlmClient, TextStream};
use crate::types::AssistantError;
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error};

pub const DEFAULT_LLM_TIMEOUT: Duration = Duration::from_secs(60);

/// The only text a caller ever sees when generation fails.
pub fn apology(error: &AssistantError) -> String {
    format!(
        "I apologize, but I encountered an error while processing your query: {}",
        error
    )
}

fn timed_out(limit: Duration) -> AssistantError {
    AssistantError::Timeout(format!("no response from the model within {}s", limit.as_secs()))
}

/// Turns a context and a question into a formatted answer.
///
/// Errors never escape: both entry points degrade to the apology text.
pub struct ResponseAgent {
    client: Arc<dyn LlmClient>,
    prompt: ContextPromptBuilder,
    params: GenerationParams,
    timeout: Duration,
}

impl ResponseAgent {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self {
            client,
            prompt: ContextPromptBuilder::default(),
            params: GenerationParams::default(),
            timeout: DEFAULT_LLM_TIMEOUT,
        }
    }

    pub fn with_prompt(mut self, prompt: ContextPromptBuilder) -> Self {
        self.prompt = prompt;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn answer(&self, context: &str, query: &str) -> String {
        let prompt = self.prompt.build(context, query);
        debug!("Asking {} ({} byte prompt)", self.client.client_name(), prompt.len());

        let generated = timeout(self.timeout, self.client.generate(&prompt, &self.params)).await;
        let result = generated.unwrap_or_else(|_| Err(timed_out(self.timeout)));

        match result {
            Ok(text) => ResponseFormatter::format_all(&text),
            Err(e) => {
                error!("LLM call failed: {}", e);
                apology(&e)
            }
        }
    }

    /// Stream the formatted answer; the concatenated chunks equal `answer`.
    pub fn answer_stream(&self, context: &str, query: &str) -> BoxStream<'static, String> {
        let state = AnswerStream {
            client: Arc::clone(&self.client),
            params: self.params.clone(),
            timeout: self.timeout,
            formatter: ResponseFormatter::new(),
            phase: Phase::Opening(self.prompt.build(context, query)),
        };

        stream::unfold(state, |mut state| async move {
            let chunk = state.next_chunk().await?;
            Some((chunk, state))
        })
        .boxed()
    }
}

enum Phase {
    Opening(String),
    Streaming(TextStream),
    Done,
}

struct AnswerStream {
    client: Arc<dyn LlmClient>,
    params: GenerationParams,
    timeout: Duration,
    formatter: ResponseFormatter,
    phase: Phase,
}

impl AnswerStream {
    async fn next_chunk(&mut self) -> Option<String> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Done) {
                Phase::Opening(prompt) => {
                    let opening = self.client.generate_stream(&prompt, &self.params);
                    let opened = timeout(self.timeout, opening).await;
                    match opened {
                        Ok(Ok(inner)) => self.phase = Phase::Streaming(inner),
                        Ok(Err(e)) => return Some(self.fail(e)),
                        Err(_) => return Some(self.fail(timed_out(self.timeout))),
                    }
                }
                Phase::Streaming(mut inner) => {
                    let next = timeout(self.timeout, inner.next()).await;
                    match next {
                        Ok(Some(Ok(raw))) => {
                            self.phase = Phase::Streaming(inner);
                            if let Some(text) = self.formatter.push(&raw) {
                                return Some(text);
                            }
                        }
                        Ok(Some(Err(e))) => return Some(self.fail(e)),
                        Ok(None) => return self.formatter.finish(),
                        Err(_) => return Some(self.fail(timed_out(self.timeout))),
                    }
                }
                Phase::Done => return None,
            }
        }
    }

    /// Flush the held-back partial line, then the apology on a line of its own.
    fn fail(&mut self, e: AssistantError) -> String {
        error!("LLM stream failed: {}", e);
        self.phase = Phase::Done;
        let mut text = self.formatter.finish().unwrap_or_default();
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&apology(&e));
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_adapter::{MockLlmClient, MockReply};

    #[tokio::test]
    async fn failure_becomes_a_single_apology_chunk() {
        let reply = MockReply::Fail("quota exceeded".to_string());
        let client = Arc::new(MockLlmClient::new("down", reply));
        let agent = ResponseAgent::new(client.clone());

        let chunks: Vec<String> = agent.answer_stream("ctx", "q").collect().await;
        assert_eq!(
            chunks,
            vec![
                "I apologize, but I encountered an error while processing your query: \
                 LLM error: quota exceeded"
                    .to_string()
            ]
        );
        assert_eq!(agent.answer("ctx", "q").await, chunks[0]);
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn slow_stream_is_cut_off_by_the_timeout() {
        let client = Arc::new(MockLlmClient::echo().with_delay(200));
        let agent = ResponseAgent::new(client).with_timeout(Duration::from_millis(20));

        let chunks: Vec<String> = agent.answer_stream("ctx", "q").collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].starts_with("I apologize"));
        assert!(chunks[0].contains("Timed out"));
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_the_partial_line() {
        let reply = MockReply::FailAfter {
            text: "* first point\npartial sec".to_string(),
            error: "connection reset".to_string(),
        };
        let client = Arc::new(MockLlmClient::new("flaky", reply).with_chunk_size(4));
        let agent = ResponseAgent::new(client);

        let chunks: Vec<String> = agent.answer_stream("ctx", "q").collect().await;
        let text = chunks.concat();
        assert!(text.starts_with("- first point\npartial sec\nI apologize"));
        assert!(text.ends_with("LLM error: connection reset"));
        assert!(chunks.last().unwrap().starts_with("partial sec\n"));
    }
}
