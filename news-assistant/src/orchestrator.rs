use crate::agent::ResponseAgent;
use crate::aggregator::FeedAggregator;
use crate::types::{ChatMessage, FeedWarning, NewsItem, Result};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Answer given to any question asked before news has been loaded.
pub const REFRESH_PROMPT: &str =
    "No news is loaded yet. Please refresh the news feed and ask again.";

/// Items and the context rendered from them; always replaced together.
#[derive(Debug, Clone)]
pub struct NewsSnapshot {
    pub items: Vec<NewsItem>,
    pub context: String,
}

#[derive(Debug, Clone)]
enum SessionState {
    Stale,
    Fresh(Arc<NewsSnapshot>),
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub items: Vec<NewsItem>,
    pub warnings: Vec<FeedWarning>,
}

/// One conversation session: the loaded news plus the chat history.
pub struct ConversationOrchestrator {
    feed_urls: Vec<String>,
    aggregator: FeedAggregator,
    agent: Arc<ResponseAgent>,
    state: RwLock<SessionState>,
    history: Arc<RwLock<Vec<ChatMessage>>>,
    generation: Arc<AtomicU64>,
}

impl ConversationOrchestrator {
    pub fn new(feed_urls: Vec<String>, aggregator: FeedAggregator, agent: ResponseAgent) -> Self {
        Self {
            feed_urls,
            aggregator,
            agent: Arc::new(agent),
            state: RwLock::new(SessionState::Stale),
            history: Arc::new(RwLock::new(Vec::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn feed_urls(&self) -> &[String] {
        &self.feed_urls
    }

    /// Reload every feed. On failure the session is left Stale.
    pub async fn refresh(&self) -> Result<RefreshReport> {
        *self.state.write().await = SessionState::Stale;

        let batch = self.aggregator.fetch_all(&self.feed_urls).await?;
        for warning in &batch.warnings {
            warn!("{}", warning);
        }

        let snapshot = NewsSnapshot {
            items: batch.items,
            context: batch.context,
        };
        let items = snapshot.items.clone();
        *self.state.write().await = SessionState::Fresh(Arc::new(snapshot));

        info!("Session refreshed with {} items", items.len());
        Ok(RefreshReport {
            items,
            warnings: batch.warnings,
        })
    }

    pub async fn ask(&self, query: &str) -> String {
        let ticket = self.next_ticket();
        let Some(snapshot) = self.snapshot().await else {
            debug!("Question asked before news was loaded");
            return REFRESH_PROMPT.to_string();
        };

        self.history.write().await.push(ChatMessage::user(query));
        let answer = self.agent.answer(&snapshot.context, query).await;

        if self.generation.load(Ordering::SeqCst) == ticket {
            self.history.write().await.push(ChatMessage::assistant(answer.clone()));
        } else {
            debug!("Answer to superseded question dropped from history");
        }
        answer
    }

    /// Stream the answer. A later `ask`/`ask_stream` ends this stream at its next poll.
    pub async fn ask_stream(&self, query: &str) -> BoxStream<'static, String> {
        let ticket = self.next_ticket();
        let Some(snapshot) = self.snapshot().await else {
            debug!("Question asked before news was loaded");
            return stream::iter(vec![REFRESH_PROMPT.to_string()]).boxed();
        };

        self.history.write().await.push(ChatMessage::user(query));
        let relay = Relay {
            inner: self.agent.answer_stream(&snapshot.context, query),
            ticket,
            generation: Arc::clone(&self.generation),
            history: Arc::clone(&self.history),
            answer: String::new(),
        };

        stream::unfold(relay, |mut relay| async move {
            if !relay.is_current() {
                debug!("Stream {} superseded", relay.ticket);
                return None;
            }
            let next = relay.inner.next().await;
            match next {
                _ if !relay.is_current() => None,
                Some(chunk) => {
                    relay.answer.push_str(&chunk);
                    Some((chunk, relay))
                }
                None => {
                    let answer = std::mem::take(&mut relay.answer);
                    relay.history.write().await.push(ChatMessage::assistant(answer));
                    None
                }
            }
        })
        .boxed()
    }

    pub async fn is_fresh(&self) -> bool {
        matches!(*self.state.read().await, SessionState::Fresh(_))
    }

    /// Items of the current snapshot; empty while Stale.
    pub async fn items(&self) -> Vec<NewsItem> {
        self.snapshot()
            .await
            .map(|snapshot| snapshot.items.clone())
            .unwrap_or_default()
    }

    pub async fn context(&self) -> Option<String> {
        self.snapshot().await.map(|snapshot| snapshot.context.clone())
    }

    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.read().await.clone()
    }

    async fn snapshot(&self) -> Option<Arc<NewsSnapshot>> {
        match &*self.state.read().await {
            SessionState::Fresh(snapshot) => Some(Arc::clone(snapshot)),
            SessionState::Stale => None,
        }
    }

    fn next_ticket(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

struct Relay {
    inner: BoxStream<'static, String>,
    ticket: u64,
    generation: Arc<AtomicU64>,
    history: Arc<RwLock<Vec<ChatMessage>>>,
    answer: String,
}

impl Relay {
    fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.ticket
    }
}
