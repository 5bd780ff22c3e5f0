use crate::traits::FeedSource;
use crate::types::{AssistantError, FetchConfig, Result};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// HTTP feed fetcher.
pub struct Fetcher {
    client: Client,
    config: FetchConfig,
}

impl Fetcher {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()?;

        Ok(Self { client, config })
    }

    fn max_body_bytes(&self) -> u64 {
        self.config.max_feed_size_mb as u64 * 1024 * 1024
    }

    fn too_large(&self, url: &str) -> AssistantError {
        AssistantError::FeedTooLarge {
            url: url.to_string(),
            limit_mb: self.config.max_feed_size_mb,
        }
    }
}

#[async_trait]
impl FeedSource for Fetcher {
    fn source_name(&self) -> String {
        format!("HTTP fetcher ({})", self.config.user_agent)
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        let start_time = Instant::now();
        debug!("Fetching feed: {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(AssistantError::FeedStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let limit = self.max_body_bytes();
        if response.content_length().is_some_and(|len| len > limit) {
            return Err(self.too_large(url));
        }

        // Chunked responses carry no length; the cap applies while reading.
        let mut body = Vec::new();
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if (body.len() + chunk.len()) as u64 > limit {
                return Err(self.too_large(url));
            }
            body.extend_from_slice(&chunk);
        }
        let content = String::from_utf8_lossy(&body).into_owned();

        info!(
            "Fetched feed: {} ({} bytes in {}ms)",
            url,
            content.len(),
            start_time.elapsed().as_millis()
        );

        Ok(content)
    }
}
