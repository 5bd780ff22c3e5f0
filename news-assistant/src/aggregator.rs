use crate::normalizer::FeedEntryNormalizer;
use crate::parser::FeedParser;
use crate::traits::FeedSource;
use crate::types::{
    AssistantError, FeedWarning, FetchConfig, NewsBatch, NewsItem, Result, WarningKind,
};
use crate::utils;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Items and warnings from a single feed.
struct FeedOutcome {
    items: Vec<NewsItem>,
    warnings: Vec<FeedWarning>,
}

impl FeedOutcome {
    fn failed(warning: FeedWarning) -> Self {
        Self {
            items: Vec::new(),
            warnings: vec![warning],
        }
    }
}

pub struct FeedAggregator {
    source: Arc<dyn FeedSource>,
    entries_per_feed: usize,
    max_concurrent_fetches: usize,
}

impl FeedAggregator {
    pub fn new(source: Arc<dyn FeedSource>, config: &FetchConfig) -> Self {
        Self {
            source,
            entries_per_feed: config.entries_per_feed,
            max_concurrent_fetches: config.max_concurrent_fetches.max(1),
        }
    }

    /// Fetch every feed, merge newest-first and render the LLM context.
    ///
    /// Per-feed and per-entry problems come back as warnings; only a cycle that
    /// yields no item at all is an error.
    pub async fn fetch_all(&self, feed_urls: &[String]) -> Result<NewsBatch> {
        let cycle_start = Utc::now();
        info!(
            "Fetching {} feeds via {} (up to {} at a time)",
            feed_urls.len(),
            self.source.source_name(),
            self.max_concurrent_fetches
        );

        // `buffered` keeps results in configuration order regardless of completion order.
        let outcomes: Vec<FeedOutcome> = stream::iter(feed_urls.iter())
            .map(|url| self.fetch_single_feed(url, cycle_start))
            .buffered(self.max_concurrent_fetches)
            .collect()
            .await;

        let mut items = Vec::new();
        let mut warnings = Vec::new();
        for outcome in outcomes {
            items.extend(outcome.items);
            warnings.extend(outcome.warnings);
        }

        if items.is_empty() {
            error!(
                "No valid entries could be processed from {} feeds",
                feed_urls.len()
            );
            return Err(AssistantError::NoNewsAvailable { warnings });
        }

        sort_by_recency(&mut items, cycle_start);
        let context = render_context(&items);

        info!(
            "Aggregated {} items from {} feeds ({} warnings)",
            items.len(),
            feed_urls.len(),
            warnings.len()
        );

        Ok(NewsBatch {
            items,
            context,
            warnings,
        })
    }

    async fn fetch_single_feed(&self, url: &str, now: DateTime<Utc>) -> FeedOutcome {
        let content = match self.source.fetch(url).await {
            Ok(content) => content,
            Err(e) => {
                warn!("Failed to fetch feed {}: {}", url, e);
                let warning = FeedWarning::new(url, WarningKind::Fetch, e.to_string());
                return FeedOutcome::failed(warning);
            }
        };

        let parsed = match FeedParser::parse_feed(&content) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Feed error for {}: {}", url, e);
                let warning = FeedWarning::new(url, WarningKind::Parse, e.to_string());
                return FeedOutcome::failed(warning);
            }
        };

        if parsed.entries.is_empty() {
            warn!("No entries found in feed {}", url);
            return FeedOutcome::failed(FeedWarning::new(
                url,
                WarningKind::EmptyFeed,
                "feed contains no entries",
            ));
        }

        let source_name = parsed
            .title
            .clone()
            .or_else(|| utils::url::display_host(url))
            .unwrap_or_else(|| url.to_string());

        let mut outcome = FeedOutcome {
            items: Vec::new(),
            warnings: Vec::new(),
        };

        for (index, entry) in parsed.entries.iter().take(self.entries_per_feed).enumerate() {
            match FeedEntryNormalizer::normalize_at(entry, &source_name, now) {
                Ok(item) => outcome.items.push(item),
                Err(e) => {
                    warn!("Skipping entry {} of {}: {}", index, url, e);
                    outcome.warnings.push(FeedWarning::new(
                        url,
                        WarningKind::Entry,
                        format!("entry {}: {}", index, e),
                    ));
                }
            }
        }

        debug!(
            "Feed {} ({}): {} of {} entries admitted",
            url,
            source_name,
            outcome.items.len(),
            parsed.entries.len().min(self.entries_per_feed)
        );

        outcome
    }
}

/// Newest first; undated items count as `now`, ties keep fetch order.
pub fn sort_by_recency(items: &mut [NewsItem], now: DateTime<Utc>) {
    items.sort_by_key(|item| std::cmp::Reverse(item.resolved_at.unwrap_or(now)));
}

pub fn render_item(item: &NewsItem) -> String {
    let mut block = String::new();
    block.push_str(&format!("Title: {}\n", item.title));
    block.push_str(&format!("Date: {}\n", item.published_at));
    block.push_str(&format!("Published By: {}\n", item.source));
    if !item.authors.is_empty() {
        block.push_str(&format!("Authors: {}\n", item.authors.join(", ")));
    }
    block.push_str(&format!("Full Content: {}\n", item.description));
    let topics = if item.tags.is_empty() {
        "N/A".to_string()
    } else {
        item.tags.join(", ")
    };
    block.push_str(&format!("Topics: {}\n", topics));
    block.push_str(&format!("Source URL: {}\n", item.link));
    block.push_str("---");
    block
}

pub fn render_context(items: &[NewsItem]) -> String {
    items
        .iter()
        .map(render_item)
        .collect::<Vec<_>>()
        .join("\n")
}
