#![allow(dead_code)]

use async_trait::async_trait;
use news_assistant::{AssistantError, FeedSource, Result};
use std::collections::HashMap;
use std::sync::Once;
use std::time::Duration;

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_test_writer()
            .try_init();
    });
}

/// In-memory feed source: known URLs return their document, anything else a 503.
#[derive(Default)]
pub struct StaticFeeds {
    documents: HashMap<String, String>,
    delays: HashMap<String, Duration>,
}

impl StaticFeeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feed(mut self, url: &str, body: impl Into<String>) -> Self {
        self.documents.insert(url.to_string(), body.into());
        self
    }

    /// Hold the reply for `url` back by `delay`.
    pub fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }
}

#[async_trait]
impl FeedSource for StaticFeeds {
    fn source_name(&self) -> String {
        "Static Feeds".to_string()
    }

    async fn fetch(&self, url: &str) -> Result<String> {
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        match self.documents.get(url) {
            Some(content) => Ok(content.clone()),
            None => Err(AssistantError::FeedStatus {
                url: url.to_string(),
                status: 503,
            }),
        }
    }
}

pub struct RssItem<'a> {
    pub title: &'a str,
    pub link: &'a str,
    pub pub_date: Option<&'a str>,
    pub description: &'a str,
}

impl<'a> RssItem<'a> {
    pub fn new(title: &'a str, link: &'a str) -> Self {
        Self {
            title,
            link,
            pub_date: None,
            description: "",
        }
    }

    pub fn dated(mut self, pub_date: &'a str) -> Self {
        self.pub_date = Some(pub_date);
        self
    }

    pub fn describe(mut self, description: &'a str) -> Self {
        self.description = description;
        self
    }
}

pub fn rss(channel_title: Option<&str>, items: &[RssItem]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n<channel>\n");
    if let Some(title) = channel_title {
        xml.push_str(&format!("<title>{}</title>\n", title));
    }
    xml.push_str("<link>http://ex.com/</link>\n<description>Test feed</description>\n");
    for item in items {
        xml.push_str("<item>\n");
        xml.push_str(&format!("<title>{}</title>\n", item.title));
        xml.push_str(&format!("<link>{}</link>\n", item.link));
        if let Some(date) = item.pub_date {
            xml.push_str(&format!("<pubDate>{}</pubDate>\n", date));
        }
        xml.push_str(&format!(
            "<description><![CDATA[{}]]></description>\n",
            item.description
        ));
        xml.push_str("</item>\n");
    }
    xml.push_str("</channel>\n</rss>\n");
    xml
}

pub const NOT_A_FEED: &str = "<html><body>not a feed</body></html>";
