use crate::normalizer::{fields, RawEntry};
use crate::types::{AssistantError, Result};
use feed_rs::model::{Entry, Link};
use feed_rs::parser;
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info};

/// Element names that carry an entry's published date (RSS, Atom, Dublin Core).
const PUBLISHED_ELEMENTS: [&[u8]; 4] = [b"pubDate", b"published", b"date", b"issued"];

#[derive(Debug)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}

pub struct FeedParser;

impl FeedParser {
    pub fn parse_feed(content: &str) -> Result<ParsedFeed> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content.as_bytes()).map_err(|e| {
            if Self::is_valid_feed_content(content) {
                AssistantError::Parse(format!("Failed to parse feed: {}", e))
            } else {
                AssistantError::Parse("document is not an RSS or Atom feed".to_string())
            }
        })?;

        let title = feed
            .title
            .map(|t| t.content.trim().to_string())
            .filter(|t| !t.is_empty());

        // feed-rs drops dates it cannot parse, so the raw strings come from a second pass.
        let mut raw_dates = scan_published_dates(content);
        if raw_dates.len() != feed.entries.len() {
            debug!(
                "Raw date scan found {} entries, parser found {}; ignoring raw dates",
                raw_dates.len(),
                feed.entries.len()
            );
            raw_dates = vec![None; feed.entries.len()];
        }

        let entries: Vec<RawEntry> = feed
            .entries
            .into_iter()
            .zip(raw_dates)
            .map(|(entry, raw_date)| Self::raw_entry(entry, raw_date))
            .collect();

        info!("Parsed feed with {} entries", entries.len());

        Ok(ParsedFeed { title, entries })
    }

    fn raw_entry(entry: Entry, raw_date: Option<String>) -> RawEntry {
        let mut raw = RawEntry::new();

        if let Some(title) = entry.title {
            raw = raw.with_text(fields::TITLE, title.content);
        }
        if let Some(link) = article_link(&entry.links) {
            raw = raw.with_text(fields::LINK, link.href.clone());
        }
        if let Some(body) = entry.content.and_then(|c| c.body) {
            raw = raw.with_text(fields::CONTENT, body);
        }
        if let Some(summary) = entry.summary {
            raw = raw.with_text(fields::DESCRIPTION, summary.content);
        }
        if let Some(published) = entry.published {
            raw = raw.with_timestamp(fields::PUBLISHED_PARSED, published);
        }
        if let Some(raw_date) = raw_date {
            raw = raw.with_text(fields::PUBLISHED, raw_date);
        }

        let tags = entry
            .categories
            .into_iter()
            .map(|c| vec![("term".to_string(), c.term)]);
        let authors = entry
            .authors
            .into_iter()
            .map(|a| vec![("name".to_string(), a.name)]);

        raw.with_records(fields::TAGS, tags)
            .with_records(fields::AUTHORS, authors)
    }

    pub fn is_valid_feed_content(content: &str) -> bool {
        let content_lower = content.to_lowercase();
        content_lower.contains("<rss")
            || content_lower.contains("<feed")
            || content_lower.contains("<rdf:rdf")
            || content_lower.contains("<channel")
    }
}

/// The article's own page: the first `alternate` (or untyped) link, else the first link.
fn article_link(links: &[Link]) -> Option<&Link> {
    links
        .iter()
        .find(|link| matches!(link.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
}

/// Raw published-date text of every `<item>`/`<entry>`, in document order.
fn scan_published_dates(content: &str) -> Vec<Option<String>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut dates = Vec::new();
    let mut in_entry = false;
    let mut depth = 0usize;
    let mut capturing = false;
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                if !in_entry && is_entry_element(name.as_ref()) {
                    in_entry = true;
                    depth = 0;
                    current = None;
                } else if in_entry {
                    depth += 1;
                    capturing = depth == 1
                        && current.is_none()
                        && PUBLISHED_ELEMENTS.contains(&name.as_ref());
                }
            }
            Ok(Event::End(e)) => {
                if !in_entry {
                    continue;
                }
                if depth == 0 && is_entry_element(e.local_name().as_ref()) {
                    in_entry = false;
                    dates.push(current.take().filter(|d| !d.trim().is_empty()));
                } else {
                    if capturing && current.is_none() {
                        // An element with no text still marks the date as present-but-empty.
                        current = Some(String::new());
                    }
                    capturing = false;
                    depth = depth.saturating_sub(1);
                }
            }
            Ok(Event::Text(e)) if capturing => {
                let text = e.unescape().map(|t| t.into_owned()).unwrap_or_default();
                current.get_or_insert_with(String::new).push_str(&text);
            }
            Ok(Event::CData(e)) if capturing => {
                let bytes = e.into_inner();
                let text = String::from_utf8_lossy(&bytes).into_owned();
                current.get_or_insert_with(String::new).push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                debug!("Raw date scan stopped early: {}", e);
                break;
            }
            _ => {}
        }
    }

    dates
}

fn is_entry_element(name: &[u8]) -> bool {
    name == b"item" || name == b"entry"
}
