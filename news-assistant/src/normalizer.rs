use crate::sanitizer::HtmlSanitizer;
use crate::types::{NewsItem, RECENT_SENTINEL};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub mod fields {
    pub const TITLE: &str = "title";
    pub const LINK: &str = "link";
    pub const CONTENT: &str = "content";
    pub const DESCRIPTION: &str = "description";
    pub const SUMMARY: &str = "summary";
    pub const PUBLISHED_PARSED: &str = "published_parsed";
    pub const PUBLISHED: &str = "published";
    pub const TAGS: &str = "tags";
    pub const AUTHORS: &str = "authors";
}

/// `RFC-822` dates with a numeric offset, e.g. `Mon, 01 Jan 2024 00:00:00 +0000`.
const RFC822_OFFSET: &str = "%a, %d %b %Y %H:%M:%S %z";
/// `RFC-822` dates with a zone name, e.g. `Mon, 01 Jan 2024 00:00:00 GMT`.
const RFC822_ZONE: &str = "%a, %d %b %Y %H:%M:%S %Z";
/// `ISO-8601` with an offset, e.g. `2024-01-01T00:00:00+0000`.
const ISO8601_OFFSET: &str = "%Y-%m-%dT%H:%M:%S%z";

const DISPLAY_DATE: &str = "%B %d, %Y";

/// Value of one field of a feed entry as the feed library handed it over.
#[derive(Debug, Clone, PartialEq)]
pub enum RawField {
    Text(String),
    Timestamp(DateTime<Utc>),
    Records(Vec<BTreeMap<String, String>>),
}

/// A feed entry before normalization: any field may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    fields: HashMap<String, RawField>,
}

impl RawEntry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, field: &str, value: impl Into<String>) -> Self {
        self.fields.insert(field.to_string(), RawField::Text(value.into()));
        self
    }

    pub fn with_timestamp(mut self, field: &str, value: DateTime<Utc>) -> Self {
        self.fields.insert(field.to_string(), RawField::Timestamp(value));
        self
    }

    pub fn with_records<I, R, K, V>(mut self, field: &str, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let records = records
            .into_iter()
            .map(|record| {
                record
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect()
            })
            .collect();
        self.fields.insert(field.to_string(), RawField::Records(records));
        self
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(RawField::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Like `text`, but whitespace-only values count as missing.
    pub fn non_blank(&self, field: &str) -> Option<&str> {
        self.text(field).filter(|value| !value.trim().is_empty())
    }

    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        match self.fields.get(field) {
            Some(RawField::Timestamp(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn records(&self, field: &str) -> &[BTreeMap<String, String>] {
        match self.fields.get(field) {
            Some(RawField::Records(records)) => records.as_slice(),
            _ => &[],
        }
    }
}

/// Why an entry was left out of the news set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("entry has no {field}")]
pub struct EntryRejected {
    pub field: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedDate {
    At(DateTime<Utc>),
    Recent,
}

pub struct FeedEntryNormalizer;

impl FeedEntryNormalizer {
    pub fn normalize(entry: &RawEntry, source_name: &str) -> Result<NewsItem, EntryRejected> {
        Self::normalize_at(entry, source_name, Utc::now())
    }

    /// Normalize with an explicit wall clock for the unparseable-date fallback.
    pub fn normalize_at(
        entry: &RawEntry,
        source_name: &str,
        now: DateTime<Utc>,
    ) -> Result<NewsItem, EntryRejected> {
        let title = entry
            .non_blank(fields::TITLE)
            .ok_or(EntryRejected { field: fields::TITLE })?
            .trim()
            .to_string();
        let link = entry
            .non_blank(fields::LINK)
            .ok_or(EntryRejected { field: fields::LINK })?
            .trim()
            .to_string();

        let body = entry
            .non_blank(fields::CONTENT)
            .or_else(|| entry.text(fields::DESCRIPTION))
            .or_else(|| entry.text(fields::SUMMARY))
            .unwrap_or("");
        let description = HtmlSanitizer::clean(body);

        let (published_at, resolved_at) = match resolve_date(entry, now) {
            ResolvedDate::At(at) => (at.format(DISPLAY_DATE).to_string(), Some(at)),
            ResolvedDate::Recent => (RECENT_SENTINEL.to_string(), None),
        };

        Ok(NewsItem {
            title,
            description,
            link,
            published_at,
            tags: record_values(entry, fields::TAGS, "term"),
            authors: record_values(entry, fields::AUTHORS, "name"),
            source: source_name.to_string(),
            resolved_at,
        })
    }
}

fn resolve_date(entry: &RawEntry, now: DateTime<Utc>) -> ResolvedDate {
    if let Some(parsed) = entry.timestamp(fields::PUBLISHED_PARSED) {
        return ResolvedDate::At(parsed);
    }

    match entry.non_blank(fields::PUBLISHED) {
        None => ResolvedDate::Recent,
        Some(raw) => match parse_textual_date(raw) {
            Some(parsed) => ResolvedDate::At(parsed),
            None => {
                debug!("Unparseable published date {:?}, using current time", raw);
                ResolvedDate::At(now)
            }
        },
    }
}

/// Try the accepted textual date formats in order.
pub fn parse_textual_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_str(raw, RFC822_OFFSET) {
        return Some(dt.with_timezone(&Utc));
    }

    // Zone names: rfc2822 knows GMT/UT and the US zones, anything else is read as UTC.
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, RFC822_ZONE) {
        return Some(naive.and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, ISO8601_OFFSET)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn record_values(entry: &RawEntry, field: &str, key: &str) -> Vec<String> {
    entry
        .records(field)
        .iter()
        .filter_map(|record| record.get(key))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_entry() -> RawEntry {
        RawEntry::new()
            .with_text(fields::TITLE, "Widget Launch")
            .with_text(fields::LINK, "http://ex.com/a")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn missing_date_yields_recent_sentinel() {
        let item =
            FeedEntryNormalizer::normalize_at(&base_entry(), "Example", fixed_now()).unwrap();
        assert_eq!(item.published_at, "Recent");
        assert!(item.resolved_at.is_none());
    }

    #[test]
    fn unparseable_date_yields_current_time() {
        let entry = base_entry().with_text(fields::PUBLISHED, "sometime last week");
        let item = FeedEntryNormalizer::normalize_at(&entry, "Example", fixed_now()).unwrap();
        assert_eq!(item.published_at, "March 14, 2025");
        assert_eq!(item.resolved_at, Some(fixed_now()));
    }

    #[test]
    fn parsed_timestamp_wins_over_text() {
        let parsed = Utc.with_ymd_and_hms(2023, 7, 4, 9, 30, 0).unwrap();
        let entry = base_entry()
            .with_timestamp(fields::PUBLISHED_PARSED, parsed)
            .with_text(fields::PUBLISHED, "Mon, 01 Jan 2024 00:00:00 +0000");
        let item = FeedEntryNormalizer::normalize_at(&entry, "Example", fixed_now()).unwrap();
        assert_eq!(item.published_at, "July 04, 2023");
    }

    #[test]
    fn textual_formats_are_tried_in_order() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_textual_date("Mon, 01 Jan 2024 00:00:00 +0000"), Some(expected));
        assert_eq!(parse_textual_date("Mon, 01 Jan 2024 00:00:00 GMT"), Some(expected));
        assert_eq!(parse_textual_date("2024-01-01T00:00:00+00:00"), Some(expected));
        assert_eq!(parse_textual_date("2024-01-01T02:00:00+0200"), Some(expected));
        assert_eq!(parse_textual_date("yesterday"), None);
    }

    #[test]
    fn prefers_content_over_description() {
        let entry = base_entry()
            .with_text(fields::CONTENT, "<p>Full <b>story</b></p>")
            .with_text(fields::DESCRIPTION, "Teaser");
        let item = FeedEntryNormalizer::normalize_at(&entry, "Example", fixed_now()).unwrap();
        assert_eq!(item.description, "Full story");

        let entry = base_entry()
            .with_text(fields::CONTENT, "   ")
            .with_text(fields::DESCRIPTION, "Teaser &amp; more");
        let item = FeedEntryNormalizer::normalize_at(&entry, "Example", fixed_now()).unwrap();
        assert_eq!(item.description, "Teaser & more");
    }

    #[test]
    fn entry_without_body_is_still_admitted() {
        let item =
            FeedEntryNormalizer::normalize_at(&base_entry(), "Example", fixed_now()).unwrap();
        assert_eq!(item.description, "");
        assert_eq!(item.source, "Example");
    }

    #[test]
    fn tags_and_authors_skip_empty_values() {
        let entry = base_entry()
            .with_records(
                fields::TAGS,
                vec![vec![("term", "IoT")], vec![("term", "")], vec![("label", "ignored")]],
            )
            .with_records(
                fields::AUTHORS,
                vec![vec![("name", "Ada Lovelace")], vec![("name", "  ")]],
            );
        let item = FeedEntryNormalizer::normalize_at(&entry, "Example", fixed_now()).unwrap();
        assert_eq!(item.tags, vec!["IoT".to_string()]);
        assert_eq!(item.authors, vec!["Ada Lovelace".to_string()]);
    }

    #[test]
    fn missing_title_or_link_is_rejected() {
        let no_title = RawEntry::new().with_text(fields::LINK, "http://ex.com/a");
        assert_eq!(
            FeedEntryNormalizer::normalize(&no_title, "Example"),
            Err(EntryRejected { field: fields::TITLE })
        );

        let no_link = RawEntry::new().with_text(fields::TITLE, "Widget Launch");
        assert_eq!(
            FeedEntryNormalizer::normalize(&no_link, "Example"),
            Err(EntryRejected { field: fields::LINK })
        );
    }
}
