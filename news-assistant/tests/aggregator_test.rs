mod common;

use common::{init_tracing, rss, RssItem, StaticFeeds, NOT_A_FEED};
use news_assistant::{
    AssistantError, FeedAggregator, FetchConfig, Result, WarningKind, RECENT_SENTINEL,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn aggregator(source: StaticFeeds) -> FeedAggregator {
    FeedAggregator::new(Arc::new(source), &FetchConfig::default())
}

fn urls(list: &[&str]) -> Vec<String> {
    list.iter().map(|u| u.to_string()).collect()
}

#[tokio::test]
async fn test_one_malformed_feed_becomes_a_warning() -> Result<()> {
    init_tracing();

    let source = StaticFeeds::new()
        .with_feed(
            "http://a.example/feed",
            rss(
                Some("Alpha News"),
                &[
                    RssItem::new("Gateway shipped", "http://a.example/1")
                        .dated("Tue, 02 Jan 2024 10:00:00 +0000"),
                    RssItem::new("Chip announced", "http://a.example/2")
                        .dated("Mon, 01 Jan 2024 10:00:00 +0000"),
                ],
            ),
        )
        .with_feed("http://b.example/feed", NOT_A_FEED)
        .with_feed(
            "http://c.example/feed",
            rss(
                Some("Gamma"),
                &[RssItem::new("Sensor recall", "http://c.example/1")
                    .dated("Wed, 03 Jan 2024 10:00:00 +0000")],
            ),
        );

    let batch = aggregator(source)
        .fetch_all(&urls(&[
            "http://a.example/feed",
            "http://b.example/feed",
            "http://c.example/feed",
        ]))
        .await?;

    info!("Aggregated {} items, {} warnings", batch.items.len(), batch.warnings.len());
    assert_eq!(batch.items.len(), 3);
    assert_eq!(batch.warnings.len(), 1);
    assert_eq!(batch.warnings[0].kind, WarningKind::Parse);
    assert_eq!(batch.warnings[0].feed_url, "http://b.example/feed");

    let titles: Vec<_> = batch.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Sensor recall", "Gateway shipped", "Chip announced"]);
    assert_eq!(batch.items[0].source, "Gamma");
    assert_eq!(batch.items[1].published_at, "January 02, 2024");
    Ok(())
}

#[tokio::test]
async fn test_all_feeds_failing_is_no_news() -> Result<()> {
    init_tracing();

    let source = StaticFeeds::new()
        .with_feed("http://b.example/feed", NOT_A_FEED)
        .with_feed("http://empty.example/feed", rss(Some("Empty"), &[]));

    let result = aggregator(source)
        .fetch_all(&urls(&[
            "http://down.example/feed",
            "http://b.example/feed",
            "http://empty.example/feed",
        ]))
        .await;

    match result {
        Err(AssistantError::NoNewsAvailable { warnings }) => {
            let kinds: Vec<_> = warnings.iter().map(|w| w.kind).collect();
            assert_eq!(kinds, vec![WarningKind::Fetch, WarningKind::Parse, WarningKind::EmptyFeed]);
        }
        other => panic!("expected NoNewsAvailable, got {:?}", other.map(|b| b.items.len())),
    }
    Ok(())
}

#[tokio::test]
async fn test_at_most_five_entries_per_feed() -> Result<()> {
    init_tracing();

    let titles: Vec<String> = (0..8).map(|i| format!("Story {}", i)).collect();
    let links: Vec<String> = (0..8).map(|i| format!("http://a.example/{}", i)).collect();
    let items: Vec<RssItem> = titles
        .iter()
        .zip(&links)
        .map(|(title, link)| RssItem::new(title, link))
        .collect();

    let source = StaticFeeds::new().with_feed("http://a.example/feed", rss(Some("Alpha"), &items));
    let batch = aggregator(source).fetch_all(&urls(&["http://a.example/feed"])).await?;

    // Undated items all sort as "now" and keep document order.
    let got: Vec<_> = batch.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(got, vec!["Story 0", "Story 1", "Story 2", "Story 3", "Story 4"]);
    assert!(batch.items.iter().all(|i| i.published_at == RECENT_SENTINEL));
    Ok(())
}

#[tokio::test]
async fn test_missing_and_unparseable_dates() -> Result<()> {
    init_tracing();

    let source = StaticFeeds::new().with_feed(
        "http://www.dates.example/feed",
        rss(
            None,
            &[
                RssItem::new("No date", "http://dates.example/1"),
                RssItem::new("Bad date", "http://dates.example/2").dated("sometime last week"),
            ],
        ),
    );
    let batch = aggregator(source)
        .fetch_all(&urls(&["http://www.dates.example/feed"]))
        .await?;

    let no_date = batch.items.iter().find(|i| i.title == "No date").unwrap();
    let bad_date = batch.items.iter().find(|i| i.title == "Bad date").unwrap();
    assert_eq!(no_date.published_at, RECENT_SENTINEL);
    assert!(no_date.resolved_at.is_none());
    assert_ne!(bad_date.published_at, RECENT_SENTINEL);
    assert!(bad_date.resolved_at.is_some());

    // Without a channel title the host names the source.
    assert_eq!(no_date.source, "dates.example");
    Ok(())
}

#[tokio::test]
async fn test_bad_entries_are_skipped_with_a_warning() -> Result<()> {
    init_tracing();

    let feed = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>Mixed</title><link>http://m.example/</link><description>d</description>
<item><title>Kept</title><link>http://m.example/1</link><description><![CDATA[<p>Hello <b>IoT</b> &amp; edge</p>]]></description></item>
<item><title>No link</title><description>orphan</description></item>
</channel></rss>"#;

    let source = StaticFeeds::new().with_feed("http://m.example/feed", feed);
    let batch = aggregator(source).fetch_all(&urls(&["http://m.example/feed"])).await?;

    assert_eq!(batch.items.len(), 1);
    assert_eq!(batch.items[0].description, "Hello IoT & edge");
    assert_eq!(batch.warnings.len(), 1);
    assert_eq!(batch.warnings[0].kind, WarningKind::Entry);
    assert!(batch.context.contains("Full Content: Hello IoT & edge\n"));
    Ok(())
}

#[tokio::test]
async fn test_merge_keeps_configuration_order_when_feeds_finish_out_of_order() -> Result<()> {
    init_tracing();

    let source = StaticFeeds::new()
        .with_feed(
            "http://slow.example/feed",
            rss(
                Some("Slow"),
                &[
                    RssItem::new("Slow one", "http://slow.example/1"),
                    RssItem::new("Slow two", "http://slow.example/2"),
                ],
            ),
        )
        .with_delay("http://slow.example/feed", Duration::from_millis(100))
        .with_feed(
            "http://fast.example/feed",
            rss(Some("Fast"), &[RssItem::new("Fast one", "http://fast.example/1")]),
        );

    let batch = aggregator(source)
        .fetch_all(&urls(&["http://slow.example/feed", "http://fast.example/feed"]))
        .await?;

    // All undated, so the stable sort leaves the merge order untouched.
    let titles: Vec<_> = batch.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Slow one", "Slow two", "Fast one"]);
    Ok(())
}
