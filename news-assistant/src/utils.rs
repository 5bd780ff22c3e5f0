/// URL utilities
pub mod url {
    use url::Url;

    /// Host of `url_str` without a leading `www.`
    pub fn display_host(url_str: &str) -> Option<String> {
        let url = Url::parse(url_str).ok()?;
        let host = url.host_str()?;
        let host = host.strip_prefix("www.").unwrap_or(host);
        if host.is_empty() {
            None
        } else {
            Some(host.to_string())
        }
    }

    /// Validate feed URL format
    pub fn is_valid_feed_url(url_str: &str) -> bool {
        if let Ok(url) = Url::parse(url_str) {
            url.scheme() == "http" || url.scheme() == "https"
        } else {
            false
        }
    }
}

/// Text utilities for answers shown in a terminal
pub mod text {
    /// Remove Markdown code-fence markers so an answer is shown as prose.
    pub fn strip_code_fences(text: &str) -> String {
        if !text.trim_start().starts_with("```") {
            return text.to_string();
        }
        text.lines()
            .filter(|line| !line.trim_start().starts_with("```"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_host_strips_www() {
        assert_eq!(
            url::display_host("https://www.iotinsider.com/feed/"),
            Some("iotinsider.com".to_string())
        );
        assert_eq!(
            url::display_host("http://feeds.example.org/rss"),
            Some("feeds.example.org".to_string())
        );
        assert_eq!(url::display_host("not a url"), None);
    }

    #[test]
    fn feed_urls_must_be_http() {
        assert!(url::is_valid_feed_url("https://example.com/feed.xml"));
        assert!(!url::is_valid_feed_url("ftp://example.com/feed"));
        assert!(!url::is_valid_feed_url("invalid-url"));
    }

    #[test]
    fn code_fences_are_removed_only_from_fenced_answers() {
        assert_eq!(text::strip_code_fences("```markdown\n- a\n- b\n```"), "- a\n- b");
        assert_eq!(text::strip_code_fences("plain ``` inline"), "plain ``` inline");
    }
}
