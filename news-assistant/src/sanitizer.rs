//! HTML cleanup for feed bodies before they reach the context block.

use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b.*?</script\s*>").expect("valid regex"));
static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b.*?</style\s*>").expect("valid regex"));
static LINE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^<>]*>").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("valid regex"));
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" +").expect("valid regex"));

pub struct HtmlSanitizer;

impl HtmlSanitizer {
    /// Turn a raw feed body into plain text.
    pub fn clean(raw: &str) -> String {
        let text = SCRIPT_BLOCK.replace_all(raw, "");
        let text = STYLE_BLOCK.replace_all(&text, "");
        let text = LINE_BREAK.replace_all(&text, "\n");
        let text = TAG.replace_all(&text, "");

        // Entity-encoded markup decodes into real tags; strip those too.
        let decoded = html_escape::decode_html_entities(&text);
        let text = TAG.replace_all(&decoded, "");

        let text = BLANK_LINES.replace_all(&text, "\n\n");
        let text = SPACES.replace_all(&text, " ");
        text.trim().to_string()
    }
}
