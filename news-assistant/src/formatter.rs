//! Post-processing of model output.
//!
//! Every rule only looks inside a single line, so a formatter that holds back
//! the unfinished last line of a stream produces exactly the same text as one
//! that sees the whole answer at once.

use regex::Regex;
use std::sync::LazyLock;

static HEADER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+ .+$").expect("valid regex"));
static STAR_BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\* ").expect("valid regex"));
static TIGHT_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^-(\S)").expect("valid regex"));
static QUOTED_BLOCKQUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#">"([^"\n]+)""#).expect("valid regex"));
static LEADING_KEY_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Key Point:").expect("valid regex"));
static BULLET_KEY_POINT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^- (?:\*\*Key Point\*\*|Key Point):").expect("valid regex"));
static CITATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Source: ([^(\n]+) \(([^)\n]+)\)").expect("valid regex"));

/// Rewrite `Source: Title (URL)` citations as `Source: [Title](URL)`.
pub fn link_citations(text: &str) -> String {
    CITATION.replace_all(text, "Source: [${1}](${2})").into_owned()
}

/// Incremental formatter for one answer.
#[derive(Debug, Default)]
pub struct ResponseFormatter {
    pending: String,
    started: bool,
}

impl ResponseFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Format a complete answer in one go.
    pub fn format_all(text: &str) -> String {
        let mut formatter = Self::new();
        let mut out = formatter.push(text).unwrap_or_default();
        if let Some(rest) = formatter.finish() {
            out.push_str(&rest);
        }
        out
    }

    /// Feed a raw chunk; returns the formatted text of every line it completed.
    pub fn push(&mut self, chunk: &str) -> Option<String> {
        self.pending.push_str(chunk);
        let cut = self.pending.rfind('\n')? + 1;
        let complete: String = self.pending.drain(..cut).collect();
        Some(self.format_segment(&complete))
    }

    /// Flush whatever is left after the last newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.pending);
        Some(self.format_segment(&rest))
    }

    fn format_segment(&mut self, segment: &str) -> String {
        let text = HEADER_LINE.replace_all(segment, "");
        let text = STAR_BULLET.replace_all(&text, "- ");
        let text = TIGHT_DASH.replace_all(&text, "- ${1}");
        let text = QUOTED_BLOCKQUOTE.replace_all(&text, "\"${1}\"");
        let text = if self.started {
            text
        } else {
            self.started = true;
            std::borrow::Cow::Owned(LEADING_KEY_POINT.replace(&text, "").into_owned())
        };
        let text = BULLET_KEY_POINT.replace_all(&text, "- ");
        link_citations(&text)
    }
}
