//! Utility functions for text processing, HTML cleaning, and message formatting.
//!
//! Regex patterns are declared with `lazy_regex!`, so they are validated at
//! compile time and built on first use.

// lazy_regex! relies on once_cell statics
#![allow(clippy::non_std_lazy_statics)]

use anyhow::Result;
use lazy_regex::lazy_regex;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

/// Markdown code fence
const CODE_FENCE: &str = "```";

/// Match code blocks: ```...```
static RE_CODE_BLOCK: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"```[\s\S]*?```");

/// Match code blocks with optional language: ```language\ncode```
static RE_CODE_BLOCK_FENCE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"```(\w+)?\n([\s\S]*?)```");

/// Match bullet points at start of line: *
static RE_BULLET: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"(?m)^\* ");

/// Match bold text: **text**
static RE_BOLD: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*\*(.*?)\*\*");

/// Match italic text: *text*
static RE_ITALIC: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\*(.*?)\*");

/// Match inline code: `code`
static RE_INLINE_CODE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"`(.*?)`");

/// Match 3+ consecutive newlines
static RE_MULTI_NEWLINE: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"\n{3,}");

/// Replace naked angle brackets with HTML entities, preserving Telegram-allowed HTML tags.
fn escape_angle_brackets(text: &str) -> String {
    const TELEGRAM_ALLOWED_TAGS: &[&str] = &[
        "b", "i", "u", "s", "code", "pre", "a", "/b", "/i", "/u", "/s", "/code", "/pre", "/a",
    ];

    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_tag = false;

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                let mut tag = String::new();
                if let Some(slash) = chars.next_if_eq(&'/') {
                    tag.push(slash);
                }
                while let Some(next_char) = chars.next_if(char::is_ascii_alphanumeric) {
                    tag.push(next_char);
                }

                if TELEGRAM_ALLOWED_TAGS.contains(&tag.as_str()) {
                    result.push('<');
                    in_tag = true;
                } else {
                    result.push_str("&lt;");
                }
                result.push_str(&tag);
            }
            '>' if in_tag => {
                result.push('>');
                in_tag = false;
            }
            '>' => result.push_str("&gt;"),
            _ => result.push(c),
        }
    }
    result
}

/// Cleans HTML content by escaping naked angle brackets while preserving code blocks and valid HTML tags.
///
/// # Examples
///
/// ```
/// use oxide_relay::utils::clean_html;
/// let input = "Check this: 1 < 2 but <b>bold</b> works";
/// let cleaned = clean_html(input);
/// assert_eq!(cleaned, "Check this: 1 &lt; 2 but <b>bold</b> works");
/// ```
#[must_use]
pub fn clean_html(text: &str) -> String {
    // UUID placeholders so user text can never collide with them
    let mut code_blocks: Vec<(String, String)> = Vec::new();

    let mut result = String::with_capacity(text.len());
    let mut last_end = 0;
    for mat in RE_CODE_BLOCK.find_iter(text) {
        result.push_str(&text[last_end..mat.start()]);
        let placeholder = format!("__CODE_BLOCK_{}__", Uuid::new_v4().as_simple());
        code_blocks.push((placeholder.clone(), mat.as_str().to_string()));
        result.push_str(&placeholder);
        last_end = mat.end();
    }
    result.push_str(&text[last_end..]);

    let mut escaped = escape_angle_brackets(&result);
    for (placeholder, block) in code_blocks {
        escaped = escaped.replace(&placeholder, &block);
    }
    escaped
}

/// Formats markdown-like text into Telegram-compatible HTML.
///
/// Supported formatting:
/// - Code blocks: ` ```language\ncode``` ` -> `<pre><code class="language">code</code></pre>`
/// - Bullets: `* ` at the start of a line -> `• `
/// - Bold: `**text**` -> `<b>text</b>`
/// - Italic: `*text*` -> `<i>text</i>`
/// - Inline code: `` `code` `` -> `<code>code</code>`
/// - Multiple newlines (3+) are collapsed into two.
///
/// # Examples
///
/// ```
/// use oxide_relay::utils::format_text;
/// let input = "**Bold** and *italic* with `code`";
/// let formatted = format_text(input);
/// assert_eq!(formatted, "<b>Bold</b> and <i>italic</i> with <code>code</code>");
/// ```
#[must_use]
pub fn format_text(text: &str) -> String {
    let mut protected = ProtectedFragments::default();
    let mut text_owned = clean_html(text);

    // Rendered code is parked behind placeholders so the inline passes below
    // never touch `*` or backticks inside it
    text_owned = RE_CODE_BLOCK_FENCE
        .replace_all(&text_owned, |caps: &regex::Captures| {
            let lang = caps.get(1).map_or("", |m| m.as_str());
            let code = caps.get(2).map_or("", |m| m.as_str()).trim();
            let escaped_code = html_escape::encode_text(code);
            protected.hold(format!(
                "<pre><code class=\"{lang}\">{escaped_code}</code></pre>"
            ))
        })
        .to_string();

    text_owned = RE_INLINE_CODE
        .replace_all(&text_owned, |caps: &regex::Captures| {
            let code = caps.get(1).map_or("", |m| m.as_str());
            let escaped_code = html_escape::encode_text(code);
            protected.hold(format!("<code>{escaped_code}</code>"))
        })
        .to_string();

    text_owned = RE_BULLET.replace_all(&text_owned, "• ").to_string();
    text_owned = RE_BOLD.replace_all(&text_owned, "<b>$1</b>").to_string();
    text_owned = RE_ITALIC.replace_all(&text_owned, "<i>$1</i>").to_string();

    text_owned = RE_MULTI_NEWLINE
        .replace_all(&text_owned, "\n\n")
        .to_string();

    protected.restore(text_owned.trim())
}

/// Rendered HTML fragments swapped out for unique placeholders
#[derive(Default)]
struct ProtectedFragments {
    fragments: Vec<(String, String)>,
}

impl ProtectedFragments {
    fn hold(&mut self, html: String) -> String {
        let placeholder = format!("\u{0}FRAGMENT{}\u{0}", Uuid::new_v4().as_simple());
        self.fragments.push((placeholder.clone(), html));
        placeholder
    }

    fn restore(self, text: &str) -> String {
        let mut restored = text.to_string();
        for (placeholder, html) in self.fragments {
            restored = restored.replace(&placeholder, &html);
        }
        restored
    }
}

/// Accumulates lines into parts no longer than a byte budget.
struct MessageSplitter {
    parts: Vec<String>,
    current: String,
    has_content: bool,
    in_code_block: bool,
    /// Start of the opening fence line when it is the last line of `current`
    pending_fence: Option<usize>,
    budget: usize,
}

impl MessageSplitter {
    const fn new(budget: usize) -> Self {
        Self {
            parts: Vec::new(),
            current: String::new(),
            has_content: false,
            in_code_block: false,
            pending_fence: None,
            budget,
        }
    }

    fn push_line(&mut self, line: &str) {
        if line.len() <= self.budget {
            let is_fence = line.trim_start().starts_with(CODE_FENCE);
            self.push_piece(line, is_fence);
            return;
        }

        // Over-long line: cut on grapheme clusters so multi-byte text stays intact
        let mut chunk = String::new();
        for grapheme in line.graphemes(true) {
            if !chunk.is_empty() && chunk.len() + grapheme.len() > self.budget {
                self.push_piece(&chunk, false);
                chunk.clear();
            }
            chunk.push_str(grapheme);
        }
        if !chunk.is_empty() {
            self.push_piece(&chunk, false);
        }
    }

    fn push_piece(&mut self, piece: &str, is_fence: bool) {
        if self.has_content && self.current.len() + piece.len() + 1 > self.budget {
            self.break_part(piece.len() + 1);
        }

        let start = self.current.len();
        self.current.push_str(piece);
        self.current.push('\n');
        self.has_content = true;
        if is_fence {
            self.in_code_block = !self.in_code_block;
        }
        self.pending_fence = (is_fence && self.in_code_block).then_some(start);
    }

    /// Ends the current part. An opening fence that would be left dangling at
    /// the end of the part moves to the next one when it fits there.
    fn break_part(&mut self, incoming: usize) {
        if let Some(start) = self.pending_fence.take() {
            let fence_len = self.current.len() - start;
            if start > 0 && fence_len + incoming <= self.budget {
                let fence_line = self.current.split_off(start);
                self.in_code_block = false;
                self.flush();
                self.current.push_str(&fence_line);
                self.in_code_block = true;
                self.has_content = true;
                return;
            }
        }
        self.flush();
    }

    fn flush(&mut self) {
        self.pending_fence = None;
        if self.in_code_block {
            self.current.push_str(CODE_FENCE);
        }

        let part = self.current.trim_end();
        if !part.trim().is_empty() {
            self.parts.push(part.to_string());
        }

        self.current.clear();
        self.has_content = false;
        if self.in_code_block {
            self.current.push_str(CODE_FENCE);
            self.current.push('\n');
        }
    }

    fn finish(mut self) -> Vec<String> {
        if self.has_content {
            self.flush();
        }
        self.parts
    }
}

/// Splits a long message into multiple parts that fit within a platform message limit.
///
/// Lines are kept whole where possible. A code block that straddles a split
/// is closed at the end of one part and reopened at the start of the next, so
/// every part renders on its own. A single line longer than the limit is cut
/// on grapheme cluster boundaries. Whitespace-only input yields no parts.
///
/// # Examples
///
/// ```
/// use oxide_relay::utils::split_long_message;
/// let long_msg = "A very long message...\n".repeat(300);
/// let parts = split_long_message(&long_msg, 4096);
/// assert!(parts.len() > 1);
/// assert!(parts.iter().all(|p| p.len() <= 4096));
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_length: usize) -> Vec<String> {
    if message.trim().is_empty() {
        return Vec::new();
    }

    if message.len() <= max_length {
        return vec![message.to_string()];
    }

    // Leave room to close a fence ("\n```") and reopen it ("```\n")
    let budget = max_length
        .saturating_sub(2 * (CODE_FENCE.len() + 1))
        .max(1);

    let mut splitter = MessageSplitter::new(budget);
    for line in message.lines() {
        splitter.push_line(line);
    }
    splitter.finish()
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use oxide_relay::utils::truncate_str;
/// let s = "Привет, мир!";
/// assert_eq!(truncate_str(s, 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retry a Telegram API operation with exponential backoff.
///
/// Meant for file transfers (`get_file` + `download_file`) that can fail on
/// transient network errors. Provider calls are never retried.
///
/// # Examples
///
/// ```no_run
/// use oxide_relay::utils::retry_telegram_operation;
/// use anyhow::Result;
///
/// async fn download_file() -> Result<Vec<u8>> {
///     Ok(vec![])
/// }
///
/// # async fn example() -> Result<()> {
/// let buffer = retry_telegram_operation(|| async {
///     download_file().await
/// }).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns the last error once all attempts are exhausted.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.map_err(|e| {
        warn!(
            "Telegram API operation failed after {} attempts: {}",
            TELEGRAM_API_MAX_RETRIES, e
        );
        e
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_unicode() {
        let s = "Привет, мир!";
        assert_eq!(truncate_str(s, 6), "Привет");
        assert_eq!(truncate_str(s, 50), "Привет, мир!");
    }

    #[test]
    fn test_clean_html_preserves_code_blocks() {
        let input = "Start\n```rust\nfn main() {\n    println!(\"<hello>\");\n}\n```\nEnd < 3";
        let expected =
            "Start\n```rust\nfn main() {\n    println!(\"<hello>\");\n}\n```\nEnd &lt; 3";
        assert_eq!(clean_html(input), expected);
    }

    #[test]
    fn test_clean_html_escapes_naked_brackets() {
        let input = "1 < 2 and 3 > 1 but <b>bold</b> and <a href=''>link</a>";
        let expected = "1 &lt; 2 and 3 &gt; 1 but <b>bold</b> and <a href=''>link</a>";
        assert_eq!(clean_html(input), expected);
    }

    #[test]
    fn test_clean_html_unsupported_tags() {
        let input = "Text with <thinking>value</thinking> and <custom>tag</custom>";
        let expected =
            "Text with &lt;thinking&gt;value&lt;/thinking&gt; and &lt;custom&gt;tag&lt;/custom&gt;";
        assert_eq!(clean_html(input), expected);
    }

    #[test]
    fn test_clean_html_placeholder_injection() {
        let input = "User says: __CODE_BLOCK_0__\n```rust\nfn evil() {}\n```";
        let cleaned = clean_html(input);
        assert!(cleaned.contains("User says: __CODE_BLOCK_0__"));
        assert!(cleaned.contains("fn evil()"));
    }

    #[test]
    fn test_format_text_markdown() {
        let input = "* Bullet\nAnd **bold** text\nAnd *italic*\nAnd `inline code`";
        let expected =
            "• Bullet\nAnd <b>bold</b> text\nAnd <i>italic</i>\nAnd <code>inline code</code>";
        assert_eq!(format_text(input), expected);
    }

    #[test]
    fn test_format_text_json_block() {
        let input = "```json\n{\n  \"a\": \"<b>\"\n}\n```";
        let expected = "<pre><code class=\"json\">{\n  \"a\": \"&lt;b&gt;\"\n}</code></pre>";
        assert_eq!(format_text(input), expected);
    }

    #[test]
    fn test_format_text_keeps_code_verbatim() {
        let reply = crate::schema::render_json_block(&serde_json::json!({
            "bold": "x ** y ** z",
            "formula": "a * b * c"
        }));
        let formatted = format_text(&reply);

        assert!(formatted.contains("a * b * c"));
        assert!(formatted.contains("x ** y ** z"));
        assert!(!formatted.contains("<i>"));
        assert!(!formatted.contains("<b>"));
        assert!(formatted.starts_with("<pre><code class=\"json\">"));
    }

    #[test]
    fn test_format_text_inline_code_not_styled() {
        assert_eq!(
            format_text("Use `a*b*c` or **bold**"),
            "Use <code>a*b*c</code> or <b>bold</b>"
        );
    }

    #[test]
    fn test_format_text_multi_newline() {
        assert_eq!(format_text("Line 1\n\n\n\nLine 2"), "Line 1\n\nLine 2");
    }

    #[test]
    fn test_split_short_message_untouched() {
        assert_eq!(split_long_message("hello", 2000), vec!["hello"]);
        assert!(split_long_message("  \n ", 2000).is_empty());
    }

    #[test]
    fn test_split_long_message_simple() {
        let input = "Line 1\nLine 2\nLine 3";
        // Budget is 19 - 8 = 11: one 7-byte line per part
        let parts = split_long_message(input, 19);
        assert_eq!(parts, vec!["Line 1", "Line 2", "Line 3"]);
    }

    #[test]
    fn test_split_long_message_with_code_block() {
        let input = "Start\n```\nLine 1\nLine 2\nLine 3\n```\nEnd";
        let parts = split_long_message(input, 24);

        assert_eq!(parts.first().map(String::as_str), Some("Start"));
        assert!(parts.len() > 1);
        for part in &parts {
            assert!(part.len() <= 24, "part too long: {part:?}");
            let fences = part.lines().filter(|l| l.starts_with("```")).count();
            assert_eq!(fences % 2, 0, "unbalanced fences in {part:?}");
        }
    }

    #[test]
    fn test_split_very_long_line() {
        let input = "a".repeat(10000);
        let parts = split_long_message(&input, 2000);

        assert!(parts.len() >= 5);
        assert!(parts.iter().all(|p| p.len() <= 2000));
        assert_eq!(parts.concat(), input);
    }

    #[test]
    fn test_split_unicode_graphemes() {
        let input = "🔥".repeat(5000);
        let parts = split_long_message(&input, 4096);

        assert!(parts.len() >= 5);
        for part in &parts {
            assert!(part.len() <= 4096);
        }
        assert_eq!(parts.concat(), input);
    }
}
