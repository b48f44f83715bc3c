//! Text processing utilities.

use regex::Regex;
use std::sync::OnceLock;

static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();

fn whitespace_re() -> &'static Regex {
    WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("static regex is valid"))
}

/// Replace consecutive whitespace (spaces, tabs, newlines) with a single space
/// and trim leading/trailing whitespace.
///
/// Returns an empty string for inputs that are entirely whitespace.
pub fn normalize_whitespace(s: &str) -> String {
    if s.is_empty() {
        return String::new();
    }
    whitespace_re().replace_all(s, " ").trim().to_string()
}

/// Truncate `s` to at most `max_len` Unicode scalar values, appending `"..."` if
/// truncation occurred. `max_len` counts characters (not bytes), making this safe
/// for multi-byte UTF-8 content including emoji and CJK characters.
///
/// Special cases:
/// - `max_len == 0` → empty string
/// - `max_len <= 3` → up to `max_len` dots (e.g. `max_len=2` → `".."`)
pub fn truncate_with_ellipsis(s: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }

    let char_count = s.chars().count();
    if char_count <= max_len {
        return s.to_string();
    }

    if max_len <= 3 {
        return ".".repeat(max_len);
    }

    // Find byte offset of the (max_len - 3)th character.
    let keep_chars = max_len - 3;
    let byte_offset = s
        .char_indices()
        .nth(keep_chars)
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    format!("{}...", &s[..byte_offset])
}

/// Extract the first JSON object or array from a potentially markdown-wrapped
/// LLM response.
///
/// Tries, in order:
/// 1. ` ```json ... ``` ` fenced code block
/// 2. ` ``` ... ``` ` fenced code block
/// 3. Bare `{...}` or `[...]` delimited by the first `{`/`[` and last `}`/`]`
///
/// Returns `None` if no JSON-like content is found.
pub fn extract_json_from_response(s: &str) -> Option<&str> {
    // 1. Try ```json fenced block.
    if let Some(inner) = extract_fenced_block(s, "```json") {
        return Some(inner);
    }

    // 2. Try plain ``` fenced block.
    if let Some(inner) = extract_fenced_block(s, "```") {
        return Some(inner);
    }

    // 3. Bare JSON object.
    if let Some(start) = s.find('{') {
        if let Some(end) = s.rfind('}') {
            if end > start {
                return Some(&s[start..=end]);
            }
        }
    }

    // 4. Bare JSON array.
    if let Some(start) = s.find('[') {
        if let Some(end) = s.rfind(']') {
            if end > start {
                return Some(&s[start..=end]);
            }
        }
    }

    None
}

/// Extract content inside a fenced code block starting with `fence`.
fn extract_fenced_block<'a>(s: &'a str, fence: &str) -> Option<&'a str> {
    let start = s.find(fence)?;
    let after_fence = start + fence.len();

    // Skip to end of the opening fence line.
    let newline = s[after_fence..].find('\n')?;
    let content_start = after_fence + newline + 1;

    // Find closing ```.
    let close = s[content_start..].find("```")?;
    let content = s[content_start..content_start + close].trim();

    if content.is_empty() {
        return None;
    }

    Some(content)
}
