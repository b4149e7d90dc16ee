//! Text clean-up shared by the adapters.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum characters kept from a source snippet.
pub const MAX_SNIPPET_CHARS: usize = 200;

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip HTML tags, decode the common entities, and collapse whitespace.
pub fn strip_html(input: &str) -> String {
    let without_tags = TAG.replace_all(input, "");
    let decoded = without_tags
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Cap `text` at [`MAX_SNIPPET_CHARS`], marking truncation with `...`.
pub fn truncate_snippet(text: &str) -> String {
    if text.chars().count() <= MAX_SNIPPET_CHARS {
        return text.to_string();
    }
    let cut: String = text.chars().take(MAX_SNIPPET_CHARS).collect();
    format!("{}...", cut.trim_end())
}
