//! Per-field content bounds and text cleanup.

use std::sync::LazyLock;

use regex::Regex;

/// Marker appended to truncated content.
pub const ELLIPSIS: &str = "...";

/// Maximum field lengths, in characters.
pub mod limits {
    pub const EMAIL_SUBJECT: usize = 200;
    pub const EMAIL_PREHEADER: usize = 300;
    pub const EMAIL_HTML: usize = 100_000;
    pub const PUSH_TITLE: usize = 100;
    pub const PUSH_MESSAGE: usize = 240;
}

/// Shorten `text` to at most `max_chars` characters, ending in [`ELLIPSIS`]
/// when anything was cut.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let marker_len = ELLIPSIS.chars().count();
    if max_chars <= marker_len {
        return text.chars().take(max_chars).collect();
    }

    let mut out: String = text.chars().take(max_chars - marker_len).collect();
    out.push_str(ELLIPSIS);
    out
}

/// Remove markup tags, keeping their text.
pub fn strip_tags(text: &str) -> String {
    static TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));

    TAG_RE.replace_all(text, "").into_owned()
}

/// Strip tags then bound the result. Used for plain-text push fields.
pub fn plain_bounded(text: &str, max_chars: usize) -> String {
    truncate_with_ellipsis(&strip_tags(text), max_chars)
}
