//! Content-block create document.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

const UNNAMED_BLOCK: &str = "Unnamed_Block";
const DIGIT_PREFIX: &str = "Block_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentBlockDraft {
    pub name: String,
    pub label: String,
    pub description: String,
    pub content_type: String,
    pub raw_content: String,
    pub images_used: Vec<String>,
    pub created_by: Option<String>,
}

impl ContentBlockDraft {
    /// `original_name` is sanitized for `name`/`label` and kept verbatim as
    /// the description fallback.
    pub fn new(
        original_name: &str,
        description: Option<String>,
        raw_content: String,
        created_by: Option<String>,
    ) -> Self {
        let name = sanitize_block_name(original_name);
        Self {
            label: name.clone(),
            name,
            description: description.unwrap_or_else(|| original_name.to_string()),
            content_type: "HTML".into(),
            raw_content,
            images_used: Vec::new(),
            created_by,
        }
    }
}

/// Restrict a block name to `[A-Za-z0-9_-]`.
///
/// Spaces become underscores and other characters are dropped. An empty
/// result becomes `Unnamed_Block`; a leading digit gets a `Block_` prefix.
pub fn sanitize_block_name(name: &str) -> String {
    static DISALLOWED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_-]").expect("valid regex"));

    let sanitized = DISALLOWED_RE
        .replace_all(&name.replace(' ', "_"), "")
        .into_owned();

    if sanitized.is_empty() {
        return UNNAMED_BLOCK.to_string();
    }
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        return format!("{DIGIT_PREFIX}{sanitized}");
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitize_block_name("Footer Links (v2)!"), "Footer_Links_v2");
        assert_eq!(sanitize_block_name("2024 promo"), "Block_2024_promo");
        assert_eq!(sanitize_block_name("***"), UNNAMED_BLOCK);
        assert_eq!(sanitize_block_name(""), UNNAMED_BLOCK);
        assert_eq!(sanitize_block_name("a-b_c"), "a-b_c");
    }

    #[test]
    fn description_defaults_to_original_name() {
        let draft = ContentBlockDraft::new("My Block", None, "<p/>".into(), None);
        assert_eq!(draft.name, "My_Block");
        assert_eq!(draft.label, "My_Block");
        assert_eq!(draft.description, "My Block");
        assert_eq!(draft.content_type, "HTML");

        let draft = ContentBlockDraft::new("x", Some("kept".into()), String::new(), None);
        assert_eq!(draft.description, "kept");
    }
}
