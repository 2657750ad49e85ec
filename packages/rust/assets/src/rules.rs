//! Source-CDN URL rule set: domain patterns plus image-likelihood heuristics.
//!
//! Extraction runs in three passes: decode escapes, scan with every domain
//! pattern, then dedupe and keep only plausible image URLs. New CDN domain
//! variants are added as extra patterns without touching the pipeline.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use migrator_shared::{AssetSettings, MigratorError, Result};

/// Characters that terminate a URL inside markup or JSON.
const URL_TAIL: &str = r#"[^"'\s,<>()\\]+"#;

/// Built-in host patterns for the source CDN family. Each is followed by `/` and [`URL_TAIL`].
const BUILTIN_HOSTS: &[&str] = &[
    // primary image domain
    r"braze-images\.com",
    // every subdomain of the primary domain
    r"[a-z0-9-]+\.braze\.com",
    // storage buckets
    r"braze-social-icons\.s3\.amazonaws\.com",
    r"braze-[a-z0-9-]+\.s3\.amazonaws\.com",
    r"cdn[a-z0-9-]*\.braze\.com",
    r"assets[a-z0-9-]*\.braze\.com",
    // any other brand-named host
    r"[a-z0-9-]*braze[a-z0-9-]*\.[a-z0-9.-]+",
    // legacy brand
    r"[a-z0-9-]*appboy[a-z0-9-]*\.[a-z0-9.-]+",
];

/// Path/host fragments that mark a URL as an image without an extension.
const IMAGE_HINTS: &[&str] = &["image", "icon", "logo", "assets/images"];

// ---------------------------------------------------------------------------
// UrlRuleSet
// ---------------------------------------------------------------------------

/// Compiled URL-matching rules and image heuristics.
#[derive(Debug, Clone)]
pub struct UrlRuleSet {
    patterns: Vec<Regex>,
    image_extensions: Vec<String>,
}

impl UrlRuleSet {
    /// The built-in source-CDN rules with default image extensions.
    pub fn builtin() -> Self {
        let patterns = BUILTIN_HOSTS
            .iter()
            .map(|host| {
                Regex::new(&format!(r"(?i)https://{host}/{URL_TAIL}")).expect("valid regex")
            })
            .collect();

        Self {
            patterns,
            image_extensions: AssetSettings::default().image_extensions,
        }
    }

    /// Built-in rules extended with the configured extra patterns and extensions.
    ///
    /// Extra patterns match a whole URL and are compiled case-insensitively.
    pub fn from_settings(settings: &AssetSettings) -> Result<Self> {
        let mut rules = Self::builtin();
        rules.image_extensions = settings
            .image_extensions
            .iter()
            .map(|e| e.to_ascii_lowercase())
            .collect();

        for pattern in &settings.extra_domain_patterns {
            rules = rules.with_pattern(pattern)?;
        }
        Ok(rules)
    }

    /// Append one whole-URL pattern.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self> {
        let re = Regex::new(&format!("(?i){pattern}")).map_err(|e| {
            MigratorError::config(format!("invalid asset domain pattern '{pattern}': {e}"))
        })?;
        self.patterns.push(re);
        Ok(self)
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Find distinct candidate image URLs in `text`, in first-seen order.
    ///
    /// Matching is literal: URLs differing only in case or query string are
    /// distinct candidates.
    pub fn extract(&self, text: &str) -> Vec<String> {
        let decoded = decode_escapes(text);

        let mut matches: Vec<(usize, String)> = Vec::new();
        for pattern in &self.patterns {
            for m in pattern.find_iter(&decoded) {
                let url = m.as_str().trim_matches(|c| c == '\'' || c == '"');
                matches.push((m.start(), url.to_string()));
            }
        }
        matches.sort_by_key(|(pos, _)| *pos);

        let mut seen = HashSet::new();
        matches
            .into_iter()
            .map(|(_, url)| url)
            .filter(|url| !url.is_empty() && seen.insert(url.clone()))
            .filter(|url| self.is_image_candidate(url))
            .collect()
    }

    /// Whether `url` plausibly references an image.
    pub fn is_image_candidate(&self, url: &str) -> bool {
        let lower = url.to_ascii_lowercase();
        self.image_extensions.iter().any(|ext| lower.contains(ext.as_str()))
            || IMAGE_HINTS.iter().any(|hint| lower.contains(hint))
            || !lower.ends_with('/')
    }
}

impl Default for UrlRuleSet {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Escape decoding
// ---------------------------------------------------------------------------

/// Decode JSON-style `\uXXXX` and `\/` escapes, then HTML entities.
pub fn decode_escapes(text: &str) -> String {
    decode_html_entities(&decode_backslash_escapes(text))
}

fn decode_backslash_escapes(text: &str) -> String {
    static ESCAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"\\u([0-9a-fA-F]{4})|\\/").expect("valid regex")
    });

    ESCAPE_RE
        .replace_all(text, |caps: &Captures| match caps.get(1) {
            Some(hex) => u32::from_str_radix(hex.as_str(), 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string()),
            None => "/".to_string(),
        })
        .into_owned()
}

fn decode_html_entities(text: &str) -> String {
    static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"&(?:#(\d{1,7})|#[xX]([0-9a-fA-F]{1,6})|(amp|lt|gt|quot|apos|nbsp));")
            .expect("valid regex")
    });

    ENTITY_RE
        .replace_all(text, |caps: &Captures| {
            let decoded = if let Some(dec) = caps.get(1) {
                dec.as_str().parse::<u32>().ok().and_then(char::from_u32)
            } else if let Some(hex) = caps.get(2) {
                u32::from_str_radix(hex.as_str(), 16).ok().and_then(char::from_u32)
            } else {
                match caps.get(3).map(|m| m.as_str()) {
                    Some("amp") => Some('&'),
                    Some("lt") => Some('<'),
                    Some("gt") => Some('>'),
                    Some("quot") => Some('"'),
                    Some("apos") => Some('\''),
                    Some("nbsp") => Some('\u{a0}'),
                    _ => None,
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Whether a URL may end right before `rest`: end of text, or a character
/// [`URL_TAIL`] excludes (possibly spelled as an HTML entity).
pub(crate) fn ends_url(rest: &str) -> bool {
    let head = if rest.starts_with('&') {
        decode_html_entities(&rest.chars().take(12).collect::<String>())
    } else {
        rest.chars().take(1).collect()
    };
    head.chars().next().is_none_or(is_url_terminator)
}

fn is_url_terminator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '<' | '>' | '(' | ')' | '\\')
}

/// The encoded spellings a decoded URL may take in the original text.
pub(crate) fn surface_forms(url: &str) -> Vec<String> {
    let html = url.replace('&', "&amp;");
    let mut forms = vec![url.to_string()];
    for form in [url.replace('/', "\\/"), html.replace('/', "\\/"), html] {
        if !forms.contains(&form) {
            forms.push(form);
        }
    }
    forms
}
