//! Tag derivation from gist descriptions and files.
//!
//! Descriptions may carry a bracketed title and tags in one of two styles:
//! a trailing legacy clause (`#tags: a, b`) or inline hashtags (`#a #b`).
//! Only the first style found is honored. Language tags come from file
//! language labels and share the index with custom tags under the `lang@`
//! prefix.

mod index;

pub use index::{TagCount, TagIndex};

use crate::constants::{FALLBACK_LANGUAGE_TAG, LANGUAGE_TAG_PREFIX, LEGACY_TAG_MARKER};
use crate::models::gist::{DerivedTags, Gist};
use crate::text::collapse_whitespace;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Which tag syntax a description used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStyle {
    /// Trailing `#tags:` clause with comma-separated values.
    Legacy,
    /// Inline `#hashtag` tokens.
    Twitter,
}

impl TagStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Twitter => "twitter",
        }
    }
}

impl fmt::Display for TagStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of splitting a raw description into title, text, and tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedDescription {
    pub title: Option<String>,
    /// Description with the title and tag syntax removed.
    pub description: String,
    pub tags: Vec<String>,
    pub style: TagStyle,
}

fn title_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // First closing bracket ends the title, so `[a [b] c]` yields `a [b`.
    RE.get_or_init(|| Regex::new(r"^\s*\[([^\]]*)\]").expect("title regex"))
}

fn hashtag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)(#(\w+))").expect("hashtag regex"))
}

fn push_unique(tags: &mut Vec<String>, tag: &str) {
    if !tag.is_empty() && !tags.iter().any(|existing| existing == tag) {
        tags.push(tag.to_string());
    }
}

fn is_tag_separator(c: char) -> bool {
    matches!(c, ',' | '，' | '、')
}

fn split_title(raw: &str) -> (Option<String>, &str) {
    match title_regex().captures(raw) {
        Some(caps) => {
            let whole = caps.get(0).map_or(0, |m| m.end());
            let title = caps
                .get(1)
                .map(|m| m.as_str().trim().to_string())
                .filter(|title| !title.is_empty());
            (title, &raw[whole..])
        }
        None => (None, raw),
    }
}

fn find_legacy_clause(body: &str) -> Option<usize> {
    // ASCII lowercasing keeps byte offsets stable.
    body.to_ascii_lowercase().find(LEGACY_TAG_MARKER)
}

/// Parse a raw gist description.
///
/// # Returns
/// Title, cleaned description, deduplicated tags, and the tag style that was
/// honored. Descriptions without any tag syntax report [`TagStyle::Twitter`]
/// with an empty tag list.
pub fn parse_description(raw: &str) -> ParsedDescription {
    let (title, body) = split_title(raw);

    if let Some(marker_at) = find_legacy_clause(body) {
        let clause = &body[marker_at + LEGACY_TAG_MARKER.len()..];
        let mut tags = Vec::new();
        for value in clause.split(is_tag_separator) {
            push_unique(&mut tags, value.trim());
        }
        return ParsedDescription {
            title,
            description: collapse_whitespace(&body[..marker_at]),
            tags,
            style: TagStyle::Legacy,
        };
    }

    let mut tags = Vec::new();
    let mut cleaned = String::with_capacity(body.len());
    let mut cursor = 0;
    for caps in hashtag_regex().captures_iter(body) {
        let (Some(token), Some(name)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        cleaned.push_str(&body[cursor..token.start()]);
        cursor = token.end();
        push_unique(&mut tags, name.as_str());
    }
    cleaned.push_str(&body[cursor..]);

    ParsedDescription {
        title,
        description: collapse_whitespace(&cleaned),
        tags,
        style: TagStyle::Twitter,
    }
}

/// Return `true` for tags derived from a file language.
pub fn is_language_tag(tag: &str) -> bool {
    tag.starts_with(LANGUAGE_TAG_PREFIX)
}

/// Strip the `lang@` prefix from a language tag.
pub fn language_of_tag(tag: &str) -> Option<&str> {
    tag.strip_prefix(LANGUAGE_TAG_PREFIX)
}

/// Build the `lang@<Label>` tags for a gist.
///
/// Labels keep their original case. A gist with no labelled file gets the
/// single fallback tag `lang@Other`.
pub fn language_tags(gist: &Gist) -> Vec<String> {
    let mut tags = Vec::new();
    for label in gist.languages() {
        push_unique(&mut tags, &format!("{}{}", LANGUAGE_TAG_PREFIX, label));
    }
    if tags.is_empty() {
        tags.push(FALLBACK_LANGUAGE_TAG.to_string());
    }
    tags
}

/// Derive the language and custom tags of a gist.
pub fn derive_tags(gist: &Gist) -> DerivedTags {
    DerivedTags {
        language: language_tags(gist),
        custom: parse_description(&gist.description).tags,
    }
}

/// Recompute and store the derived tags on `gist`.
pub fn apply_derived_tags(gist: &mut Gist) {
    gist.tags = derive_tags(gist);
}
