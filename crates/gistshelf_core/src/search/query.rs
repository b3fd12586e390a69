//! Query classification: `/pattern/flags` regex literals vs fuzzy text.

use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

fn literal_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^/(.+)/([a-zA-Z]*)$").expect("regex literal pattern"))
}

/// A query split into its regex literal parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexLiteral<'a> {
    pub pattern: &'a str,
    pub flags: &'a str,
}

/// Return the regex literal parts when `query` has the form `/pattern/flags`.
pub fn as_regex_literal(query: &str) -> Option<RegexLiteral<'_>> {
    let caps = literal_regex().captures(query)?;
    Some(RegexLiteral {
        pattern: caps.get(1)?.as_str(),
        flags: caps.get(2).map_or("", |m| m.as_str()),
    })
}

/// Failure to turn a regex literal into a matcher.
#[derive(Debug, thiserror::Error)]
pub enum RegexQueryError {
    #[error("unsupported regex flag '{0}'")]
    UnsupportedFlag(char),
    #[error(transparent)]
    Pattern(#[from] regex::Error),
}

impl RegexLiteral<'_> {
    /// Compile the pattern with its flags.
    ///
    /// `i`, `m`, `s` and `x` map onto the builder; `g`, `y` and `u` carry no
    /// meaning for a boolean match and are accepted as no-ops.
    pub fn compile(&self) -> Result<Regex, RegexQueryError> {
        let mut builder = RegexBuilder::new(self.pattern);
        for flag in self.flags.chars() {
            match flag {
                'i' => {
                    builder.case_insensitive(true);
                }
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                'g' | 'y' | 'u' => {}
                other => return Err(RegexQueryError::UnsupportedFlag(other)),
            }
        }
        Ok(builder.build()?)
    }
}
