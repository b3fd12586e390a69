//! Weighted approximate-substring matching over searchable units.

use crate::constants::FUZZY_THRESHOLD;

/// Fields scored by the fuzzy engine, with their relevance weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Id,
    Description,
    Language,
    Filename,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::Id,
        Field::Description,
        Field::Language,
        Field::Filename,
    ];

    pub fn weight(self) -> f64 {
        match self {
            Self::Id => 0.3,
            Self::Description => 0.4,
            Self::Language => 0.2,
            Self::Filename => 0.1,
        }
    }
}

/// Lowercased character buffers for one unit, ready for matching.
#[derive(Debug, Clone)]
pub(crate) struct PreparedUnit {
    pub(crate) gist_id: String,
    fields: [Vec<char>; 4],
}

impl PreparedUnit {
    pub(crate) fn new(
        gist_id: &str,
        id: &str,
        description: &str,
        language: &str,
        filename: &str,
    ) -> Self {
        Self {
            gist_id: gist_id.to_string(),
            fields: [
                lowercase_chars(id),
                lowercase_chars(description),
                lowercase_chars(language),
                lowercase_chars(filename),
            ],
        }
    }

    fn field(&self, field: Field) -> &[char] {
        match field {
            Field::Id => &self.fields[0],
            Field::Description => &self.fields[1],
            Field::Language => &self.fields[2],
            Field::Filename => &self.fields[3],
        }
    }
}

fn lowercase_chars(value: &str) -> Vec<char> {
    value.chars().flat_map(char::to_lowercase).collect()
}

/// Smallest edit distance between `pattern` and any substring of `text`.
///
/// Insertions before and after the matched window are free, so the match is
/// location-agnostic.
pub fn substring_edit_distance(pattern: &[char], text: &[char]) -> usize {
    if pattern.is_empty() {
        return 0;
    }
    if text.is_empty() {
        return pattern.len();
    }
    // column[i] = cost of matching pattern[..i] ending at the current text position.
    let mut column: Vec<usize> = (0..=pattern.len()).collect();
    let mut best = pattern.len();
    for &t in text {
        let mut diagonal = column[0];
        column[0] = 0;
        for (i, &p) in pattern.iter().enumerate() {
            let substitution = diagonal + usize::from(p != t);
            let deletion = column[i + 1] + 1;
            let insertion = column[i] + 1;
            diagonal = column[i + 1];
            column[i + 1] = substitution.min(deletion).min(insertion);
        }
        best = best.min(column[pattern.len()]);
        if best == 0 {
            break;
        }
    }
    best
}

/// Largest edit distance still accepted for a query of `pattern_len` chars.
pub fn max_errors(pattern_len: usize) -> usize {
    (pattern_len as f64 * FUZZY_THRESHOLD).floor() as usize
}

/// Flattened fuzzy index over every searchable unit.
#[derive(Debug, Clone, Default)]
pub(crate) struct FuzzyEngine {
    units: Vec<PreparedUnit>,
}

impl FuzzyEngine {
    pub(crate) fn new(units: Vec<PreparedUnit>) -> Self {
        Self { units }
    }

    pub(crate) fn len(&self) -> usize {
        self.units.len()
    }

    /// Score every unit against `query`.
    ///
    /// # Returns
    /// Matching units as `(gist_id, relevance)`, most relevant first. Equal
    /// relevance keeps index order.
    pub(crate) fn search(&self, query: &str) -> Vec<(&str, f64)> {
        let pattern = lowercase_chars(query.trim());
        if pattern.is_empty() {
            return Vec::new();
        }
        let allowed = max_errors(pattern.len());
        let mut hits: Vec<(&str, f64)> = Vec::new();
        for unit in &self.units {
            let mut relevance = 0.0;
            let mut matched = false;
            for field in Field::ALL {
                let errors = substring_edit_distance(&pattern, unit.field(field));
                if errors <= allowed {
                    matched = true;
                    relevance += field.weight() * (1.0 - errors as f64 / pattern.len() as f64);
                }
            }
            if matched {
                hits.push((unit.gist_id.as_str(), relevance));
            }
        }
        hits.sort_by(|a, b| b.1.total_cmp(&a.1));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(value: &str) -> Vec<char> {
        value.chars().collect()
    }

    #[test]
    fn substring_edit_distance_is_zero_for_exact_substrings() {
        assert_eq!(substring_edit_distance(&chars("ell"), &chars("hello")), 0);
        assert_eq!(substring_edit_distance(&chars(""), &chars("x")), 0);
        assert_eq!(substring_edit_distance(&chars("abc"), &chars("")), 3);
    }

    #[test]
    fn substring_edit_distance_counts_typos_anywhere() {
        assert_eq!(
            substring_edit_distance(&chars("dockr"), &chars("my docker compose")),
            1
        );
        assert_eq!(
            substring_edit_distance(&chars("kubernetes"), &chars("notes on kubernetis")),
            1
        );
        assert_eq!(substring_edit_distance(&chars("xyz"), &chars("abc")), 3);
    }

    #[test]
    fn max_errors_tolerates_about_a_fifth_of_the_query() {
        assert_eq!(max_errors(2), 0);
        assert_eq!(max_errors(4), 0);
        assert_eq!(max_errors(5), 1);
        assert_eq!(max_errors(10), 2);
    }

    #[test]
    fn engine_ranks_weighted_fields() {
        let engine = FuzzyEngine::new(vec![
            PreparedUnit::new("file-hit", "file-hit", "unrelated", "", "parser.rs"),
            PreparedUnit::new("desc-hit", "desc-hit", "a parser for toml", "", "x.txt"),
        ]);
        let hits = engine.search("parser");
        let ids: Vec<&str> = hits.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec!["desc-hit", "file-hit"]);
        assert!(engine.search("   ").is_empty());
        assert_eq!(engine.len(), 2);
    }
}
