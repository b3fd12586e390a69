//! Hybrid fuzzy/regex search over cached gists.
//!
//! Every gist is flattened into one [`SearchableUnit`] per file (one empty
//! unit for a gist without files). Units are kept ordered by recency, so an
//! index patched through [`SearchIndex::add`], [`SearchIndex::update`] and
//! [`SearchIndex::remove`] is identical to one built from the same gists with
//! [`SearchIndex::build`].

mod fuzzy;
mod query;

pub use fuzzy::{max_errors, substring_edit_distance, Field};
pub use query::{as_regex_literal, RegexLiteral, RegexQueryError};

use crate::constants::MIN_FUZZY_QUERY_CHARS;
use crate::models::gist::{FileContent, Gist};
use fuzzy::{FuzzyEngine, PreparedUnit};
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// One searchable (gist, file) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchableUnit {
    pub gist_id: String,
    pub description: String,
    /// Empty when the file has no language label (or the gist has no files).
    pub language: String,
    /// Empty for the placeholder unit of a gist without files.
    pub filename: String,
    /// Present only once the file body was fetched.
    pub content: Option<String>,
}

/// Flatten a gist into its searchable units.
pub fn units_for(gist: &Gist) -> Vec<SearchableUnit> {
    if gist.files.is_empty() {
        return vec![SearchableUnit {
            gist_id: gist.id.clone(),
            description: gist.description.clone(),
            language: String::new(),
            filename: String::new(),
            content: None,
        }];
    }
    gist.files
        .values()
        .map(|file| SearchableUnit {
            gist_id: gist.id.clone(),
            description: gist.description.clone(),
            language: file.language.clone().unwrap_or_default(),
            filename: file.filename.clone(),
            content: file.content.as_loaded().map(str::to_string),
        })
        .collect()
}

/// Newest first, ties broken by id.
type RecencyKey = (u64, String);

fn recency_key(gist: &Gist) -> RecencyKey {
    // Pre-epoch timestamps clamp to zero instead of wrapping.
    let millis = gist.updated_at.timestamp_millis().max(0) as u64;
    (u64::MAX.saturating_sub(millis), gist.id.clone())
}

#[derive(Debug, Clone)]
struct IndexedGist {
    gist: Gist,
    units: Vec<SearchableUnit>,
}

/// Searchable projection of the gist cache.
#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    entries: BTreeMap<RecencyKey, IndexedGist>,
    keys: HashMap<String, RecencyKey>,
    engine: FuzzyEngine,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from scratch.
    pub fn build<'a>(gists: impl IntoIterator<Item = &'a Gist>) -> Self {
        let mut index = Self::new();
        for gist in gists {
            index.insert_entry(gist);
        }
        index.rebuild_engine();
        index
    }

    /// Add a gist. An existing entry with the same id is replaced.
    pub fn add(&mut self, gist: &Gist) {
        self.update(gist);
    }

    /// Replace every unit of a gist with units built from its new state.
    pub fn update(&mut self, gist: &Gist) {
        self.remove_entry(&gist.id);
        self.insert_entry(gist);
        self.rebuild_engine();
    }

    /// Drop every unit of `id`.
    ///
    /// # Returns
    /// `true` when the id was indexed.
    pub fn remove(&mut self, id: &str) -> bool {
        let removed = self.remove_entry(id);
        if removed {
            self.rebuild_engine();
        }
        removed
    }

    fn insert_entry(&mut self, gist: &Gist) {
        let key = recency_key(gist);
        self.keys.insert(gist.id.clone(), key.clone());
        self.entries.insert(
            key,
            IndexedGist {
                gist: gist.clone(),
                units: units_for(gist),
            },
        );
    }

    fn remove_entry(&mut self, id: &str) -> bool {
        match self.keys.remove(id) {
            Some(key) => self.entries.remove(&key).is_some(),
            None => false,
        }
    }

    fn rebuild_engine(&mut self) {
        let prepared = self
            .entries
            .values()
            .flat_map(|entry| entry.units.iter())
            .map(|unit| {
                PreparedUnit::new(
                    &unit.gist_id,
                    &unit.gist_id,
                    &unit.description,
                    &unit.language,
                    &unit.filename,
                )
            })
            .collect();
        self.engine = FuzzyEngine::new(prepared);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }

    pub fn gist(&self, id: &str) -> Option<&Gist> {
        self.keys
            .get(id)
            .and_then(|key| self.entries.get(key))
            .map(|entry| &entry.gist)
    }

    /// Number of indexed gists.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of searchable units across every gist.
    pub fn unit_count(&self) -> usize {
        self.engine.len()
    }

    /// Units in index order.
    pub fn units(&self) -> impl Iterator<Item = &SearchableUnit> {
        self.entries.values().flat_map(|entry| entry.units.iter())
    }

    /// Run a query.
    ///
    /// `/pattern/flags` queries are regex scans; a literal that fails to
    /// compile is logged and searched fuzzily as raw text instead. Any other
    /// query is fuzzy, and fuzzy queries shorter than two characters match
    /// nothing.
    ///
    /// # Returns
    /// Matching gists, each at most once.
    pub fn search(&self, query: &str) -> Vec<Gist> {
        if let Some(literal) = as_regex_literal(query) {
            match literal.compile() {
                Ok(regex) => return self.search_regex(&regex),
                Err(err) => {
                    warn!(query = query, error = %err, "invalid regex query; using fuzzy search");
                }
            }
        }
        self.search_fuzzy(query)
    }

    /// Scan gists in index order, keeping those where any searchable field
    /// (or loaded file content) matches.
    pub fn search_regex(&self, regex: &Regex) -> Vec<Gist> {
        self.entries
            .values()
            .filter(|entry| gist_matches_regex(&entry.gist, regex))
            .map(|entry| entry.gist.clone())
            .collect()
    }

    /// Fuzzy search in relevance order.
    pub fn search_fuzzy(&self, query: &str) -> Vec<Gist> {
        let query = query.trim();
        if query.chars().count() < MIN_FUZZY_QUERY_CHARS {
            return Vec::new();
        }
        let mut seen = HashSet::new();
        let mut results = Vec::new();
        for (gist_id, _) in self.engine.search(query) {
            if !seen.insert(gist_id) {
                continue;
            }
            if let Some(gist) = self.gist(gist_id) {
                results.push(gist.clone());
            }
        }
        debug!(query = query, hits = results.len(), "fuzzy search");
        results
    }
}

fn gist_matches_regex(gist: &Gist, regex: &Regex) -> bool {
    if regex.is_match(&gist.description) || regex.is_match(&gist.id) {
        return true;
    }
    gist.files.values().any(|file| {
        regex.is_match(&file.filename)
            || file
                .language
                .as_deref()
                .map(|language| regex.is_match(language))
                .unwrap_or(false)
            || match &file.content {
                FileContent::Loaded(text) => regex.is_match(text),
                FileContent::Unloaded => false,
            }
    })
}

#[cfg(test)]
mod tests;
