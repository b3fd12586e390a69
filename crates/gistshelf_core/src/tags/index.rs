//! Inverted tag → gist id index.

use super::is_language_tag;
use crate::models::gist::Gist;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// A tag and the number of gists carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Maps every tag to the ids of the gists carrying it.
///
/// Empty id sets are never kept.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from scratch using each gist's derived tags.
    pub fn from_gists<'a>(gists: impl IntoIterator<Item = &'a Gist>) -> Self {
        let mut index = Self::new();
        index.rebuild(gists);
        index
    }

    /// Drop every entry and re-index `gists`.
    pub fn rebuild<'a>(&mut self, gists: impl IntoIterator<Item = &'a Gist>) {
        self.entries.clear();
        for gist in gists {
            self.add_gist(gist);
        }
    }

    /// Register `id` under every tag in `tags`.
    pub fn add<'a>(&mut self, id: &str, tags: impl IntoIterator<Item = &'a str>) {
        for tag in tags {
            self.entries
                .entry(tag.to_string())
                .or_default()
                .insert(id.to_string());
        }
    }

    pub fn add_gist(&mut self, gist: &Gist) {
        self.add(&gist.id, gist.tags.all());
    }

    /// Remove `id` from every tag and prune tags left without ids.
    ///
    /// # Returns
    /// Number of tags the id was removed from.
    pub fn remove(&mut self, id: &str) -> usize {
        let mut touched = 0;
        self.entries.retain(|_, ids| {
            if ids.remove(id) {
                touched += 1;
            }
            !ids.is_empty()
        });
        touched
    }

    /// Re-register a gist whose tags may have changed.
    pub fn replace_gist(&mut self, gist: &Gist) {
        self.remove(&gist.id);
        self.add_gist(gist);
    }

    pub fn ids_for(&self, tag: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(tag)
    }

    pub fn contains(&self, tag: &str, id: &str) -> bool {
        self.entries
            .get(tag)
            .map(|ids| ids.contains(id))
            .unwrap_or(false)
    }

    /// Ids carrying every tag in `tags`. An empty filter matches nothing.
    pub fn ids_with_all<S: AsRef<str>>(&self, tags: &[S]) -> BTreeSet<String> {
        let mut sets = tags.iter().map(|tag| self.entries.get(tag.as_ref()));
        let Some(Some(first)) = sets.next() else {
            return BTreeSet::new();
        };
        let mut result = first.clone();
        for set in sets {
            match set {
                Some(ids) => result.retain(|id| ids.contains(id)),
                None => return BTreeSet::new(),
            }
        }
        result
    }

    /// Every tag with its gist count, sorted by tag.
    pub fn tags(&self) -> Vec<TagCount> {
        self.collect_counts(|_| true)
    }

    pub fn language_tags(&self) -> Vec<TagCount> {
        self.collect_counts(is_language_tag)
    }

    pub fn custom_tags(&self) -> Vec<TagCount> {
        self.collect_counts(|tag| !is_language_tag(tag))
    }

    fn collect_counts(&self, keep: impl Fn(&str) -> bool) -> Vec<TagCount> {
        self.entries
            .iter()
            .filter(|(tag, _)| keep(tag))
            .map(|(tag, ids)| TagCount {
                tag: tag.clone(),
                count: ids.len(),
            })
            .collect()
    }

    /// Number of distinct tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
