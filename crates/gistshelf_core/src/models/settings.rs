//! Synced settings document and partial updates.
//!
//! The document is stored upstream as camelCase JSON. Keys this version does
//! not know about are kept in `extra` so that a round trip through an older
//! client does not erase them.

use crate::constants::MAX_RECENT_GISTS;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Entry in the recently opened gists list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentGist {
    pub id: String,
    #[serde(default)]
    pub description: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub viewed_at: i64,
}

/// A named search query the user saved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedSearch {
    pub id: String,
    pub query: String,
    pub name: String,
    /// Epoch milliseconds.
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorPreferences {
    pub font_size: u16,
    pub tab_size: u8,
    pub word_wrap: bool,
    pub line_numbers: bool,
}

impl Default for EditorPreferences {
    fn default() -> Self {
        Self {
            font_size: 14,
            tab_size: 2,
            word_wrap: true,
            line_numbers: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppearancePreferences {
    /// `system`, `light`, or `dark`.
    pub theme: String,
    pub sidebar_width: u32,
    pub compact_list: bool,
}

impl Default for AppearancePreferences {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            sidebar_width: 280,
            compact_list: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListPreferences {
    /// `updated`, `created`, or `description`.
    pub sort_by: String,
    pub sort_descending: bool,
    pub show_secret: bool,
}

impl Default for ListPreferences {
    fn default() -> Self {
        Self {
            sort_by: "updated".to_string(),
            sort_descending: true,
            show_secret: true,
        }
    }
}

/// Preferences replicated across devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsDocument {
    /// Epoch milliseconds of the last local change.
    pub last_modified: i64,
    /// Pinned tags in the user's manual order.
    pub pinned_tags: Vec<String>,
    /// Tag currently selected in the sidebar.
    pub active_tag: Option<String>,
    /// Most recent first, at most [`MAX_RECENT_GISTS`] entries.
    pub recent_gists: Vec<RecentGist>,
    pub saved_searches: Vec<SavedSearch>,
    pub editor: EditorPreferences,
    pub appearance: AppearancePreferences,
    pub list: ListPreferences,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SettingsDocument {
    /// Move `entry` to the front of the recent list, dropping any older entry
    /// for the same id and truncating to [`MAX_RECENT_GISTS`].
    pub fn track_recent(&mut self, entry: RecentGist) {
        self.recent_gists.retain(|existing| existing.id != entry.id);
        self.recent_gists.insert(0, entry);
        self.recent_gists.truncate(MAX_RECENT_GISTS);
    }

    /// Drop a gist from the recent list, e.g. after it was deleted.
    pub fn forget_recent(&mut self, gist_id: &str) -> bool {
        let before = self.recent_gists.len();
        self.recent_gists.retain(|existing| existing.id != gist_id);
        before != self.recent_gists.len()
    }

    /// Append `tag` to the pinned list unless it is already pinned.
    pub fn pin_tag(&mut self, tag: &str) -> bool {
        if self.pinned_tags.iter().any(|pinned| pinned == tag) {
            return false;
        }
        self.pinned_tags.push(tag.to_string());
        true
    }

    pub fn unpin_tag(&mut self, tag: &str) -> bool {
        let before = self.pinned_tags.len();
        self.pinned_tags.retain(|pinned| pinned != tag);
        before != self.pinned_tags.len()
    }

    /// Move the pinned tag at `from` to position `to` (clamped to the end).
    pub fn move_pinned_tag(&mut self, from: usize, to: usize) -> bool {
        if from >= self.pinned_tags.len() {
            return false;
        }
        let tag = self.pinned_tags.remove(from);
        let to = to.min(self.pinned_tags.len());
        self.pinned_tags.insert(to, tag);
        from != to
    }
}

/// Partial settings update; `None` fields are left untouched.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SettingsPatch {
    pub last_modified: Option<i64>,
    pub pinned_tags: Option<Vec<String>>,
    /// `Some(None)` clears the active tag.
    pub active_tag: Option<Option<String>>,
    pub recent_gists: Option<Vec<RecentGist>>,
    pub saved_searches: Option<Vec<SavedSearch>>,
    pub editor: Option<EditorPreferences>,
    pub appearance: Option<AppearancePreferences>,
    pub list: Option<ListPreferences>,
    pub extra: Map<String, Value>,
}

fn overwrite<T>(target: &mut Option<T>, newer: Option<T>) {
    if newer.is_some() {
        *target = newer;
    }
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.last_modified.is_none()
            && self.pinned_tags.is_none()
            && self.active_tag.is_none()
            && self.recent_gists.is_none()
            && self.saved_searches.is_none()
            && self.editor.is_none()
            && self.appearance.is_none()
            && self.list.is_none()
            && self.extra.is_empty()
    }

    /// Fold a newer patch into this one; fields set in `newer` win.
    pub fn merge(&mut self, newer: SettingsPatch) {
        overwrite(&mut self.last_modified, newer.last_modified);
        overwrite(&mut self.pinned_tags, newer.pinned_tags);
        overwrite(&mut self.active_tag, newer.active_tag);
        overwrite(&mut self.recent_gists, newer.recent_gists);
        overwrite(&mut self.saved_searches, newer.saved_searches);
        overwrite(&mut self.editor, newer.editor);
        overwrite(&mut self.appearance, newer.appearance);
        overwrite(&mut self.list, newer.list);
        self.extra.extend(newer.extra);
    }

    /// Shallow-overlay every set field onto `doc`.
    pub fn apply_to(&self, doc: &mut SettingsDocument) {
        if let Some(value) = self.last_modified {
            doc.last_modified = value;
        }
        if let Some(value) = &self.pinned_tags {
            doc.pinned_tags = value.clone();
        }
        if let Some(value) = &self.active_tag {
            doc.active_tag = value.clone();
        }
        if let Some(value) = &self.recent_gists {
            doc.recent_gists = value.clone();
            doc.recent_gists.truncate(MAX_RECENT_GISTS);
        }
        if let Some(value) = &self.saved_searches {
            doc.saved_searches = value.clone();
        }
        if let Some(value) = &self.editor {
            doc.editor = value.clone();
        }
        if let Some(value) = &self.appearance {
            doc.appearance = value.clone();
        }
        if let Some(value) = &self.list {
            doc.list = value.clone();
        }
        for (key, value) in &self.extra {
            doc.extra.insert(key.clone(), value.clone());
        }
    }
}

impl From<&SettingsDocument> for SettingsPatch {
    fn from(doc: &SettingsDocument) -> Self {
        Self {
            last_modified: Some(doc.last_modified),
            pinned_tags: Some(doc.pinned_tags.clone()),
            active_tag: Some(doc.active_tag.clone()),
            recent_gists: Some(doc.recent_gists.clone()),
            saved_searches: Some(doc.saved_searches.clone()),
            editor: Some(doc.editor.clone()),
            appearance: Some(doc.appearance.clone()),
            list: Some(doc.list.clone()),
            extra: doc.extra.clone(),
        }
    }
}
