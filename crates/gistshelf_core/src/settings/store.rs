//! Device-local settings document persisted as JSON.

use super::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::models::gist::Gist;
use crate::models::settings::{RecentGist, SavedSearch, SettingsDocument, SettingsPatch};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The full settings document of this device.
///
/// Mutators stamp `last_modified` and return the [`SettingsPatch`] describing
/// the change, ready for [`SettingsSync::save_settings`]. They do not write
/// the file; call [`LocalSettings::save`] for that.
///
/// [`SettingsSync::save_settings`]: super::SettingsSync::save_settings
pub struct LocalSettings {
    path: PathBuf,
    document: SettingsDocument,
    clock: Arc<dyn Clock>,
}

impl LocalSettings {
    /// Read the document at `path`.
    ///
    /// A missing file yields the defaults. So does an unparsable one, with a
    /// warning; the broken file is overwritten on the next save.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        let document = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(document) => document,
                Err(err) => {
                    warn!(path = %path.display(), "unreadable settings file, using defaults: {}", err);
                    SettingsDocument::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file yet");
                SettingsDocument::default()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            document,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// Write the document as pretty JSON, creating parent directories.
    ///
    /// # Errors
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(&self.document)?;
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    fn stamp(&mut self) -> i64 {
        let now = self.clock.now_millis();
        self.document.last_modified = now;
        now
    }

    fn patch(&self, fill: impl FnOnce(&mut SettingsPatch)) -> SettingsPatch {
        let mut patch = SettingsPatch {
            last_modified: Some(self.document.last_modified),
            ..SettingsPatch::default()
        };
        fill(&mut patch);
        patch
    }

    /// Put `gist` at the front of the recently opened list.
    pub fn track_recent(&mut self, gist: &Gist) -> SettingsPatch {
        let viewed_at = self.stamp();
        self.document.track_recent(RecentGist {
            id: gist.id.clone(),
            description: gist.description.clone(),
            viewed_at,
        });
        self.patch(|patch| patch.recent_gists = Some(self.document.recent_gists.clone()))
    }

    /// Drop a deleted gist from the recent list; `None` when it was not listed.
    pub fn forget_recent(&mut self, gist_id: &str) -> Option<SettingsPatch> {
        if !self.document.forget_recent(gist_id) {
            return None;
        }
        self.stamp();
        Some(self.patch(|patch| patch.recent_gists = Some(self.document.recent_gists.clone())))
    }

    /// `None` when the tag was already pinned.
    pub fn pin_tag(&mut self, tag: &str) -> Option<SettingsPatch> {
        if !self.document.pin_tag(tag) {
            return None;
        }
        Some(self.pinned_patch())
    }

    /// `None` when the tag was not pinned.
    pub fn unpin_tag(&mut self, tag: &str) -> Option<SettingsPatch> {
        if !self.document.unpin_tag(tag) {
            return None;
        }
        Some(self.pinned_patch())
    }

    pub fn move_pinned_tag(&mut self, from: usize, to: usize) -> Option<SettingsPatch> {
        if !self.document.move_pinned_tag(from, to) {
            return None;
        }
        Some(self.pinned_patch())
    }

    fn pinned_patch(&mut self) -> SettingsPatch {
        self.stamp();
        self.patch(|patch| patch.pinned_tags = Some(self.document.pinned_tags.clone()))
    }

    /// Select (or clear, with `None`) the sidebar tag.
    pub fn set_active_tag(&mut self, tag: Option<&str>) -> SettingsPatch {
        self.document.active_tag = tag.map(str::to_string);
        self.stamp();
        self.patch(|patch| patch.active_tag = Some(self.document.active_tag.clone()))
    }

    /// Save a named query.
    ///
    /// # Returns
    /// The new entry's id and the patch.
    pub fn add_saved_search(&mut self, name: &str, query: &str) -> (String, SettingsPatch) {
        let created_at = self.stamp();
        let id = uuid::Uuid::new_v4().to_string();
        self.document.saved_searches.push(SavedSearch {
            id: id.clone(),
            query: query.to_string(),
            name: name.to_string(),
            created_at,
        });
        let patch =
            self.patch(|patch| patch.saved_searches = Some(self.document.saved_searches.clone()));
        (id, patch)
    }

    /// `None` when no saved search has that id.
    pub fn remove_saved_search(&mut self, id: &str) -> Option<SettingsPatch> {
        let before = self.document.saved_searches.len();
        self.document.saved_searches.retain(|search| search.id != id);
        if before == self.document.saved_searches.len() {
            return None;
        }
        self.stamp();
        Some(self.patch(|patch| patch.saved_searches = Some(self.document.saved_searches.clone())))
    }

    /// Adopt a whole document, typically the result of a pull.
    pub fn replace(&mut self, document: SettingsDocument) {
        self.document = document;
    }
}
