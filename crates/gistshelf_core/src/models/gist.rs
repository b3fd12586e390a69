//! Gist and file models as held by the local cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Who can see a gist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Secret,
}

impl Visibility {
    /// Map the remote `public` flag onto a visibility.
    pub fn from_public(public: bool) -> Self {
        if public {
            Self::Public
        } else {
            Self::Secret
        }
    }

    pub fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Owner reference attached to a gist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    pub avatar_url: Option<String>,
}

/// File body, which list responses never carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", content = "text", rename_all = "lowercase")]
pub enum FileContent {
    #[default]
    Unloaded,
    Loaded(String),
}

impl FileContent {
    /// Return the loaded text, if any.
    pub fn as_loaded(&self) -> Option<&str> {
        match self {
            Self::Loaded(text) => Some(text.as_str()),
            Self::Unloaded => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// One named file inside a gist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GistFile {
    pub filename: String,
    pub language: Option<String>,
    pub size: u64,
    pub raw_url: Option<String>,
    #[serde(default)]
    pub content: FileContent,
}

impl GistFile {
    /// Build a file whose content is known locally.
    pub fn loaded(filename: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            filename: filename.into(),
            language: None,
            size: content.len() as u64,
            raw_url: None,
            content: FileContent::Loaded(content),
        }
    }

    /// Build a file known only by metadata.
    pub fn unloaded(filename: impl Into<String>, size: u64) -> Self {
        Self {
            filename: filename.into(),
            language: None,
            size,
            raw_url: None,
            content: FileContent::Unloaded,
        }
    }

    /// Attach a language label.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Return the language label when it is present and non-blank.
    pub fn language_label(&self) -> Option<&str> {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
    }
}

/// Tags derived locally from a gist's description and files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedTags {
    /// `lang@`-prefixed tags, one per distinct file language.
    pub language: Vec<String>,
    /// Tags parsed out of the description.
    pub custom: Vec<String>,
}

impl DerivedTags {
    /// Iterate every tag, language tags first.
    pub fn all(&self) -> impl Iterator<Item = &str> {
        self.language
            .iter()
            .chain(self.custom.iter())
            .map(String::as_str)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.all().any(|candidate| candidate == tag)
    }
}

/// A gist as held by the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gist {
    pub id: String,
    pub description: String,
    pub files: BTreeMap<String, GistFile>,
    pub visibility: Visibility,
    pub owner: Option<Owner>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: Option<String>,
    /// Recomputed whenever the gist enters the cache; never sent upstream.
    #[serde(skip)]
    pub tags: DerivedTags,
}

impl Gist {
    /// Create a gist with the given id and description and no files.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            description: description.into(),
            files: BTreeMap::new(),
            visibility: Visibility::Secret,
            owner: None,
            created_at: now,
            updated_at: now,
            html_url: None,
            tags: DerivedTags::default(),
        }
    }

    /// Add or replace a file, keyed by its filename.
    pub fn with_file(mut self, file: GistFile) -> Self {
        self.files.insert(file.filename.clone(), file);
        self
    }

    /// `true` when every file body is present. A gist without files counts as loaded.
    pub fn all_content_loaded(&self) -> bool {
        self.files.values().all(|file| file.content.is_loaded())
    }

    /// Iterate the non-blank language labels of this gist's files.
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.files.values().filter_map(GistFile::language_label)
    }
}

/// Request payload for creating a gist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGistRequest {
    pub description: String,
    /// Filename → content.
    pub files: BTreeMap<String, String>,
    pub visibility: Visibility,
}

/// New content and optional rename for one file of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEdit {
    pub content: String,
    pub rename_to: Option<String>,
}

impl FileEdit {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            rename_to: None,
        }
    }
}

/// Request payload for updating a gist.
///
/// A `None` entry in `files` deletes that file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateGistRequest {
    pub description: String,
    pub files: BTreeMap<String, Option<FileEdit>>,
}

impl UpdateGistRequest {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            files: BTreeMap::new(),
        }
    }

    /// Set the content of `filename`.
    pub fn put_file(mut self, filename: impl Into<String>, content: impl Into<String>) -> Self {
        self.files
            .insert(filename.into(), Some(FileEdit::content(content)));
        self
    }

    /// Delete `filename`.
    pub fn delete_file(mut self, filename: impl Into<String>) -> Self {
        self.files.insert(filename.into(), None);
        self
    }
}
