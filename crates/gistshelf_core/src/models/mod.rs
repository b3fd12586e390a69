//! Data models for gists, files, and the synced settings document.

/// Gist, file, and request models.
pub mod gist;
/// Settings document, patches, and saved-search models.
pub mod settings;
