//! Core engine for GistShelf: gist cache, tag/search indexes, settings sync.

/// Gist cache, lazy content loading, and pagination strategies.
pub mod cache;
/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Application context wiring the engine together.
pub mod context;
/// Process-global environment mutation helpers.
pub mod env;
/// Application error types.
pub mod error;
/// Gist and settings data models.
pub mod models;
/// Remote gist service contract and the GitHub adapter.
pub mod remote;
/// Hybrid fuzzy/regex search index.
pub mod search;
/// Settings replication engine and local settings store.
pub mod settings;
/// Description parsing and the inverted tag index.
pub mod tags;
/// Shared text normalization helpers.
pub mod text;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheEvent, GistCache};
pub use config::Config;
pub use constants::*;
pub use context::AppContext;
pub use error::AppError;
pub use remote::GistClient;
pub use search::SearchIndex;
pub use settings::{LocalSettings, SettingsSync, SyncStatus};
pub use tags::TagIndex;
