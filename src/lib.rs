//! Root crate facade for the GistShelf engine.

pub use gistshelf_core::{
    cache, config, constants, context, env, error, models, remote, search, settings, tags, text,
    AppContext, AppError, CacheEvent, Config, GistCache, GistClient, LocalSettings, SearchIndex,
    SettingsSync, SyncStatus, TagIndex,
};
