//! Application context owning the cache, the settings store and the sync engine.

use crate::cache::GistCache;
use crate::config::Config;
use crate::error::AppError;
use crate::models::gist::Gist;
use crate::models::settings::{SettingsDocument, SettingsPatch};
use crate::remote::{GistClient, GithubClient};
use crate::settings::{FlushOutcome, LocalSettings, SettingsSync};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Everything a front end needs, constructed once at startup.
pub struct AppContext {
    config: Arc<Config>,
    cache: Arc<GistCache>,
    sync: SettingsSync,
    settings: Mutex<LocalSettings>,
}

impl AppContext {
    /// Construct the context, loading local settings from `config.settings_path`.
    ///
    /// # Arguments
    /// - `config`: Loaded configuration.
    /// - `client`: Remote gist service.
    ///
    /// # Returns
    /// A new [`AppContext`]; settings sync starts enabled when the config says so.
    ///
    /// # Errors
    /// Returns an error if the settings file exists but cannot be read.
    pub fn new(config: Config, client: Arc<dyn GistClient>) -> Result<Self, AppError> {
        let settings = LocalSettings::load(config.settings_path.clone())?;
        Ok(Self::with_settings(config, client, settings))
    }

    /// Construct the context around an already loaded settings store.
    pub fn with_settings(
        config: Config,
        client: Arc<dyn GistClient>,
        settings: LocalSettings,
    ) -> Self {
        let cache = Arc::new(GistCache::from_config(client.clone(), &config));
        let sync = SettingsSync::from_config(client, &config);
        Self {
            config: Arc::new(config),
            cache,
            sync,
            settings: Mutex::new(settings),
        }
    }

    /// Construct the context against the GitHub API described by `config`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the settings
    /// file cannot be read.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let client: Arc<dyn GistClient> = Arc::new(GithubClient::from_config(&config)?);
        Self::new(config, client)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Arc<GistCache> {
        &self.cache
    }

    pub fn settings_sync(&self) -> &SettingsSync {
        &self.sync
    }

    /// Snapshot of the local settings document.
    pub fn settings(&self) -> SettingsDocument {
        self.local().document().clone()
    }

    fn local(&self) -> MutexGuard<'_, LocalSettings> {
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a local settings change, persist it, and queue it for sync.
    ///
    /// # Arguments
    /// - `change`: Mutation returning the patch it produced, or `None` for a no-op.
    ///
    /// # Returns
    /// `true` when something changed.
    ///
    /// Called outside a tokio runtime, the change is still saved and
    /// buffered for sync, but only an explicit flush or [`AppContext::shutdown`]
    /// writes it upstream.
    ///
    /// # Errors
    /// Returns an error if the settings file cannot be written.
    pub fn update_settings<F>(&self, change: F) -> Result<bool, AppError>
    where
        F: FnOnce(&mut LocalSettings) -> Option<SettingsPatch>,
    {
        let patch = {
            let mut local = self.local();
            let Some(patch) = change(&mut *local) else {
                return Ok(false);
            };
            local.save()?;
            patch
        };
        self.sync.save_settings(patch);
        Ok(true)
    }

    /// Load a gist's content and record it as recently opened.
    ///
    /// A failure to write the local settings file is logged, not returned.
    ///
    /// # Errors
    /// Propagates errors from [`GistCache::fetch_content`].
    pub async fn open_gist(&self, id: &str) -> Result<Gist, AppError> {
        let gist = self.cache.fetch_content(id).await?;
        if let Err(err) = self.update_settings(|local| Some(local.track_recent(&gist))) {
            warn!(id, "failed to record recent gist: {}", err);
        }
        Ok(gist)
    }

    /// Delete a gist and drop it from the recent list.
    ///
    /// # Errors
    /// Propagates errors from [`GistCache::delete`].
    pub async fn delete_gist(&self, id: &str) -> Result<(), AppError> {
        self.cache.delete(id).await?;
        if let Err(err) = self.update_settings(|local| local.forget_recent(id)) {
            warn!(id, "failed to update recent gists: {}", err);
        }
        Ok(())
    }

    /// Enable settings sync and adopt the merged remote document.
    ///
    /// # Returns
    /// The merged document, which is also written to the local settings file.
    ///
    /// # Errors
    /// Returns remote errors from the pull or local I/O errors from the save.
    pub async fn start_settings_sync(&self) -> Result<SettingsDocument, AppError> {
        self.sync.enable();
        let local = self.settings();
        let merged = self.sync.pull(&local).await?;
        {
            let mut store = self.local();
            store.replace(merged.clone());
            store.save()?;
        }
        debug!(
            pinned = merged.pinned_tags.len(),
            recent = merged.recent_gists.len(),
            "settings pulled"
        );
        Ok(merged)
    }

    /// Flush buffered settings writes before the process exits.
    ///
    /// Waits for a flush already in flight, then writes whatever was saved
    /// while it ran.
    ///
    /// # Errors
    /// Propagates the flush error.
    pub async fn shutdown(&self) -> Result<FlushOutcome, AppError> {
        self.sync.drain().await
    }
}
