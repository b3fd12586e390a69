//! Debounced replication of the settings document to a secret gist.

use super::clock::{Clock, SystemClock};
use super::debounce::DebounceTimer;
use super::merge::merge_settings;
use crate::config::Config;
use crate::constants::{DEFAULT_PER_PAGE, SETTINGS_FILE_NAME, SETTINGS_GIST_DESCRIPTION};
use crate::error::AppError;
use crate::models::gist::{CreateGistRequest, Gist, UpdateGistRequest, Visibility};
use crate::models::settings::{SettingsDocument, SettingsPatch};
use crate::remote::GistClient;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

/// Where the engine stands, as reported by [`SettingsSync::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Writes are ignored.
    Disabled,
    /// Nothing buffered.
    Idle,
    /// Writes buffered, waiting for the debounce window to close.
    Pending,
    /// A remote write is in flight.
    Flushing,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::Idle => "idle",
            Self::Pending => "pending",
            Self::Flushing => "flushing",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a flush attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The merged document was written to the gist with this id.
    Written { gist_id: String },
    /// Nothing was buffered.
    NothingPending,
    /// Another flush is in flight; buffered writes follow once it resolves.
    InFlight,
    /// Sync is disabled.
    Disabled,
}

#[derive(Default)]
struct SyncState {
    enabled: bool,
    flushing: bool,
    pending: Option<SettingsPatch>,
    backing_id: Option<String>,
}

struct SyncInner {
    client: Arc<dyn GistClient>,
    clock: Arc<dyn Clock>,
    debounce: Duration,
    per_page: u32,
    state: Mutex<SyncState>,
    timer: DebounceTimer,
    /// Woken whenever a flush releases the in-flight flag.
    flushed: Notify,
}

/// Buffers settings patches and writes them upstream after a quiet period.
///
/// Cloning is cheap; clones share the same buffer and timer.
#[derive(Clone)]
pub struct SettingsSync {
    inner: Arc<SyncInner>,
}

impl SettingsSync {
    /// Create a disabled engine.
    pub fn new(client: Arc<dyn GistClient>, debounce: Duration) -> Self {
        Self::assemble(client, debounce, Arc::new(SystemClock), DEFAULT_PER_PAGE)
    }

    /// Create an engine using the configured debounce window, enabled when
    /// `GISTSHELF_SETTINGS_SYNC` is set.
    pub fn from_config(client: Arc<dyn GistClient>, config: &Config) -> Self {
        let engine = Self::assemble(
            client,
            config.sync_debounce,
            Arc::new(SystemClock),
            config.per_page,
        );
        if config.settings_sync {
            engine.enable();
        }
        engine
    }

    /// Create a disabled engine with an explicit clock.
    pub fn with_clock(
        client: Arc<dyn GistClient>,
        debounce: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self::assemble(client, debounce, clock, DEFAULT_PER_PAGE)
    }

    fn assemble(
        client: Arc<dyn GistClient>,
        debounce: Duration,
        clock: Arc<dyn Clock>,
        per_page: u32,
    ) -> Self {
        Self {
            inner: Arc::new(SyncInner {
                client,
                clock,
                debounce,
                per_page: per_page.max(1),
                state: Mutex::new(SyncState::default()),
                timer: DebounceTimer::new(),
                flushed: Notify::new(),
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SyncState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> SyncStatus {
        let state = self.state();
        if !state.enabled {
            SyncStatus::Disabled
        } else if state.flushing {
            SyncStatus::Flushing
        } else if state.pending.is_some() || self.inner.timer.is_scheduled() {
            SyncStatus::Pending
        } else {
            SyncStatus::Idle
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state().enabled
    }

    pub fn enable(&self) {
        self.state().enabled = true;
        debug!("settings sync enabled");
    }

    /// Stop syncing. Buffered writes are discarded and the timer cancelled.
    pub fn disable(&self) {
        let dropped = {
            let mut state = self.state();
            state.enabled = false;
            state.pending.take().is_some()
        };
        self.inner.timer.cancel();
        debug!(dropped, "settings sync disabled");
    }

    /// Id of the gist backing the settings document, once known.
    pub fn backing_gist_id(&self) -> Option<String> {
        self.state().backing_id.clone()
    }

    /// Buffer `patch` and restart the debounce window.
    ///
    /// Ignored while sync is disabled. The patch is stamped with the current
    /// time before it is merged into the buffer. Without a reachable tokio
    /// runtime no timer starts and the patch waits for the next flush.
    pub fn save_settings(&self, mut patch: SettingsPatch) {
        let flushing = {
            let mut state = self.state();
            if !state.enabled {
                debug!("settings sync disabled; ignoring save");
                return;
            }
            patch.last_modified = Some(self.inner.clock.now_millis());
            match state.pending.as_mut() {
                Some(pending) => pending.merge(patch),
                None => state.pending = Some(patch),
            }
            state.flushing
        };
        // A flush in flight reschedules on its own once it resolves.
        if !flushing {
            self.schedule();
        }
    }

    fn schedule(&self) {
        let weak: Weak<SyncInner> = Arc::downgrade(&self.inner);
        let scheduled = self.inner.timer.schedule(self.inner.debounce, async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let engine = SettingsSync { inner };
            if let Err(err) = engine.flush_pending().await {
                warn!("settings flush failed: {}", err);
            }
        });
        if !scheduled {
            debug!("settings write buffered until the next explicit flush");
        }
    }

    /// Cancel the debounce timer and flush the buffer now.
    ///
    /// # Errors
    /// Propagates the remote error; the buffered writes are kept for the
    /// next flush.
    pub async fn flush(&self) -> Result<FlushOutcome, AppError> {
        self.inner.timer.cancel();
        self.flush_pending().await
    }

    /// Flush until nothing is buffered, waiting out a flush already in flight.
    ///
    /// Writes saved while that flush runs are written by a follow-up flush
    /// before this returns.
    ///
    /// # Returns
    /// The outcome of the last flush this call ran itself; `NothingPending`
    /// when the in-flight flush already covered everything.
    ///
    /// # Errors
    /// Propagates the remote error; the buffered writes are kept.
    pub async fn drain(&self) -> Result<FlushOutcome, AppError> {
        loop {
            let flushed = self.inner.flushed.notified();
            tokio::pin!(flushed);
            // Register before checking the flag so a release in between is not missed.
            flushed.as_mut().enable();
            match self.flush().await? {
                FlushOutcome::InFlight => {
                    debug!("waiting for in-flight settings flush");
                    flushed.await;
                }
                outcome => return Ok(outcome),
            }
        }
    }

    async fn flush_pending(&self) -> Result<FlushOutcome, AppError> {
        let payload = {
            let mut state = self.state();
            if !state.enabled {
                return Ok(FlushOutcome::Disabled);
            }
            if state.flushing {
                return Ok(FlushOutcome::InFlight);
            }
            let Some(payload) = state.pending.take() else {
                return Ok(FlushOutcome::NothingPending);
            };
            state.flushing = true;
            payload
        };

        let result = self.write_remote(&payload).await;

        let reschedule = {
            let mut state = self.state();
            state.flushing = false;
            let arrived_meanwhile = state.pending.is_some();
            if result.is_err() && state.enabled {
                let mut requeued = payload;
                if let Some(newer) = state.pending.take() {
                    requeued.merge(newer);
                }
                state.pending = Some(requeued);
            }
            state.enabled && arrived_meanwhile
        };
        if reschedule {
            self.schedule();
        }
        self.inner.flushed.notify_waiters();

        match result {
            Ok(gist_id) => {
                info!(gist_id = %gist_id, "settings flushed");
                Ok(FlushOutcome::Written { gist_id })
            }
            Err(err) => Err(err),
        }
    }

    async fn write_remote(&self, payload: &SettingsPatch) -> Result<String, AppError> {
        let remote = self.load_remote_settings().await?;
        let merged = merge_settings(payload, remote);
        let json = serde_json::to_string_pretty(&merged)?;
        let backing_id = self.backing_gist_id();
        let gist = match backing_id {
            Some(id) => {
                let request = UpdateGistRequest::new(SETTINGS_GIST_DESCRIPTION)
                    .put_file(SETTINGS_FILE_NAME, json);
                self.inner.client.update(&id, &request).await?
            }
            None => {
                let mut files = BTreeMap::new();
                files.insert(SETTINGS_FILE_NAME.to_string(), json);
                let request = CreateGistRequest {
                    description: SETTINGS_GIST_DESCRIPTION.to_string(),
                    files,
                    visibility: Visibility::Secret,
                };
                let gist = self.inner.client.create(&request).await?;
                info!(gist_id = %gist.id, "created settings gist");
                gist
            }
        };
        self.state().backing_id = Some(gist.id.clone());
        Ok(gist.id)
    }

    /// Look for the settings gist on the first page of the user's gists.
    async fn locate_backing_gist(&self) -> Result<Option<String>, AppError> {
        let page = self.inner.client.list_page(1, self.inner.per_page).await?;
        let found = page
            .gists
            .iter()
            .find(|gist| is_settings_gist(gist))
            .map(|gist| gist.id.clone());
        if let Some(id) = &found {
            debug!(gist_id = %id, "found settings gist");
            self.state().backing_id = Some(id.clone());
        }
        Ok(found)
    }

    /// Fetch the settings document stored upstream.
    ///
    /// # Returns
    /// `None` when there is no settings gist yet, or its content cannot be
    /// parsed (the gist id is still remembered so the next flush repairs it).
    ///
    /// # Errors
    /// Propagates remote errors other than a vanished settings gist.
    pub async fn load_remote_settings(&self) -> Result<Option<SettingsDocument>, AppError> {
        let known = self.backing_gist_id();
        let id = match known {
            Some(id) => id,
            None => match self.locate_backing_gist().await? {
                Some(id) => id,
                None => return Ok(None),
            },
        };

        let gist = match self.inner.client.get(&id).await {
            Ok(gist) => gist,
            Err(err) if err.is_not_found() => {
                warn!(gist_id = %id, "settings gist disappeared; a new one will be created");
                self.forget_backing_id(&id);
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let Some(raw) = gist
            .files
            .get(SETTINGS_FILE_NAME)
            .and_then(|file| file.content.as_loaded())
        else {
            warn!(gist_id = %id, "settings gist has no readable settings file");
            return Ok(None);
        };
        match serde_json::from_str::<SettingsDocument>(raw) {
            Ok(document) => Ok(Some(document)),
            Err(err) => {
                warn!(gist_id = %id, "ignoring unparsable remote settings: {}", err);
                Ok(None)
            }
        }
    }

    fn forget_backing_id(&self, id: &str) {
        let mut state = self.state();
        if state.backing_id.as_deref() == Some(id) {
            state.backing_id = None;
        }
    }

    /// Load the remote document and lay the whole local document over it.
    ///
    /// # Errors
    /// Propagates errors from [`SettingsSync::load_remote_settings`].
    pub async fn pull(&self, local: &SettingsDocument) -> Result<SettingsDocument, AppError> {
        let remote = self.load_remote_settings().await?;
        Ok(merge_settings(&SettingsPatch::from(local), remote))
    }
}

fn is_settings_gist(gist: &Gist) -> bool {
    !gist.visibility.is_public() && gist.files.contains_key(SETTINGS_FILE_NAME)
}
