//! Cross-device settings: the local store and the debounced replication engine.
//!
//! The synced document lives in a secret gist holding a single
//! `.gistshelf.json` file. Local edits produce [`SettingsPatch`]es that the
//! [`SettingsSync`] engine buffers and writes upstream after a quiet period.
//!
//! [`SettingsPatch`]: crate::models::settings::SettingsPatch

mod clock;
mod debounce;
mod merge;
mod store;
mod sync;

pub use clock::{Clock, SystemClock};
pub use debounce::DebounceTimer;
pub use merge::{default_settings, merge_settings};
pub use store::LocalSettings;
pub use sync::{FlushOutcome, SettingsSync, SyncStatus};

#[cfg(test)]
pub(crate) use clock::ManualClock;
