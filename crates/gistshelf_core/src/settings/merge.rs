use crate::models::settings::{SettingsDocument, SettingsPatch};
use tracing::debug;

/// The document a fresh install starts from.
pub fn default_settings() -> SettingsDocument {
    SettingsDocument::default()
}

/// Overlay local fields onto the remote document.
///
/// Every field present in `local` wins over `remote`, whichever side was
/// modified last; `remote = None` overlays onto [`default_settings`]. Remote
/// keys the local patch does not name (including unknown ones) survive.
pub fn merge_settings(local: &SettingsPatch, remote: Option<SettingsDocument>) -> SettingsDocument {
    let mut merged = match remote {
        Some(remote) => {
            if let Some(local_modified) = local.last_modified {
                debug!(
                    local_modified,
                    remote_modified = remote.last_modified,
                    remote_is_newer = remote.last_modified > local_modified,
                    "merging settings"
                );
            }
            remote
        }
        None => default_settings(),
    };
    local.apply_to(&mut merged);
    merged
}
