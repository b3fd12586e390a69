//! Configuration loading from environment variables.

use crate::constants::{
    DEFAULT_API_URL, DEFAULT_PER_PAGE, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SYNC_DEBOUNCE_MS,
};
use crate::text::normalize_optional_nonempty;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for GistShelf.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the gist REST API.
    pub api_url: String,
    /// Personal access token; anonymous requests when absent.
    pub token: Option<String>,
    /// Page size used by list requests.
    pub per_page: u32,
    /// Whether cross-device settings sync starts enabled.
    pub settings_sync: bool,
    /// Trailing debounce window for settings writes.
    pub sync_debounce: Duration,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Location of the device-local settings document.
    pub settings_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            per_page: DEFAULT_PER_PAGE,
            settings_sync: false,
            sync_debounce: Duration::from_millis(DEFAULT_SYNC_DEBOUNCE_MS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            settings_path: default_settings_path(),
        }
    }
}

/// Resolve a leading `~/` against the home directory.
fn home_relative(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn home_dir() -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .find_map(|key| normalize_optional_nonempty(env::var(key).ok()))
        .map(PathBuf::from)
}

fn default_settings_path() -> PathBuf {
    let base = env::var("XDG_CONFIG_HOME")
        .ok()
        .and_then(|value| normalize_optional_nonempty(Some(value)))
        .map(PathBuf::from)
        .or_else(|| home_dir().map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("gistshelf").join("settings.json")
}

/// Interpret an on/off style flag.
///
/// `1`, `true`, `yes` and `on` enable; `0`, `false`, `no`, `off` and the
/// empty string disable. Case and surrounding whitespace are ignored, and
/// anything else yields `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// `true` only when `name` is set to a recognized enabling value.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing
    /// or unparsable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let api_url = normalize_optional_nonempty(env::var("GISTSHELF_API_URL").ok())
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_url);
        Self {
            api_url,
            token: normalize_optional_nonempty(env::var("GITHUB_TOKEN").ok()),
            per_page: env_parsed::<u32>("GISTSHELF_PER_PAGE")
                .filter(|value| *value > 0)
                .unwrap_or(defaults.per_page),
            settings_sync: env_flag_enabled("GISTSHELF_SETTINGS_SYNC"),
            sync_debounce: env_parsed::<u64>("GISTSHELF_SYNC_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.sync_debounce),
            request_timeout: env_parsed::<u64>("GISTSHELF_REQUEST_TIMEOUT_SECS")
                .filter(|value| *value > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            settings_path: env::var("GISTSHELF_SETTINGS_PATH")
                .ok()
                .and_then(|value| normalize_optional_nonempty(Some(value)))
                .map(|value| home_relative(&value))
                .unwrap_or(defaults.settings_path),
        }
    }
}
