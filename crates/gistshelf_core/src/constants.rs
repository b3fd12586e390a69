//! Shared constants used across GistShelf crates.

/// Default REST endpoint for the gist service.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default page size requested when listing gists.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Hard cap on pages walked by the sequential pagination fallback.
pub const MAX_FALLBACK_PAGES: u32 = 100;

/// Default trailing debounce window for settings writes, in milliseconds.
pub const DEFAULT_SYNC_DEBOUNCE_MS: u64 = 1_500;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Marker filename identifying the settings backing gist.
pub const SETTINGS_FILE_NAME: &str = ".gistshelf.json";

/// Description given to the settings backing gist on creation.
pub const SETTINGS_GIST_DESCRIPTION: &str = "GistShelf settings (synced automatically)";

/// Maximum number of entries kept in the recent-gists list.
pub const MAX_RECENT_GISTS: usize = 10;

/// Prefix distinguishing language tags from custom tags.
pub const LANGUAGE_TAG_PREFIX: &str = "lang@";

/// Language tag used when no file carries a language label.
pub const FALLBACK_LANGUAGE_TAG: &str = "lang@Other";

/// Marker opening a legacy tag clause in a description.
pub const LEGACY_TAG_MARKER: &str = "#tags:";

/// Fuzzy queries shorter than this many characters return nothing.
pub const MIN_FUZZY_QUERY_CHARS: usize = 2;

/// Fraction of the query length tolerated as edit distance by fuzzy search.
pub const FUZZY_THRESHOLD: f64 = 0.2;

/// User agent sent to the gist service.
pub const USER_AGENT: &str = concat!("gistshelf/", env!("CARGO_PKG_VERSION"));
