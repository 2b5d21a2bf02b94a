// Scanner111 - util/constants.rs
//
// Single source of truth for all named constants, limits, and defaults.

// =============================================================================
// Application metadata
// =============================================================================

/// Application display name.
pub const APP_NAME: &str = "Scanner111";

/// Application identifier used for config/data directories.
pub const APP_ID: &str = "Scanner111";

/// Current application version (updated by release script).
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// Parser limits
// =============================================================================

/// Number of lines examined at the top of a crash log for the game version
/// and crash-generator version scalars.
pub const HEADER_SCAN_LINES: usize = 10;

/// Placeholder value for scalars that could not be extracted from the log.
pub const UNKNOWN: &str = "UNKNOWN";

/// Maximum crash-log file size accepted by the parser. Crash generators
/// write logs in the tens-of-kilobytes range; anything larger is almost
/// certainly not a crash log and would only waste memory.
pub const MAX_CRASH_LOG_SIZE: u64 = 16 * 1024 * 1024; // 16 MB

/// Maximum number of diagnostics accumulated per analyzer before suppression.
pub const MAX_ANALYZER_ERRORS: usize = 100;

// =============================================================================
// Plugin limits (engine constraints, not configuration)
// =============================================================================

/// Full-plugin count at which the approaching-limit warning fires.
pub const PLUGIN_WARN_THRESHOLD: usize = 240;

/// Full-plugin count at which the limit counts as exceeded.
pub const PLUGIN_CRITICAL_THRESHOLD: usize = 255;

// =============================================================================
// Orchestrator limits
// =============================================================================

/// Lower clamp for the parallel analyzer count.
pub const MIN_PARALLEL_ANALYZERS: usize = 1;

/// Upper clamp for the parallel analyzer count.
pub const MAX_PARALLEL_ANALYZERS: usize = 10;

// =============================================================================
// Incremental cache
// =============================================================================

/// Cache entry schema version. Entries with a different version are
/// deleted on load rather than migrated.
pub const CACHE_VERSION: u32 = 1;

/// How long a cached result stays servable without reanalysis (hours).
pub const CACHE_FRESHNESS_HOURS: i64 = 24;

/// Age past which an entry is evicted by the housekeeping sweep (days).
pub const CACHE_EVICTION_DAYS: i64 = 7;

/// Interval between housekeeping sweeps (seconds).
pub const CACHE_SWEEP_INTERVAL_SECS: u64 = 3_600;

/// How often the sweeper thread checks the cancel flag within a sweep
/// interval (ms).
pub const CACHE_SWEEP_CANCEL_CHECK_INTERVAL_MS: u64 = 250;

/// File name extension for on-disk cache entries.
pub const CACHE_FILE_EXTENSION: &str = "cache";

/// Length of the path-hash prefix appended to cache file names.
pub const CACHE_PATH_HASH_LEN: usize = 16;

/// Marker file written after each completed housekeeping sweep.
pub const CACHE_SWEEP_MARKER: &str = "last_sweep";

// =============================================================================
// Watcher limits
// =============================================================================

/// Debounce window for file-change events (ms). Multiple events within the
/// window collapse to a single reanalysis; the timer restarts on each event.
pub const WATCH_DEBOUNCE_MS: u64 = 500;

/// How often the watcher polls the watched directory for changes (ms).
pub const WATCH_POLL_INTERVAL_MS: u64 = 1_000;

/// How often the cancel flag is checked within each watcher poll sleep (ms).
pub const WATCH_CANCEL_CHECK_INTERVAL_MS: u64 = 100;

/// Glob patterns a file must match to be picked up by the watcher.
pub const WATCH_INCLUDE_PATTERNS: &[&str] = &["crash-*.log", "crash-*.txt"];

// =============================================================================
// Mod file scan limits
// =============================================================================

/// Maximum directory recursion depth when scanning a mod staging folder.
pub const MOD_SCAN_MAX_DEPTH: usize = 6;

/// Maximum number of files examined in a single mod staging scan.
pub const MOD_SCAN_MAX_FILES: usize = 50_000;

// =============================================================================
// Sessions and statistics
// =============================================================================

/// Session file schema version; mismatches are silently discarded on load.
pub const SESSION_VERSION: u32 = 1;

/// Subdirectory of the data dir holding session files.
pub const SESSIONS_DIR_NAME: &str = "sessions";

/// File name of the statistics table in the data directory.
pub const STATS_FILE_NAME: &str = "statistics.csv";

// =============================================================================
// Settings
// =============================================================================

/// Main settings file name (YAML).
pub const SETTINGS_FILE_NAME: &str = "settings.yaml";

/// Environment variable overriding the settings directory.
pub const ENV_SETTINGS_DIR: &str = "SCANNER111_SETTINGS_DIR";

/// Environment variable overriding the cache directory.
pub const ENV_CACHE_DIR: &str = "SCANNER111_CACHE_DIR";

/// Environment variable forcing non-interactive mode.
pub const ENV_NO_INTERACTIVE: &str = "SCANNER111_NO_INTERACTIVE";

/// Environment variable selecting the active game profile.
pub const ENV_GAME: &str = "SCANNER111_GAME";

// =============================================================================
// Logging
// =============================================================================

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

// =============================================================================
// Reports
// =============================================================================

/// Indentation width per fragment depth in the plain-text formatter.
pub const TEXT_INDENT_WIDTH: usize = 2;

/// Report line emitted in place of a Form ID list when no suspect IDs
/// survive the FF-prefix filter.
pub const NO_FORM_ID_SUSPECTS: &str = "COULDN'T FIND ANY FORM ID SUSPECTS";
