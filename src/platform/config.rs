// Scanner111 - platform/config.rs
//
// Platform-specific configuration and data directory resolution.
// Uses the `directories` crate for XDG (Linux), AppData (Windows),
// Library (macOS) compliance. Environment variables override the
// resolved locations for scripted and test runs.

use crate::util::constants;
use directories::ProjectDirs;
use std::path::PathBuf;

/// Resolved platform paths for Scanner111 data and configuration.
#[derive(Debug, Clone)]
pub struct PlatformPaths {
    /// Settings directory (e.g. ~/.config/scanner111/).
    pub settings_dir: PathBuf,

    /// Incremental-cache directory (e.g. ~/.cache/scanner111/).
    pub cache_dir: PathBuf,

    /// Data directory for sessions and statistics.
    pub data_dir: PathBuf,
}

impl PlatformPaths {
    /// Resolve platform-appropriate paths.
    ///
    /// `SCANNER111_SETTINGS_DIR` and `SCANNER111_CACHE_DIR` override the
    /// respective locations when set. Falls back to the current directory
    /// if platform dirs cannot be determined.
    pub fn resolve() -> Self {
        let mut paths = if let Some(proj_dirs) = ProjectDirs::from("", "", constants::APP_ID) {
            Self {
                settings_dir: proj_dirs.config_dir().to_path_buf(),
                cache_dir: proj_dirs.cache_dir().to_path_buf(),
                data_dir: proj_dirs.data_dir().to_path_buf(),
            }
        } else {
            tracing::warn!("Could not determine platform directories, using current directory");
            let fallback = PathBuf::from(".");
            Self {
                settings_dir: fallback.clone(),
                cache_dir: fallback.join("cache"),
                data_dir: fallback,
            }
        };

        if let Ok(dir) = std::env::var(constants::ENV_SETTINGS_DIR) {
            paths.settings_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = std::env::var(constants::ENV_CACHE_DIR) {
            paths.cache_dir = PathBuf::from(dir);
        }

        tracing::debug!(
            settings = %paths.settings_dir.display(),
            cache = %paths.cache_dir.display(),
            data = %paths.data_dir.display(),
            "Platform paths resolved"
        );
        paths
    }

    /// Sessions subdirectory of the data dir.
    pub fn sessions_dir(&self) -> PathBuf {
        self.data_dir.join(constants::SESSIONS_DIR_NAME)
    }

    /// Statistics table path in the data dir.
    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join(constants::STATS_FILE_NAME)
    }
}

/// True when interactive prompts are disabled via the environment.
pub fn non_interactive() -> bool {
    std::env::var(constants::ENV_NO_INTERACTIVE).is_ok_and(|v| !v.is_empty() && v != "0")
}
