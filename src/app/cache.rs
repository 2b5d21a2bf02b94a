// Scanner111 - app/cache.rs
//
// Incremental analysis: a content-fingerprint cache in front of the
// orchestrator. A file whose hash, mtime, and analysis age all check
// out is served from the cache; anything else is reanalysed and the
// entry rewritten. Entries persist one-file-per-entry under the cache
// directory and are evicted by a background housekeeping sweep.

use crate::app::orchestrator::{AnalysisRequest, Orchestrator};
use crate::core::model::{AnalysisKind, AnalysisResult, FileAnalysisState};
use crate::core::parser::{self, ParserConfig};
use crate::core::settings::Scope;
use crate::util::cancel::CancellationHandle;
use crate::util::constants;
use crate::util::error::{ParseError, ScanError};
use base64::Engine;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Cache counters returned by `stats()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// In-memory entry count.
    pub entries: usize,
    /// Total size of the on-disk entry files.
    pub disk_bytes: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Base64 (standard alphabet) SHA-256 over the newline-joined lines.
pub fn content_hash(lines: &[String]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(lines.join("\n").as_bytes());
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// On-disk entry file name: `<basename>_<16-char-url-safe-prefix-of-
/// SHA256(path)>.cache`. The hash prefix keeps same-named logs from
/// different directories apart.
pub fn entry_file_name(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.display().to_string().as_bytes());
    let digest = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hasher.finalize());
    let prefix: String = digest.chars().take(constants::CACHE_PATH_HASH_LEN).collect();
    let basename = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "log".to_string());
    format!("{basename}_{prefix}.{}", constants::CACHE_FILE_EXTENSION)
}

pub struct IncrementalAnalyzer {
    orchestrator: Arc<Orchestrator>,
    cache_dir: PathBuf,
    entries: Mutex<HashMap<PathBuf, FileAnalysisState>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl IncrementalAnalyzer {
    pub fn new(orchestrator: Arc<Orchestrator>, cache_dir: PathBuf) -> Self {
        Self {
            orchestrator,
            cache_dir,
            entries: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Analyse `path`, serving unchanged content from the cache.
    ///
    /// A hit requires all three: equal content hash, an mtime no newer
    /// than the cached one, and a previous analysis younger than the
    /// freshness window. On a miss the orchestrator runs; its failure
    /// leaves the cache untouched and propagates.
    pub fn analyze_incremental(
        &self,
        path: &Path,
        analysis_kind: AnalysisKind,
        cancellation: &CancellationHandle,
    ) -> Result<Vec<AnalysisResult>, ScanError> {
        if !path.exists() {
            return Err(ScanError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        let content =
            crate::platform::fs::read_file_lossy(&canonical).map_err(|e| ParseError::Io {
                path: canonical.clone(),
                source: e,
            })?;
        let lines = parser::split_lines(&content);
        let hash = content_hash(&lines);

        let (size, mtime) =
            crate::platform::fs::file_fingerprint(&canonical).map_err(|e| ParseError::Io {
                path: canonical.clone(),
                source: e,
            })?;

        if let Some(results) = self.cached_results(&canonical, &hash, mtime) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(path = %canonical.display(), "Cache hit");
            return Ok(results);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(path = %canonical.display(), "Cache miss, analysing");

        // The entry lock is never held across this run.
        let parser_config = ParserConfig {
            xse_acronym: self
                .orchestrator_settings_xse(),
        };
        let parsed = Arc::new(parser::parse_lines(&canonical, lines, &parser_config));
        let request = AnalysisRequest {
            input_path: canonical.clone(),
            analysis_kind,
            selected_analyzers: None,
            cancellation: cancellation.clone(),
        };
        let outcome =
            self.orchestrator
                .run_over_parsed(&request, parsed, Instant::now())?;
        if outcome.parsed_log.is_none() {
            // Orchestrator-level failure: surface it, cache nothing.
            let message = outcome
                .results
                .first()
                .map(|r| r.errors.join("; "))
                .unwrap_or_else(|| "orchestration failed".to_string());
            return Err(ScanError::Internal { message });
        }
        if outcome.was_cancelled {
            return Err(ScanError::Cancelled);
        }

        let state = FileAnalysisState {
            version: constants::CACHE_VERSION,
            path: canonical.clone(),
            content_hash: hash,
            last_modified: mtime,
            file_size: size,
            cached_results: outcome.results.clone(),
            last_analyzed: Utc::now(),
            analyzer_scratch: outcome.shared_data.clone(),
        };
        self.store(canonical, state);
        Ok(outcome.results)
    }

    fn orchestrator_settings_xse(&self) -> String {
        // The orchestrator owns the settings; reparse uses the same
        // acronym so segment boundaries agree between runs.
        self.orchestrator
            .settings()
            .get_string_or(Scope::Game, "xse_acronym", "F4SE")
    }

    /// Drop one entry, or the whole cache when `path` is None.
    pub fn clear(&self, path: Option<&Path>) {
        let mut entries = self.lock_entries();
        match path {
            Some(path) => {
                let canonical =
                    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
                entries.remove(&canonical);
                let _ = std::fs::remove_file(self.entry_path(&canonical));
            }
            None => {
                for path in entries.keys() {
                    let _ = std::fs::remove_file(self.entry_path(path));
                }
                entries.clear();
                if let Ok(dir) = std::fs::read_dir(&self.cache_dir) {
                    for entry in dir.flatten() {
                        let p = entry.path();
                        if p.extension().and_then(|e| e.to_str())
                            == Some(constants::CACHE_FILE_EXTENSION)
                        {
                            let _ = std::fs::remove_file(p);
                        }
                    }
                }
            }
        }
    }

    /// Counters plus on-disk usage.
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock_entries().len();
        let disk_bytes = std::fs::read_dir(&self.cache_dir)
            .map(|dir| {
                dir.flatten()
                    .filter(|e| {
                        e.path().extension().and_then(|x| x.to_str())
                            == Some(constants::CACHE_FILE_EXTENSION)
                    })
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0);
        CacheStats {
            entries,
            disk_bytes,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    // -------------------------------------------------------------------------
    // Entry loading and storage
    // -------------------------------------------------------------------------

    fn cached_results(
        &self,
        path: &Path,
        hash: &str,
        current_mtime: chrono::DateTime<Utc>,
    ) -> Option<Vec<AnalysisResult>> {
        let mut entries = self.lock_entries();
        if !entries.contains_key(path) {
            let loaded = self.load_entry_from_disk(path)?;
            entries.insert(path.to_path_buf(), loaded);
        }
        let state = entries.get(path)?;

        let fresh = Utc::now() - state.last_analyzed
            < chrono::Duration::hours(constants::CACHE_FRESHNESS_HOURS);
        if state.content_hash == hash && current_mtime <= state.last_modified && fresh {
            Some(state.cached_results.clone())
        } else {
            None
        }
    }

    fn load_entry_from_disk(&self, path: &Path) -> Option<FileAnalysisState> {
        let entry_path = self.entry_path(path);
        let content = std::fs::read_to_string(&entry_path).ok()?;
        match serde_json::from_str::<FileAnalysisState>(&content) {
            Ok(state) if state.version == constants::CACHE_VERSION => Some(state),
            Ok(state) => {
                tracing::debug!(
                    found = state.version,
                    expected = constants::CACHE_VERSION,
                    "Cache entry version mismatch, deleting"
                );
                let _ = std::fs::remove_file(&entry_path);
                None
            }
            Err(e) => {
                tracing::debug!(error = %e, path = %entry_path.display(), "Corrupt cache entry, deleting");
                let _ = std::fs::remove_file(&entry_path);
                None
            }
        }
    }

    fn store(&self, path: PathBuf, state: FileAnalysisState) {
        self.lock_entries().insert(path, state.clone());

        // Persistence is fire-and-forget; a write failure costs a future
        // cache miss, nothing more.
        let entry_path = self.entry_path(&state.path);
        std::thread::spawn(move || {
            match serde_json::to_vec_pretty(&state) {
                Ok(bytes) => {
                    if let Err(e) = crate::platform::fs::write_atomic(&entry_path, &bytes) {
                        tracing::warn!(error = %e, path = %entry_path.display(), "Cache persistence failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Cache entry serialisation failed");
                }
            }
        });
    }

    fn entry_path(&self, path: &Path) -> PathBuf {
        self.cache_dir.join(entry_file_name(path))
    }

    fn lock_entries(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, FileAnalysisState>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -------------------------------------------------------------------------
    // Housekeeping
    // -------------------------------------------------------------------------

    /// One eviction sweep: drop entries whose last analysis is older
    /// than the eviction window or whose source file disappeared, then
    /// stamp the sweep marker. Returns the number of evicted entries.
    pub fn sweep_once(&self) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(constants::CACHE_EVICTION_DAYS);
        let stale: Vec<PathBuf> = {
            let entries = self.lock_entries();
            entries
                .iter()
                .filter(|(path, state)| state.last_analyzed < cutoff || !path.exists())
                .map(|(path, _)| path.clone())
                .collect()
        };

        for path in &stale {
            self.lock_entries().remove(path);
            let _ = std::fs::remove_file(self.entry_path(path));
        }

        let marker = self.cache_dir.join(constants::CACHE_SWEEP_MARKER);
        if let Err(e) =
            crate::platform::fs::write_atomic(&marker, Utc::now().to_rfc3339().as_bytes())
        {
            tracing::warn!(error = %e, "Cannot write sweep marker");
        }

        if !stale.is_empty() {
            tracing::info!(evicted = stale.len(), "Cache sweep evicted entries");
        }
        stale.len()
    }

    /// Start the hourly housekeeping thread. Cancel the returned handle
    /// to stop it; the thread checks the flag every few hundred ms.
    pub fn spawn_sweeper(self: &Arc<Self>) -> CancellationHandle {
        let cancel = CancellationHandle::new();
        let cache = Arc::clone(self);
        let handle = cancel.clone();
        std::thread::spawn(move || {
            let interval = Duration::from_secs(constants::CACHE_SWEEP_INTERVAL_SECS);
            let check = Duration::from_millis(constants::CACHE_SWEEP_CANCEL_CHECK_INTERVAL_MS);
            loop {
                let mut waited = Duration::ZERO;
                while waited < interval {
                    if handle.wait_cancelled_timeout(check) {
                        tracing::debug!("Cache sweeper stopping");
                        return;
                    }
                    waited += check;
                }
                cache.sweep_once();
            }
        });
        cancel
    }
}
