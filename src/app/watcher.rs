// Scanner111 - app/watcher.rs
//
// Crash-log directory watcher: polls the watched directory on a
// background thread and reports files whose content changed, debounced
// so a burst of writes to the same file collapses into one reanalysis.
//
// Architecture:
//   - `LogWatcher` lives on the caller's thread; `run_watcher` executes
//     on a background thread polling on a fixed interval.
//   - A `CancellationHandle` lets the caller stop the watcher; the poll
//     loop sleeps in sub-intervals so cancellation is observed promptly.
//   - Debounce state is a pure combinator (`Debouncer`) driven by
//     instants, so the timing behaviour is testable without threads.

use crate::util::cancel::CancellationHandle;
use crate::util::constants;
use chrono::{DateTime, Utc};
use glob::Pattern;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

// =============================================================================
// Debounce combinator
// =============================================================================

/// Restartable one-shot timer: every event pushes the deadline out by
/// the full window; the timer fires once when the window elapses with no
/// further event.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Record an event at `now`, restarting the window.
    pub fn on_event(&mut self, now: Instant) {
        self.deadline = Some(now + self.window);
    }

    /// True exactly once after the last event's window has elapsed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// True while an event is waiting for its window to elapse.
    pub fn pending(&self) -> bool {
        self.deadline.is_some()
    }
}

// =============================================================================
// Watcher
// =============================================================================

/// A file whose content settled after changing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedFile {
    pub path: PathBuf,
}

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Glob patterns (filename only) a file must match to be watched.
    pub include_patterns: Vec<String>,
    pub poll_interval_ms: u64,
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            include_patterns: constants::WATCH_INCLUDE_PATTERNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            poll_interval_ms: constants::WATCH_POLL_INTERVAL_MS,
            debounce_ms: constants::WATCH_DEBOUNCE_MS,
        }
    }
}

impl WatchConfig {
    /// Defaults overlaid with the Settings-scope "watch.*" keys.
    pub fn from_settings(settings: &crate::core::settings::SettingsView) -> Self {
        use crate::core::settings::Scope;
        let defaults = Self::default();
        Self {
            include_patterns: settings
                .get_list(Scope::Settings, "watch.include")
                .unwrap_or(defaults.include_patterns),
            poll_interval_ms: settings
                .get_int(Scope::Settings, "watch.poll_interval_ms")
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(defaults.poll_interval_ms),
            debounce_ms: settings
                .get_int(Scope::Settings, "watch.debounce_ms")
                .and_then(|n| u64::try_from(n).ok())
                .unwrap_or(defaults.debounce_ms),
        }
    }
}

/// Manages a background directory watcher.
pub struct LogWatcher {
    progress_rx: Option<mpsc::Receiver<ChangedFile>>,
    cancel: Option<CancellationHandle>,
}

impl LogWatcher {
    pub fn new() -> Self {
        Self {
            progress_rx: None,
            cancel: None,
        }
    }

    /// Start watching `root`. An already-running watcher is stopped
    /// first so there is never more than one notification channel.
    pub fn start_watch(&mut self, root: PathBuf, config: WatchConfig) {
        self.stop_watch();

        let cancel = CancellationHandle::new();
        self.cancel = Some(cancel.clone());

        let (tx, rx) = mpsc::channel();
        self.progress_rx = Some(rx);

        std::thread::spawn(move || {
            run_watcher(root, config, tx, cancel);
        });
        tracing::debug!("Log watcher started");
    }

    /// Signal the background thread to stop and drop the channel.
    pub fn stop_watch(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.progress_rx = None;
    }

    /// Drain settled change notifications without blocking.
    pub fn poll_changed(&mut self) -> Vec<ChangedFile> {
        let Some(rx) = &self.progress_rx else {
            return Vec::new();
        };
        let mut changed = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(file) => changed.push(file),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.progress_rx = None;
                    self.cancel = None;
                    break;
                }
            }
        }
        changed
    }
}

impl Default for LogWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Background poll loop: snapshot mtimes, feed changes into per-file
/// debouncers, emit a `ChangedFile` when a file's debounce window fires.
fn run_watcher(
    root: PathBuf,
    config: WatchConfig,
    tx: mpsc::Sender<ChangedFile>,
    cancel: CancellationHandle,
) {
    let include: Vec<Pattern> = config
        .include_patterns
        .iter()
        .filter_map(|p| Pattern::new(p).ok())
        .collect();
    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let cancel_check = Duration::from_millis(constants::WATCH_CANCEL_CHECK_INTERVAL_MS);
    let debounce = Duration::from_millis(config.debounce_ms);

    let mut known: HashMap<PathBuf, DateTime<Utc>> = snapshot(&root, &include);
    let mut debouncers: HashMap<PathBuf, Debouncer> = HashMap::new();

    tracing::debug!(root = %root.display(), files = known.len(), "Log watcher running");

    loop {
        let mut waited = Duration::ZERO;
        // Sleep in small sub-intervals so cancellation is detected
        // promptly; debounce deadlines are also checked at this cadence.
        while waited < poll_interval {
            if cancel.wait_cancelled_timeout(cancel_check) {
                tracing::debug!("Log watcher stopping");
                return;
            }
            waited += cancel_check;

            let now = Instant::now();
            for (path, debouncer) in debouncers.iter_mut() {
                if debouncer.fire(now) && tx.send(ChangedFile { path: path.clone() }).is_err() {
                    return;
                }
            }
        }

        let current = snapshot(&root, &include);
        let now = Instant::now();
        for (path, mtime) in &current {
            let changed = match known.get(path) {
                Some(previous) => previous != mtime,
                None => true,
            };
            if changed {
                debouncers
                    .entry(path.clone())
                    .or_insert_with(|| Debouncer::new(debounce))
                    .on_event(now);
            }
        }
        known = current;
    }
}

/// Current (path -> mtime) map for matching files directly under `root`.
fn snapshot(root: &Path, include: &[Pattern]) -> HashMap<PathBuf, DateTime<Utc>> {
    let mut map = HashMap::new();
    let Ok(dir) = std::fs::read_dir(root) else {
        return map;
    };
    for entry in dir.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if !include.is_empty() && !include.iter().any(|p| p.matches(&name)) {
            continue;
        }
        if let Ok((_, mtime)) = crate::platform::fs::file_fingerprint(&path) {
            map.insert(path, mtime);
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A stream of K events inside the window produces exactly one
    /// firing, and the timer restarts on each event.
    #[test]
    fn test_debouncer_collapses_event_bursts() {
        let window = Duration::from_millis(500);
        let mut debouncer = Debouncer::new(window);
        let t0 = Instant::now();

        for i in 0..5 {
            debouncer.on_event(t0 + Duration::from_millis(i * 100));
        }
        // 400 ms after the last event: still pending.
        assert!(!debouncer.fire(t0 + Duration::from_millis(800)));
        assert!(debouncer.pending());

        // Window elapsed after the LAST event (400 + 500 = 900 ms).
        assert!(debouncer.fire(t0 + Duration::from_millis(900)));

        // Fires once only.
        assert!(!debouncer.fire(t0 + Duration::from_millis(2_000)));
        assert!(!debouncer.pending());
    }

    #[test]
    fn test_debouncer_idle_never_fires() {
        let mut debouncer = Debouncer::new(Duration::from_millis(10));
        assert!(!debouncer.fire(Instant::now() + Duration::from_secs(60)));
    }

    #[test]
    fn test_debouncer_second_round_after_firing() {
        let mut debouncer = Debouncer::new(Duration::from_millis(100));
        let t0 = Instant::now();
        debouncer.on_event(t0);
        assert!(debouncer.fire(t0 + Duration::from_millis(100)));
        // A later event arms it again.
        debouncer.on_event(t0 + Duration::from_millis(500));
        assert!(!debouncer.fire(t0 + Duration::from_millis(550)));
        assert!(debouncer.fire(t0 + Duration::from_millis(600)));
    }

    #[test]
    fn test_snapshot_applies_include_patterns() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("crash-2024.log"), b"x").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let include = vec![Pattern::new("crash-*.log").unwrap()];
        let map = snapshot(dir.path(), &include);
        assert_eq!(map.len(), 1);
        assert!(map
            .keys()
            .next()
            .unwrap()
            .ends_with("crash-2024.log"));
    }

    /// End-to-end over the real filesystem: multiple writes within the
    /// debounce window yield a single notification.
    #[test]
    fn test_watcher_debounces_rapid_writes() {
        let dir = tempfile::TempDir::new().unwrap();
        let log = dir.path().join("crash-live.log");
        std::fs::write(&log, b"initial").unwrap();

        let mut watcher = LogWatcher::new();
        watcher.start_watch(
            dir.path().to_path_buf(),
            WatchConfig {
                include_patterns: vec!["crash-*.log".to_string()],
                poll_interval_ms: 50,
                debounce_ms: 150,
            },
        );

        // Let the watcher take its initial snapshot, then burst-write.
        std::thread::sleep(Duration::from_millis(120));
        for i in 0..3 {
            std::fs::write(&log, format!("content {i}")).unwrap();
            std::thread::sleep(Duration::from_millis(30));
        }

        // Wait out the debounce window plus a couple of poll cycles.
        std::thread::sleep(Duration::from_millis(600));
        let changed = watcher.poll_changed();
        watcher.stop_watch();

        assert_eq!(changed.len(), 1, "burst should collapse to one event: {changed:?}");
        assert_eq!(changed[0].path, log);
    }

    #[test]
    fn test_watch_config_from_settings_overlays_defaults() {
        use crate::core::settings::{Scope, SettingsView};
        use std::collections::HashMap;

        let mut docs = HashMap::new();
        docs.insert(
            Scope::Settings,
            serde_yaml::from_str(
                "watch:\n  debounce_ms: 250\n  include:\n    - 'crash-*.txt'\n",
            )
            .unwrap(),
        );
        let config = WatchConfig::from_settings(&SettingsView::from_documents(docs));
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.include_patterns, vec!["crash-*.txt"]);
        // Untouched keys keep their defaults.
        assert_eq!(config.poll_interval_ms, constants::WATCH_POLL_INTERVAL_MS);
    }

    #[test]
    fn test_watcher_start_stop_without_events() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut watcher = LogWatcher::new();
        watcher.start_watch(dir.path().to_path_buf(), WatchConfig::default());
        assert!(watcher.poll_changed().is_empty());
        watcher.stop_watch();
    }
}
