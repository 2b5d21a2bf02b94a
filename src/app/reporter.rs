// Scanner111 - app/reporter.rs
//
// Progress reporting seam. The orchestrator announces run and analyzer
// lifecycle events through a Reporter handle instead of writing to a
// process-wide channel, so the CLI renders progress, quiet runs use the
// null reporter, and tests substitute a recording implementation.

use crate::core::model::{AnalysisStatus, Severity};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Lifecycle observer for one orchestration run.
///
/// Implementations must be cheap and thread-safe; analyzer events
/// arrive concurrently from the worker pool.
pub trait Reporter: Send + Sync {
    fn run_started(&self, _path: &Path, _analyzer_count: usize) {}
    fn analyzer_started(&self, _name: &str) {}
    fn analyzer_finished(&self, _name: &str, _status: AnalysisStatus, _severity: Severity) {}
    fn run_finished(&self, _duration: Duration, _was_cancelled: bool) {}
}

/// Discards every event (library use, --no-progress).
pub struct NullReporter;

impl Reporter for NullReporter {}

/// Writes one line per event to stderr, keeping stdout clean for the
/// report itself.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn run_started(&self, path: &Path, analyzer_count: usize) {
        eprintln!("analysing {} with {analyzer_count} analyzer(s)", path.display());
    }

    fn analyzer_finished(&self, name: &str, status: AnalysisStatus, severity: Severity) {
        match status {
            AnalysisStatus::Ok if severity >= Severity::Warning => {
                eprintln!("  {name}: {severity}");
            }
            AnalysisStatus::FailedWithError => eprintln!("  {name}: failed"),
            _ => {}
        }
    }

    fn run_finished(&self, duration: Duration, was_cancelled: bool) {
        if was_cancelled {
            eprintln!("analysis cancelled after {} ms", duration.as_millis());
        }
    }
}

/// Records every event for assertions in tests.
#[derive(Default)]
pub struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn record(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }
}

impl Reporter for RecordingReporter {
    fn run_started(&self, path: &Path, analyzer_count: usize) {
        self.record(format!("run_started {} {analyzer_count}", path.display()));
    }

    fn analyzer_started(&self, name: &str) {
        self.record(format!("analyzer_started {name}"));
    }

    fn analyzer_finished(&self, name: &str, status: AnalysisStatus, _severity: Severity) {
        self.record(format!("analyzer_finished {name} {status:?}"));
    }

    fn run_finished(&self, duration: Duration, was_cancelled: bool) {
        self.record(format!(
            "run_finished {}ms cancelled={was_cancelled}",
            duration.as_millis()
        ));
    }
}
