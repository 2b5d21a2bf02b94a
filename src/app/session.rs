// Scanner111 - app/session.rs
//
// Session persistence: each analysis run can be recorded as one JSON
// file under the sessions directory, and two sessions over the same log
// can be compared to see which issues appeared or went away.
//
// Design principles:
// - Sessions are saved atomically (write temp, rename) so a crash during
//   save never corrupts an existing session.
// - Load errors are silently discarded; a corrupt or version-mismatched
//   session simply does not participate in history.

use crate::core::fragment::ReportFragment;
use crate::core::model::{AnalysisResult, Severity};
use crate::util::constants;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// One recorded analysis session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Schema version — must equal `constants::SESSION_VERSION`.
    pub version: u32,

    pub id: Uuid,

    pub log_file: PathBuf,

    /// ISO-8601 UTC via chrono's serde impl.
    pub start_time: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Total processing time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,

    pub results: Vec<AnalysisResult>,
}

impl SessionData {
    /// New session for one run.
    pub fn new(log_file: PathBuf, results: Vec<AnalysisResult>) -> Self {
        Self {
            version: constants::SESSION_VERSION,
            id: Uuid::new_v4(),
            log_file,
            start_time: Utc::now(),
            end_time: None,
            duration: None,
            results,
        }
    }

    /// Titles of the findings this session surfaced (severity warning or
    /// worse). This is the identity used by session comparison.
    pub fn issue_titles(&self) -> Vec<String> {
        let mut titles = Vec::new();
        for result in &self.results {
            if let Some(fragment) = &result.fragment {
                collect_issue_titles(fragment, &mut titles);
            }
        }
        titles.sort();
        titles.dedup();
        titles
    }
}

fn collect_issue_titles(fragment: &ReportFragment, out: &mut Vec<String>) {
    match fragment {
        ReportFragment::Empty => {}
        ReportFragment::Leaf { title, .. } => {
            if fragment.severity() >= Severity::Warning {
                if let Some(title) = title {
                    out.push(title.clone());
                }
            }
        }
        ReportFragment::Node { children, .. } => {
            for child in children {
                collect_issue_titles(child, out);
            }
        }
    }
}

// =============================================================================
// Comparison
// =============================================================================

/// Difference between two sessions over the same log.
///
/// Issues are keyed by title alone, matching the historical behaviour;
/// a sharper key would be (analyzer_name, title).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionComparison {
    pub new_issues: Vec<String>,
    pub resolved_issues: Vec<String>,
}

/// Compare an older session against a newer one.
pub fn compare(older: &SessionData, newer: &SessionData) -> SessionComparison {
    let before = older.issue_titles();
    let after = newer.issue_titles();
    SessionComparison {
        new_issues: after
            .iter()
            .filter(|t| !before.contains(t))
            .cloned()
            .collect(),
        resolved_issues: before
            .iter()
            .filter(|t| !after.contains(t))
            .cloned()
            .collect(),
    }
}

// =============================================================================
// I/O
// =============================================================================

/// File path for a session inside `sessions_dir`.
pub fn session_path(sessions_dir: &Path, id: Uuid) -> PathBuf {
    sessions_dir.join(format!("{id}.json"))
}

/// Save a session atomically. Returns the file path written.
pub fn save(data: &SessionData, sessions_dir: &Path) -> Result<PathBuf, String> {
    let path = session_path(sessions_dir, data.id);
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| format!("failed to serialise session: {e}"))?;
    crate::platform::fs::write_atomic(&path, json.as_bytes())
        .map_err(|e| format!("failed to write session '{}': {e}", path.display()))?;
    tracing::debug!(path = %path.display(), "Session saved");
    Ok(path)
}

/// Load and validate a session.
///
/// Returns None on any error (missing file, parse failure, version
/// mismatch); the caller treats None as "no session".
pub fn load(path: &Path) -> Option<SessionData> {
    let content = std::fs::read_to_string(path).ok()?;
    let data: SessionData = serde_json::from_str(&content)
        .map_err(|e| {
            tracing::warn!(path = %path.display(), error = %e, "Malformed session file ignored");
        })
        .ok()?;
    if data.version != constants::SESSION_VERSION {
        tracing::warn!(
            found = data.version,
            expected = constants::SESSION_VERSION,
            "Session version mismatch ignored"
        );
        return None;
    }
    Some(data)
}

/// Most recent session recorded for one log file, if any.
pub fn latest_for_log(sessions_dir: &Path, log_file: &Path) -> Option<SessionData> {
    list(sessions_dir)
        .into_iter()
        .find(|s| s.log_file == log_file)
}

/// All loadable sessions under `sessions_dir`, newest first.
pub fn list(sessions_dir: &Path) -> Vec<SessionData> {
    let mut sessions: Vec<SessionData> = std::fs::read_dir(sessions_dir)
        .into_iter()
        .flatten()
        .flatten()
        .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("json"))
        .filter_map(|e| load(&e.path()))
        .collect();
    sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
    sessions
}
