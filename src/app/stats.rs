// Scanner111 - app/stats.rs
//
// Local scan statistics: an append-only CSV table recording one row per
// completed analysis. Gives the interactive mode and support threads a
// cheap answer to "how often does this setup crash and why".

use crate::core::model::{OrchestrationResult, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One statistics row. Field names become the CSV header.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanRecord {
    pub timestamp: DateTime<Utc>,
    pub log_file_path: PathBuf,
    pub game_type: String,
    pub total_issues_found: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
    pub processing_time_ms: u64,
    pub was_solved: bool,
    pub primary_issue_type: String,
}

impl ScanRecord {
    /// Build a record from one orchestration outcome. `input_path` is
    /// used when the outcome carries no parsed log (cache-served runs).
    pub fn from_outcome(outcome: &OrchestrationResult, input_path: &Path) -> Self {
        let mut critical = 0usize;
        let mut warning = 0usize;
        let mut info = 0usize;
        let mut primary: Option<(Severity, String)> = None;

        for result in &outcome.results {
            match result.severity {
                Severity::Critical => critical += 1,
                Severity::Error | Severity::Warning => warning += 1,
                Severity::Info => info += 1,
                Severity::None => {}
            }
            if result.has_findings
                && primary
                    .as_ref()
                    .is_none_or(|(worst, _)| result.severity > *worst)
            {
                primary = Some((result.severity, result.analyzer_name.clone()));
            }
        }

        let (log_file_path, game_type) = match &outcome.parsed_log {
            Some(log) => (log.path.clone(), log.game_name().to_string()),
            None => (
                input_path.to_path_buf(),
                crate::util::constants::UNKNOWN.to_string(),
            ),
        };

        Self {
            timestamp: Utc::now(),
            log_file_path,
            game_type,
            total_issues_found: outcome
                .results
                .iter()
                .filter(|r| r.has_findings)
                .count(),
            critical,
            warning,
            info,
            processing_time_ms: outcome.duration.as_millis() as u64,
            was_solved: false,
            primary_issue_type: primary.map(|(_, name)| name).unwrap_or_default(),
        }
    }
}

/// Append-only CSV store.
pub struct StatsStore {
    path: PathBuf,
}

impl StatsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, writing the header on first use.
    pub fn append(&self, record: &ScanRecord) -> Result<(), String> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("cannot create stats directory: {e}"))?;
        }
        let exists = self.path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| format!("cannot open stats file '{}': {e}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(!exists)
            .from_writer(file);
        writer
            .serialize(record)
            .map_err(|e| format!("cannot write stats record: {e}"))?;
        writer
            .flush()
            .map_err(|e| format!("cannot flush stats file: {e}"))?;
        Ok(())
    }

    /// All stored records; unreadable rows are skipped.
    pub fn load_all(&self) -> Vec<ScanRecord> {
        let Ok(mut reader) = csv::Reader::from_path(&self.path) else {
            return Vec::new();
        };
        reader
            .deserialize::<ScanRecord>()
            .filter_map(|row| {
                row.map_err(|e| tracing::debug!(error = %e, "Skipping bad stats row"))
                    .ok()
            })
            .collect()
    }

    /// (total scans, scans with critical findings, most frequent primary
    /// issue type).
    pub fn summary(&self) -> (usize, usize, Option<String>) {
        let records = self.load_all();
        let total = records.len();
        let with_critical = records.iter().filter(|r| r.critical > 0).count();

        let mut counts: std::collections::HashMap<&str, usize> =
            std::collections::HashMap::new();
        for record in &records {
            if !record.primary_issue_type.is_empty() {
                *counts.entry(record.primary_issue_type.as_str()).or_insert(0) += 1;
            }
        }
        let most_common = counts
            .into_iter()
            .max_by_key(|(_, count)| *count)
            .map(|(name, _)| name.to_string());
        (total, with_critical, most_common)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fragment::ReportFragment;
    use crate::core::model::AnalysisResult;
    use std::sync::Arc;
    use std::time::Duration;

    fn outcome() -> OrchestrationResult {
        let mut results = vec![
            AnalysisResult::ok(
                "suspects",
                ReportFragment::critical("MemoryError", "out of memory"),
            ),
            AnalysisResult::ok(
                "plugins",
                ReportFragment::warning("Suspect", "bad plugin"),
            ),
        ];
        results[0].duration = Duration::from_millis(5);
        OrchestrationResult {
            results,
            parsed_log: Some(Arc::new(crate::core::model::ParsedCrashLog {
                path: PathBuf::from("/logs/crash-1.log"),
                game_version: "Fallout 4 v1.10.163".to_string(),
                ..Default::default()
            })),
            shared_data: Default::default(),
            duration: Duration::from_millis(42),
            was_cancelled: false,
        }
    }

    #[test]
    fn test_record_from_outcome() {
        let record = ScanRecord::from_outcome(&outcome(), Path::new("/logs/crash-1.log"));
        assert_eq!(record.game_type, "Fallout 4");
        assert_eq!(record.total_issues_found, 2);
        assert_eq!(record.critical, 1);
        assert_eq!(record.warning, 1);
        assert_eq!(record.processing_time_ms, 42);
        // The worst finding names the primary issue type.
        assert_eq!(record.primary_issue_type, "suspects");
    }

    #[test]
    fn test_append_and_load_round_trip() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StatsStore::new(dir.path().join("statistics.csv"));
        let record = ScanRecord::from_outcome(&outcome(), Path::new("/logs/crash-1.log"));

        store.append(&record).unwrap();
        store.append(&record).unwrap();

        let loaded = store.load_all();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].game_type, "Fallout 4");

        // Header appears exactly once.
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches("logFilePath").count(), 1);
    }

    #[test]
    fn test_summary_counts() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = StatsStore::new(dir.path().join("statistics.csv"));
        store.append(&ScanRecord::from_outcome(&outcome(), Path::new("/logs/crash-1.log"))).unwrap();

        let (total, with_critical, most_common) = store.summary();
        assert_eq!(total, 1);
        assert_eq!(with_critical, 1);
        assert_eq!(most_common, Some("suspects".to_string()));
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let store = StatsStore::new(PathBuf::from("/nonexistent/stats.csv"));
        assert!(store.load_all().is_empty());
        assert_eq!(store.summary().0, 0);
    }
}
