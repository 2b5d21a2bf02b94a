// Scanner111 - core/model.rs
//
// Core data model types shared across all layers: the normalised crash
// log, the per-run analysis context, analyzer results, and the on-disk
// cache entry shape.

use crate::util::cancel::CancellationHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::core::fragment::ReportFragment;
use crate::core::settings::SettingsView;

// =============================================================================
// Severity
// =============================================================================

/// Finding severity, ordered least to most severe so `Ord::max` picks the
/// worst finding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            Severity::None => "None",
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// =============================================================================
// Analysis kind
// =============================================================================

/// Selects which analyzers participate in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    /// Diagnose a single crash log (the default pipeline).
    CrashLog,
    /// Verify game installation integrity (FCX mode).
    FileIntegrity,
    /// Scan mod staging folders for problem files.
    ModScan,
}

impl AnalysisKind {
    /// Parse a CLI/settings spelling. Accepts the kebab-case serde names.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "crash-log" | "crashlog" => Some(Self::CrashLog),
            "file-integrity" | "fcx" => Some(Self::FileIntegrity),
            "mod-scan" | "modscan" => Some(Self::ModScan),
            _ => None,
        }
    }
}

// =============================================================================
// Parsed crash log
// =============================================================================

/// The normalised form of one crash log, immutable after parsing.
///
/// Every line from the source file belongs to at most one of: the main
/// error paragraph, the call stack, one named segment, or the plugin table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedCrashLog {
    /// Canonical absolute path of the source file.
    pub path: PathBuf,

    /// Original lines, 1-based indexed by position, trailing whitespace
    /// trimmed.
    pub raw_lines: Vec<String>,

    /// Game version string from the log header ("UNKNOWN" if absent).
    pub game_version: String,

    /// Crash generator name, e.g. "Buffout 4" ("UNKNOWN" if absent).
    pub crashgen_name: String,

    /// Crash generator version ("UNKNOWN" if absent).
    pub crashgen_version: String,

    /// Multi-line main error text ("UNKNOWN" if absent).
    pub main_error: String,

    /// Lines under the "PROBABLE CALL STACK:" header.
    pub call_stack: Vec<String>,

    /// Plugin table in load order: (filename, load-order token).
    /// Tokens are either a 2-hex index ("00".."FE") or a light slot
    /// ("FE:xxx"). Storage is case-preserving; lookups are
    /// case-insensitive; duplicates overwrite in place.
    pub plugins: Vec<(String, String)>,

    /// Remaining named segments keyed by their canonical header.
    pub other_segments: BTreeMap<String, Vec<String>>,
}

impl ParsedCrashLog {
    /// Case-insensitive lookup of a plugin's load-order token.
    pub fn plugin_token(&self, name: &str) -> Option<&str> {
        self.plugins
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, t)| t.as_str())
    }

    /// Find the plugin owning a full load-order byte (e.g. 0x14 -> "14").
    ///
    /// Light plugins all share the FE index and are not resolvable from a
    /// single prefix byte, so FE returns None.
    pub fn plugin_for_load_byte(&self, byte: u8) -> Option<&str> {
        if byte == 0xFE {
            return None;
        }
        let token = format!("{byte:02X}");
        self.plugins
            .iter()
            .find(|(_, t)| *t == token)
            .map(|(n, _)| n.as_str())
    }

    /// Number of full (non-light) plugins in the load order.
    pub fn full_plugin_count(&self) -> usize {
        self.plugins
            .iter()
            .filter(|(_, t)| !t.starts_with("FE:"))
            .count()
    }

    /// Number of light (FE-slot) plugins in the load order.
    pub fn light_plugin_count(&self) -> usize {
        self.plugins
            .iter()
            .filter(|(_, t)| t.starts_with("FE:"))
            .count()
    }

    /// Game display name derived from the version header, e.g.
    /// "Fallout 4 v1.10.163" -> "Fallout 4". "UNKNOWN" when absent.
    pub fn game_name(&self) -> &str {
        match self.game_version.rfind(" v") {
            Some(pos) => &self.game_version[..pos],
            None => &self.game_version,
        }
    }

    /// Lines of every script-extender plugin segment ("F4SE PLUGINS:",
    /// "SKSE PLUGINS:", ...), where crash generators list loaded DLLs.
    pub fn xse_plugin_lines(&self) -> impl Iterator<Item = &String> {
        self.other_segments
            .iter()
            .filter(|(header, _)| header.ends_with(" PLUGINS:"))
            .flat_map(|(_, lines)| lines.iter())
    }

    /// True when `name` appears in the plugin table or any
    /// script-extender plugin line (case-insensitive).
    pub fn mod_present(&self, name: &str) -> bool {
        if self.plugin_token(name).is_some() {
            return true;
        }
        let needle = name.to_lowercase();
        self.xse_plugin_lines()
            .any(|line| line.to_lowercase().contains(&needle))
    }
}

// =============================================================================
// Analysis context
// =============================================================================

/// Per-run state shared across analyzers.
///
/// The orchestrator owns the context for the duration of one run;
/// analyzers borrow it and must not retain references.
pub struct AnalysisContext {
    /// The parsed log under analysis.
    pub parsed_log: Arc<ParsedCrashLog>,

    /// Read-only keyed settings lookup.
    pub settings: Arc<SettingsView>,

    /// Which pipeline this run belongs to.
    pub analysis_kind: AnalysisKind,

    /// Cooperative cancellation handle, polled by analyzers.
    pub cancellation: CancellationHandle,

    /// Cross-analyzer scratch facts (e.g. detected GPU vendor).
    /// Single writer per key by convention.
    shared_data: Mutex<HashMap<String, String>>,
}

impl AnalysisContext {
    pub fn new(
        parsed_log: Arc<ParsedCrashLog>,
        settings: Arc<SettingsView>,
        analysis_kind: AnalysisKind,
        cancellation: CancellationHandle,
    ) -> Self {
        Self {
            parsed_log,
            settings,
            analysis_kind,
            cancellation,
            shared_data: Mutex::new(HashMap::new()),
        }
    }

    /// Publish a cross-analyzer fact. Each key is written at most once by
    /// convention; a second write wins but is logged at Warn.
    pub fn set_shared(&self, key: &str, value: impl Into<String>) {
        let mut data = self
            .shared_data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(old) = data.insert(key.to_string(), value.into()) {
            tracing::warn!(key, previous = %old, "shared_data key overwritten");
        }
    }

    /// Read a cross-analyzer fact. Analyzers must handle absent keys;
    /// ordering between analyzers is not guaranteed.
    pub fn get_shared(&self, key: &str) -> Option<String> {
        let data = self
            .shared_data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        data.get(key).cloned()
    }

    /// Snapshot of every published fact, taken by the orchestrator after
    /// all analyzers settle (persisted as cache scratch).
    pub fn shared_snapshot(&self) -> BTreeMap<String, String> {
        let data = self
            .shared_data
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        data.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

// =============================================================================
// Analysis result
// =============================================================================

/// Terminal state of one analyzer invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisStatus {
    /// The analyzer ran to completion (findings or not).
    Ok,
    /// The analyzer hit an error; `errors` carries the diagnostics.
    FailedWithError,
    /// The analyzer observed cancellation or did not apply to the input.
    Skipped,
}

/// One analyzer's output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analyzer_name: String,

    /// Wall-clock time spent inside the analyzer.
    pub duration: Duration,

    pub status: AnalysisStatus,

    /// Worst severity among the findings.
    pub severity: Severity,

    /// False still permits a "no issues" note in the fragment.
    pub has_findings: bool,

    /// Report fragment; absent when status != Ok.
    pub fragment: Option<ReportFragment>,

    /// Textual diagnostics accumulated while running.
    pub errors: Vec<String>,

    /// Free-form pairs (version, timestamp, recommendation).
    pub metadata: BTreeMap<String, String>,
}

impl AnalysisResult {
    /// Successful result carrying a fragment. Severity and has_findings
    /// are derived from the fragment.
    pub fn ok(analyzer_name: &str, fragment: ReportFragment) -> Self {
        let severity = fragment.severity();
        let has_findings = severity > Severity::Info && fragment.has_content();
        Self {
            analyzer_name: analyzer_name.to_string(),
            duration: Duration::ZERO,
            status: AnalysisStatus::Ok,
            severity,
            has_findings,
            fragment: Some(fragment),
            errors: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    /// Failed result with diagnostics and no fragment.
    pub fn failed(analyzer_name: &str, errors: Vec<String>) -> Self {
        Self {
            analyzer_name: analyzer_name.to_string(),
            duration: Duration::ZERO,
            status: AnalysisStatus::FailedWithError,
            severity: Severity::Error,
            has_findings: false,
            fragment: None,
            errors,
            metadata: BTreeMap::new(),
        }
    }

    /// Skipped result (cancellation or not applicable).
    pub fn skipped(analyzer_name: &str) -> Self {
        Self {
            analyzer_name: analyzer_name.to_string(),
            duration: Duration::ZERO,
            status: AnalysisStatus::Skipped,
            severity: Severity::None,
            has_findings: false,
            fragment: None,
            errors: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Orchestration result
// =============================================================================

/// Aggregated output of one orchestrator run.
#[derive(Debug, Clone)]
pub struct OrchestrationResult {
    /// Results in deterministic order: (priority desc, name asc).
    pub results: Vec<AnalysisResult>,

    /// The parsed log the analyzers ran over; None when parsing itself
    /// failed and the run carries a single synthetic orchestrator result.
    pub parsed_log: Option<Arc<ParsedCrashLog>>,

    /// Facts the analyzers published to shared_data during the run.
    pub shared_data: BTreeMap<String, String>,

    /// Wall-clock duration of the whole run.
    pub duration: Duration,

    /// True when cancellation was observed before or during the run.
    pub was_cancelled: bool,
}

impl OrchestrationResult {
    /// Worst severity across all results.
    pub fn max_severity(&self) -> Severity {
        self.results
            .iter()
            .map(|r| r.severity)
            .max()
            .unwrap_or(Severity::None)
    }

    /// True when any analyzer failed.
    pub fn any_failed(&self) -> bool {
        self.results
            .iter()
            .any(|r| r.status == AnalysisStatus::FailedWithError)
    }
}

// =============================================================================
// Cache entry (on-disk shape)
// =============================================================================

/// One incremental-cache entry, persisted as a single JSON file.
///
/// Field names are camelCase on disk; a `version` mismatch deletes the
/// entry on load rather than attempting migration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAnalysisState {
    /// Schema version; see `constants::CACHE_VERSION`.
    pub version: u32,

    /// Canonical path of the analysed file.
    pub path: PathBuf,

    /// Base64-encoded SHA-256 over the newline-joined normalised lines.
    pub content_hash: String,

    /// Source file mtime at analysis time.
    pub last_modified: DateTime<Utc>,

    /// Source file size in bytes at analysis time.
    pub file_size: u64,

    /// The analyzer results produced for this content.
    pub cached_results: Vec<AnalysisResult>,

    /// When the analysis ran.
    pub last_analyzed: DateTime<Utc>,

    /// Per-analyzer scratch values carried between runs.
    #[serde(default)]
    pub analyzer_scratch: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log() -> ParsedCrashLog {
        ParsedCrashLog {
            plugins: vec![
                ("Fallout4.esm".to_string(), "00".to_string()),
                ("DLCRobot.esm".to_string(), "01".to_string()),
                ("RedRocketsGlareII.esl".to_string(), "FE:000".to_string()),
            ],
            game_version: "Fallout 4 v1.10.163".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_plugin_token_lookup_is_case_insensitive() {
        let log = sample_log();
        assert_eq!(log.plugin_token("dlcrobot.esm"), Some("01"));
        assert_eq!(log.plugin_token("DLCROBOT.ESM"), Some("01"));
        assert_eq!(log.plugin_token("Missing.esp"), None);
    }

    #[test]
    fn test_plugin_for_load_byte() {
        let log = sample_log();
        assert_eq!(log.plugin_for_load_byte(0x01), Some("DLCRobot.esm"));
        assert_eq!(log.plugin_for_load_byte(0x7F), None);
        // FE is the shared light-plugin index, never resolvable by byte.
        assert_eq!(log.plugin_for_load_byte(0xFE), None);
    }

    #[test]
    fn test_full_and_light_plugin_counts() {
        let log = sample_log();
        assert_eq!(log.full_plugin_count(), 2);
        assert_eq!(log.light_plugin_count(), 1);
    }

    #[test]
    fn test_game_name_strips_version_suffix() {
        let log = sample_log();
        assert_eq!(log.game_name(), "Fallout 4");

        let unknown = ParsedCrashLog {
            game_version: "UNKNOWN".to_string(),
            ..Default::default()
        };
        assert_eq!(unknown.game_name(), "UNKNOWN");
    }

    #[test]
    fn test_mod_present_covers_table_and_xse_segments() {
        let mut log = sample_log();
        log.other_segments.insert(
            "F4SE PLUGINS:".to_string(),
            vec!["\tBuffout4.dll v1.28.6".to_string()],
        );
        log.other_segments
            .insert("MODULES:".to_string(), vec!["\tshould-not-match.dll".to_string()]);

        assert!(log.mod_present("dlcrobot.esm"));
        assert!(log.mod_present("Buffout4.dll"));
        // Only "* PLUGINS:" segments participate.
        assert!(!log.mod_present("should-not-match.dll"));
        assert_eq!(log.xse_plugin_lines().count(), 1);
    }

    #[test]
    fn test_severity_orders_least_to_most_severe() {
        assert!(Severity::None < Severity::Info);
        assert!(Severity::Info < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Critical);
    }

    #[test]
    fn test_shared_data_single_writer_then_read() {
        let ctx = AnalysisContext::new(
            Arc::new(ParsedCrashLog::default()),
            Arc::new(SettingsView::empty()),
            AnalysisKind::CrashLog,
            CancellationHandle::new(),
        );
        assert_eq!(ctx.get_shared("gpu_vendor"), None);
        ctx.set_shared("gpu_vendor", "NVIDIA");
        assert_eq!(ctx.get_shared("gpu_vendor"), Some("NVIDIA".to_string()));
        // Last writer wins on a convention violation.
        ctx.set_shared("gpu_vendor", "AMD");
        assert_eq!(ctx.get_shared("gpu_vendor"), Some("AMD".to_string()));
    }

    #[test]
    fn test_analysis_kind_parse() {
        assert_eq!(AnalysisKind::parse("crash-log"), Some(AnalysisKind::CrashLog));
        assert_eq!(AnalysisKind::parse("FCX"), Some(AnalysisKind::FileIntegrity));
        assert_eq!(AnalysisKind::parse("mod-scan"), Some(AnalysisKind::ModScan));
        assert_eq!(AnalysisKind::parse("bogus"), None);
    }
}
