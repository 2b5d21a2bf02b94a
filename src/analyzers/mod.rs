// Scanner111 - analyzers/mod.rs
//
// The analyzer contract and the registry of built-in analyzers.
//
// Analyzers are known at build time and wired explicitly in
// register_builtin_analyzers(); there is no filesystem discovery and no
// runtime plugin loading. Each analyzer is re-entrant, may run
// concurrently with the others over the same context, and reports its
// own failures inside the returned AnalysisResult instead of unwinding.

use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult};
use crate::util::error::{ConfigError, ScanError};
use std::sync::Arc;

pub mod conflicts;
pub mod environment;
pub mod form_ids;
pub mod game_integrity;
pub mod paths;
pub mod plugin_limit;
pub mod plugins;
pub mod records;
pub mod settings_check;
pub mod suspects;

/// Contract every analyzer implements.
///
/// Rules the orchestrator relies on:
/// - `analyze` must honour `ctx.cancellation` and return a Skipped result
///   once cancellation is observed.
/// - `analyze` must not mutate the parsed log and may write to
///   `ctx.shared_data` under a single agreed key only.
/// - No blocking I/O beyond files the log references; no network.
/// - Errors are converted into a FailedWithError result; a panic is a
///   contract violation that the orchestrator converts on the caller's
///   side.
pub trait Analyzer: Send + Sync {
    /// Stable registry name (lowercase kebab-case).
    fn name(&self) -> &'static str;

    /// Higher runs earlier when a serial order is required, and sorts
    /// first in the composed report.
    fn priority(&self) -> i32 {
        0
    }

    /// Analysis kinds this analyzer participates in.
    fn supported_kinds(&self) -> &'static [AnalysisKind];

    /// Run the analysis. Called from a worker thread.
    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult;

    /// Convenience: whether this analyzer runs for `kind`.
    fn supports(&self, kind: AnalysisKind) -> bool {
        self.supported_kinds().contains(&kind)
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Process-wide analyzer registry, populated once at startup.
#[derive(Default)]
pub struct AnalyzerRegistry {
    analyzers: Vec<Arc<dyn Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an analyzer. Names are unique case-insensitively;
    /// a duplicate is a configuration error.
    pub fn register(&mut self, analyzer: Arc<dyn Analyzer>) -> Result<(), ScanError> {
        if self
            .analyzers
            .iter()
            .any(|a| a.name().eq_ignore_ascii_case(analyzer.name()))
        {
            return Err(ConfigError::DuplicateAnalyzer {
                name: analyzer.name().to_string(),
            }
            .into());
        }
        tracing::debug!(analyzer = analyzer.name(), "Analyzer registered");
        self.analyzers.push(analyzer);
        Ok(())
    }

    /// All registered analyzers in registration order.
    pub fn all(&self) -> &[Arc<dyn Analyzer>] {
        &self.analyzers
    }

    /// Case-insensitive lookup by name.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Analyzer>> {
        self.analyzers
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Analyzers participating in `kind`.
    pub fn for_kind(&self, kind: AnalysisKind) -> Vec<Arc<dyn Analyzer>> {
        self.analyzers
            .iter()
            .filter(|a| a.supports(kind))
            .cloned()
            .collect()
    }
}

/// Construct the registry with every built-in analyzer.
///
/// The expects are unreachable: built-in names are distinct by
/// construction and the duplicate check is the only failure mode.
pub fn register_builtin_analyzers() -> AnalyzerRegistry {
    let mut registry = AnalyzerRegistry::new();
    let builtins: Vec<Arc<dyn Analyzer>> = vec![
        Arc::new(suspects::SuspectScannerAnalyzer),
        Arc::new(form_ids::FormIdAnalyzer),
        Arc::new(plugin_limit::PluginLimitAnalyzer),
        Arc::new(plugins::PluginAnalyzer),
        Arc::new(conflicts::ModConflictAnalyzer),
        Arc::new(conflicts::ImportantModsAnalyzer),
        Arc::new(environment::GpuAnalyzer),
        Arc::new(records::RecordScannerAnalyzer),
        Arc::new(environment::ModDetectionAnalyzer),
        Arc::new(settings_check::SettingsAnalyzer),
        Arc::new(paths::PathValidationAnalyzer),
        Arc::new(game_integrity::GameIntegrityAnalyzer),
        Arc::new(paths::DocumentsPathAnalyzer),
        Arc::new(environment::ModFileScanAnalyzer),
    ];
    for analyzer in builtins {
        registry
            .register(analyzer)
            .expect("built-in analyzer names are unique");
    }
    registry
}

// =============================================================================
// Test helpers shared by the analyzer modules
// =============================================================================

#[cfg(test)]
pub(crate) mod testutil {
    use crate::core::model::{AnalysisContext, AnalysisKind, ParsedCrashLog};
    use crate::core::settings::{Scope, SettingsView};
    use crate::util::cancel::CancellationHandle;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Context over a log with empty settings.
    pub fn context(log: ParsedCrashLog) -> AnalysisContext {
        context_with_settings(log, SettingsView::empty())
    }

    /// Context over a log with a Game-scope settings document.
    pub fn context_with_game_yaml(log: ParsedCrashLog, yaml: &str) -> AnalysisContext {
        let mut docs = HashMap::new();
        docs.insert(Scope::Game, serde_yaml::from_str(yaml).expect("test yaml"));
        context_with_settings(log, SettingsView::from_documents(docs))
    }

    pub fn context_with_settings(log: ParsedCrashLog, settings: SettingsView) -> AnalysisContext {
        AnalysisContext::new(
            Arc::new(log),
            Arc::new(settings),
            AnalysisKind::CrashLog,
            CancellationHandle::new(),
        )
    }

    /// A minimal plugin load order.
    pub fn log_with_plugins(plugins: &[(&str, &str)]) -> ParsedCrashLog {
        ParsedCrashLog {
            plugins: plugins
                .iter()
                .map(|(n, t)| ((*n).to_string(), (*t).to_string()))
                .collect(),
            ..Default::default()
        }
    }
}
