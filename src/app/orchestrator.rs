// Scanner111 - app/orchestrator.rs
//
// Runs a selected set of analyzers over one crash log and aggregates
// their results. Analyzers execute in parallel on a bounded rayon pool;
// per-analyzer failures (including panics) are isolated into their own
// result and never abort the run.

use crate::analyzers::{Analyzer, AnalyzerRegistry};
use crate::app::reporter::{NullReporter, Reporter};
use crate::core::model::{
    AnalysisContext, AnalysisKind, AnalysisResult, OrchestrationResult, ParsedCrashLog,
};
use crate::core::parser::{self, ParserConfig};
use crate::core::settings::{Scope, SettingsView};
use crate::util::cancel::CancellationHandle;
use crate::util::constants;
use crate::util::error::{ConfigError, ScanError};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

/// One orchestration request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub input_path: PathBuf,
    pub analysis_kind: AnalysisKind,
    /// Explicit analyzer names; None runs everything supporting the kind.
    pub selected_analyzers: Option<Vec<String>>,
    pub cancellation: CancellationHandle,
}

impl AnalysisRequest {
    pub fn new(input_path: PathBuf, analysis_kind: AnalysisKind) -> Self {
        Self {
            input_path,
            analysis_kind,
            selected_analyzers: None,
            cancellation: CancellationHandle::new(),
        }
    }
}

/// Clamp the configured parallelism to the supported range, defaulting
/// to the machine's core count.
pub fn effective_parallelism(configured: Option<i64>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(constants::MIN_PARALLEL_ANALYZERS);
    let requested = configured
        .and_then(|n| usize::try_from(n).ok())
        .unwrap_or(cores);
    requested.clamp(
        constants::MIN_PARALLEL_ANALYZERS,
        constants::MAX_PARALLEL_ANALYZERS,
    )
}

pub struct Orchestrator {
    registry: Arc<AnalyzerRegistry>,
    settings: Arc<SettingsView>,
    reporter: Arc<dyn Reporter>,
    max_parallel: usize,
}

impl Orchestrator {
    /// Build an orchestrator. Parallelism comes from the settings key
    /// "max_parallel" (Settings scope), clamped to [1, 10].
    pub fn new(registry: Arc<AnalyzerRegistry>, settings: Arc<SettingsView>) -> Self {
        let max_parallel =
            effective_parallelism(settings.get_int(Scope::Settings, "max_parallel"));
        Self {
            registry,
            settings,
            reporter: Arc::new(NullReporter),
            max_parallel,
        }
    }

    /// Attach a progress reporter (console output, test recording).
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// The settings view this orchestrator runs with.
    pub fn settings(&self) -> &Arc<SettingsView> {
        &self.settings
    }

    /// Override the pool size (CLI --max-parallel flag).
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.clamp(
            constants::MIN_PARALLEL_ANALYZERS,
            constants::MAX_PARALLEL_ANALYZERS,
        );
        self
    }

    /// Run one analysis.
    ///
    /// Parser failures after the path check are surfaced as a single
    /// synthetic "orchestrator" result so the caller still receives a
    /// renderable report; a missing input file is the caller's error and
    /// propagates as NotFound.
    pub fn run_analysis(&self, request: &AnalysisRequest) -> Result<OrchestrationResult, ScanError> {
        let started = Instant::now();

        let parser_config = ParserConfig {
            xse_acronym: self
                .settings
                .get_string_or(Scope::Game, "xse_acronym", "F4SE"),
        };

        let parsed = match parser::parse(&request.input_path, &parser_config) {
            Ok(parsed) => Arc::new(parsed),
            Err(e @ ScanError::NotFound { .. }) => return Err(e),
            Err(e) => {
                tracing::error!(error = %e, "Parsing failed before any analyzer ran");
                return Ok(OrchestrationResult {
                    results: vec![AnalysisResult::failed("orchestrator", vec![e.to_string()])],
                    parsed_log: None,
                    shared_data: Default::default(),
                    duration: started.elapsed(),
                    was_cancelled: request.cancellation.is_cancelled(),
                });
            }
        };

        self.run_over_parsed(request, parsed, started)
    }

    /// Run the analyzers over an already-parsed log (the incremental
    /// cache path, where the lines were read and hashed by the caller).
    pub fn run_over_parsed(
        &self,
        request: &AnalysisRequest,
        parsed: Arc<ParsedCrashLog>,
        started: Instant,
    ) -> Result<OrchestrationResult, ScanError> {
        let analyzers = self.select_analyzers(request)?;
        let context = AnalysisContext::new(
            Arc::clone(&parsed),
            Arc::clone(&self.settings),
            request.analysis_kind,
            request.cancellation.clone(),
        );

        tracing::debug!(
            path = %parsed.path.display(),
            analyzers = analyzers.len(),
            max_parallel = self.max_parallel,
            "Analysis starting"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_parallel)
            .build()
            .map_err(|e| ScanError::Internal {
                message: format!("cannot build analyzer pool: {e}"),
            })?;

        self.reporter.run_started(&parsed.path, analyzers.len());
        let mut keyed: Vec<(i32, AnalysisResult)> = pool.install(|| {
            analyzers
                .par_iter()
                .map(|analyzer| {
                    (
                        analyzer.priority(),
                        run_one(analyzer.as_ref(), &context, self.reporter.as_ref()),
                    )
                })
                .collect()
        });

        // Deterministic report order: priority desc, name asc.
        keyed.sort_by(|(pa, ra), (pb, rb)| {
            pb.cmp(pa)
                .then_with(|| ra.analyzer_name.cmp(&rb.analyzer_name))
        });
        let results: Vec<AnalysisResult> = keyed.into_iter().map(|(_, r)| r).collect();

        let was_cancelled = request.cancellation.is_cancelled();
        self.reporter.run_finished(started.elapsed(), was_cancelled);
        tracing::info!(
            path = %parsed.path.display(),
            results = results.len(),
            cancelled = was_cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Analysis complete"
        );

        Ok(OrchestrationResult {
            results,
            parsed_log: Some(parsed),
            shared_data: context.shared_snapshot(),
            duration: started.elapsed(),
            was_cancelled,
        })
    }

    fn select_analyzers(
        &self,
        request: &AnalysisRequest,
    ) -> Result<Vec<Arc<dyn Analyzer>>, ScanError> {
        match &request.selected_analyzers {
            None => {
                // The settings list disables analyzers from the default
                // set; an explicit request always wins over it.
                let disabled = self
                    .settings
                    .get_list(Scope::Settings, "disabled_analyzers")
                    .unwrap_or_default();
                Ok(self
                    .registry
                    .for_kind(request.analysis_kind)
                    .into_iter()
                    .filter(|a| !disabled.iter().any(|d| d.eq_ignore_ascii_case(a.name())))
                    .collect())
            }
            Some(names) => names
                .iter()
                .map(|name| {
                    self.registry.by_name(name).ok_or_else(|| {
                        ConfigError::UnknownAnalyzer { name: name.clone() }.into()
                    })
                })
                .collect(),
        }
    }
}

/// Run a single analyzer with panic isolation and timing.
///
/// A panic is a contract violation; it is converted into a
/// FailedWithError result carrying the panic message, and the other
/// analyzers are unaffected.
fn run_one(
    analyzer: &dyn Analyzer,
    context: &AnalysisContext,
    reporter: &dyn Reporter,
) -> AnalysisResult {
    if context.cancellation.is_cancelled() {
        let result = AnalysisResult::skipped(analyzer.name());
        reporter.analyzer_finished(analyzer.name(), result.status, result.severity);
        return result;
    }

    reporter.analyzer_started(analyzer.name());
    let started = Instant::now();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        analyzer.analyze(context)
    }));

    let mut result = match outcome {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(analyzer = analyzer.name(), message, "Analyzer panicked");
            AnalysisResult::failed(analyzer.name(), vec![message])
        }
    };
    result.duration = started.elapsed();
    result
        .metadata
        .entry("scannerVersion".to_string())
        .or_insert_with(|| constants::APP_VERSION.to_string());

    // Contract: a fragment only accompanies a successful result.
    if result.status != crate::core::model::AnalysisStatus::Ok {
        result.fragment = None;
    }
    reporter.analyzer_finished(analyzer.name(), result.status, result.severity);
    result
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "analyzer panicked".to_string()
    }
}
