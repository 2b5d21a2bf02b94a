// Scanner111 - tests/e2e_scan.rs
//
// End-to-end tests for the analysis pipeline: real fixture crash logs on
// disk, the real parser, the full built-in analyzer registry on the real
// thread pool, the real cache directory — no mocks, no stubs.

use scanner111::analyzers::register_builtin_analyzers;
use scanner111::app::cache::IncrementalAnalyzer;
use scanner111::app::orchestrator::{AnalysisRequest, Orchestrator};
use scanner111::core::model::{AnalysisKind, AnalysisStatus, Severity};
use scanner111::core::report::{ComposerOptions, ReportFormat};
use scanner111::core::settings::SettingsView;
use scanner111::core::template::AdvancedReportGenerator;
use scanner111::util::cancel::CancellationHandle;
use std::path::PathBuf;
use std::sync::Arc;

// =============================================================================
// Helpers
// =============================================================================

/// Absolute path to an on-disk fixture file.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn orchestrator() -> Orchestrator {
    Orchestrator::new(
        Arc::new(register_builtin_analyzers()),
        Arc::new(SettingsView::empty()),
    )
}

fn options(format: ReportFormat) -> ComposerOptions {
    ComposerOptions {
        format,
        color: false,
        number_sections: false,
    }
}

// =============================================================================
// Full pipeline over the Buffout 4 fixture
// =============================================================================

/// The rich fixture exercises every crash-log analyzer: suspects fire,
/// Form IDs resolve against the load order, the GPU vendor is detected,
/// and the known-bad plugin is flagged.
#[test]
fn e2e_buffout4_fixture_full_pipeline() {
    let request = AnalysisRequest::new(
        fixture("crash-2024-01-15-buffout4.log"),
        AnalysisKind::CrashLog,
    );
    let outcome = orchestrator().run_analysis(&request).unwrap();

    assert!(!outcome.was_cancelled);
    let parsed = outcome.parsed_log.as_ref().expect("log parses");
    assert_eq!(parsed.game_version, "Fallout 4 v1.10.163");
    assert_eq!(parsed.crashgen_name, "Buffout 4");
    assert_eq!(parsed.plugins.len(), 8);
    assert_eq!(parsed.plugin_token("DLCRobot.esm"), Some("01"));
    assert_eq!(parsed.plugin_token("RedRocketsGlareII.esl"), Some("FE:000"));

    // Every analyzer completed.
    assert!(outcome
        .results
        .iter()
        .all(|r| r.status == AnalysisStatus::Ok));

    // "out of memory" in the main error makes this a critical run.
    assert_eq!(outcome.max_severity(), Severity::Critical);
    let suspects = outcome
        .results
        .iter()
        .find(|r| r.analyzer_name == "suspects")
        .unwrap();
    assert!(format!("{:?}", suspects.fragment).contains("MemoryError"));

    // Form IDs: 0001A332 twice, 00067890 once, FF004A2D filtered.
    let form_ids = outcome
        .results
        .iter()
        .find(|r| r.analyzer_name == "form-ids")
        .unwrap();
    let rendered = format!("{:?}", form_ids.fragment);
    assert!(rendered.contains("- Form ID: 0001A332 | [Fallout4.esm] | 2"));
    assert!(rendered.contains("- Form ID: 00067890 | [Fallout4.esm] | 1"));
    assert!(!rendered.contains("FF004A2D"));

    // The GPU analyzer saw the RTX 3080.
    let gpu = outcome
        .results
        .iter()
        .find(|r| r.analyzer_name == "gpu")
        .unwrap();
    assert!(format!("{:?}", gpu.fragment).contains("NVIDIA"));

    // ScrapEverything.esp is in the warning database.
    let plugins = outcome
        .results
        .iter()
        .find(|r| r.analyzer_name == "plugins")
        .unwrap();
    assert!(format!("{:?}", plugins.fragment).contains("ScrapEverything.esp"));
}

/// Rendering the same outcome in all four formats produces the expected
/// per-format framing.
#[test]
fn e2e_report_formats_render() {
    let request = AnalysisRequest::new(
        fixture("crash-2024-01-15-buffout4.log"),
        AnalysisKind::CrashLog,
    );
    let outcome = orchestrator().run_analysis(&request).unwrap();
    let generator = AdvancedReportGenerator::new();

    let markdown =
        generator.generate_report(&outcome.results, "technical", &options(ReportFormat::Markdown));
    assert!(markdown.contains("# Scanner111 Report (technical)"));
    assert!(markdown.contains("‼ [CRITICAL] **MemoryError**"));

    let html = generator.generate_report(&outcome.results, "technical", &options(ReportFormat::Html));
    assert!(html.starts_with("<style>"));
    assert!(html.contains("<section class=\"critical\">"));

    let json = generator.generate_report(&outcome.results, "technical", &options(ReportFormat::Json));
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("report is valid JSON");
    assert_eq!(parsed["kind"], "section");

    let text = generator.generate_report(&outcome.results, "technical", &options(ReportFormat::Text));
    assert!(text.contains("[!!] MemoryError"));
}

/// The minimal Crash Logger fixture parses cleanly and reports the
/// canonical empty Form ID notice.
#[test]
fn e2e_minimal_fixture_reports_no_form_ids() {
    let request = AnalysisRequest::new(
        fixture("crash-2024-02-02-minimal.log"),
        AnalysisKind::CrashLog,
    );
    let outcome = orchestrator().run_analysis(&request).unwrap();

    let parsed = outcome.parsed_log.as_ref().unwrap();
    assert_eq!(parsed.crashgen_name, "Crash Logger");
    assert_eq!(parsed.plugins.len(), 2);

    let form_ids = outcome
        .results
        .iter()
        .find(|r| r.analyzer_name == "form-ids")
        .unwrap();
    assert!(format!("{:?}", form_ids.fragment).contains("COULDN'T FIND ANY FORM ID SUSPECTS"));
}

// =============================================================================
// Incremental cache end to end
// =============================================================================

/// Scenario: a second run over unchanged bytes is a pure cache hit with
/// identical results and no new on-disk entries.
#[test]
fn e2e_cache_hit_round_trip() {
    let dir = tempfile::TempDir::new().unwrap();
    let log_path = dir.path().join("crash-cache-test.log");
    std::fs::copy(fixture("crash-2024-01-15-buffout4.log"), &log_path).unwrap();
    let cache_dir = dir.path().join("cache");

    let cache = Arc::new(IncrementalAnalyzer::new(
        Arc::new(orchestrator()),
        cache_dir.clone(),
    ));
    let cancel = CancellationHandle::new();

    let first = cache
        .analyze_incremental(&log_path, AnalysisKind::CrashLog, &cancel)
        .unwrap();
    let second = cache
        .analyze_incremental(&log_path, AnalysisKind::CrashLog, &cancel)
        .unwrap();

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entries, 1);

    // Cache determinism: the rendered reports are byte-equal.
    let generator = AdvancedReportGenerator::new();
    let render = |results: &[scanner111::core::model::AnalysisResult]| {
        generator.generate_report(results, "technical", &options(ReportFormat::Markdown))
    };
    assert_eq!(render(&first), render(&second));

    // The persisted entry carries the shared facts as analyzer scratch.
    let entry_name = scanner111::app::cache::entry_file_name(
        &std::fs::canonicalize(&log_path).unwrap(),
    );
    let entry_path = cache_dir.join(entry_name);
    for _ in 0..100 {
        if entry_path.exists() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    let state: scanner111::core::model::FileAnalysisState =
        serde_json::from_str(&std::fs::read_to_string(&entry_path).unwrap()).unwrap();
    assert_eq!(
        state.analyzer_scratch.get("gpu_vendor").map(String::as_str),
        Some("NVIDIA")
    );
}

/// Concurrent runs over the same input never corrupt the cache: one
/// on-disk entry, stable hash, hits + misses == run count.
#[test]
fn e2e_concurrent_cache_runs_are_safe() {
    let dir = tempfile::TempDir::new().unwrap();
    let log_path = dir.path().join("crash-concurrent.log");
    std::fs::copy(fixture("crash-2024-01-15-buffout4.log"), &log_path).unwrap();
    let cache_dir = dir.path().join("cache");

    let cache = Arc::new(IncrementalAnalyzer::new(
        Arc::new(orchestrator()),
        cache_dir.clone(),
    ));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let cache = Arc::clone(&cache);
        let log_path = log_path.clone();
        handles.push(std::thread::spawn(move || {
            cache
                .analyze_incremental(&log_path, AnalysisKind::CrashLog, &CancellationHandle::new())
                .map(|r| r.len())
        }));
    }
    let counts: Vec<usize> = handles
        .into_iter()
        .map(|h| h.join().expect("no panic").expect("no error"))
        .collect();
    assert!(counts.windows(2).all(|w| w[0] == w[1]));

    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 4);
    assert_eq!(stats.entries, 1);

    // Let fire-and-forget persistence settle, then count entry files.
    for _ in 0..100 {
        let entry_files = std::fs::read_dir(&cache_dir)
            .map(|d| {
                d.flatten()
                    .filter(|e| {
                        e.path().extension().and_then(|x| x.to_str()) == Some("cache")
                    })
                    .count()
            })
            .unwrap_or(0);
        if entry_files == 1 {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    panic!("expected exactly one cache entry file on disk");
}

// =============================================================================
// Reformat pass
// =============================================================================

/// Reformatting a real fixture normalises the plugin tokens and removes
/// the configured lines; parsing before and after yields the same
/// plugin table.
#[test]
fn e2e_reformat_then_reparse_is_stable() {
    let dir = tempfile::TempDir::new().unwrap();
    let log_path = dir.path().join("crash-reformat.log");
    std::fs::copy(fixture("crash-2024-01-15-buffout4.log"), &log_path).unwrap();

    let config = scanner111::core::parser::ParserConfig::default();
    let before = scanner111::core::parser::parse(&log_path, &config).unwrap();

    let changed =
        scanner111::core::reformat::reformat_file(&log_path, &[], "F4SE").unwrap();
    assert!(changed, "space-padded tokens should be rewritten");

    let content = std::fs::read_to_string(&log_path).unwrap();
    assert!(content.contains("[01]     DLCRobot.esm"));
    assert!(content.contains("[FE:000] RedRocketsGlareII.esl"));
    // Call-stack frames keep their original spelling.
    assert!(content.contains("[0] 0x7FF6D23B6FDD"));

    let after = scanner111::core::parser::parse(&log_path, &config).unwrap();
    assert_eq!(before.plugins, after.plugins);

    // A second reformat is a no-op.
    assert!(!scanner111::core::reformat::reformat_file(&log_path, &[], "F4SE").unwrap());
}

// =============================================================================
// Sessions and statistics
// =============================================================================

/// A full run feeds the session store and the statistics table; a
/// second, cleaner run shows up as resolved issues in the comparison.
#[test]
fn e2e_sessions_and_statistics_record_runs() {
    use scanner111::app::session::{self, SessionData};
    use scanner111::app::stats::{ScanRecord, StatsStore};

    let dir = tempfile::TempDir::new().unwrap();
    let sessions_dir = dir.path().join("sessions");
    let stats = StatsStore::new(dir.path().join("statistics.csv"));

    let request = AnalysisRequest::new(
        fixture("crash-2024-01-15-buffout4.log"),
        AnalysisKind::CrashLog,
    );
    let outcome = orchestrator().run_analysis(&request).unwrap();

    stats
        .append(&ScanRecord::from_outcome(&outcome, &request.input_path))
        .unwrap();
    let first = SessionData::new(request.input_path.clone(), outcome.results.clone());
    session::save(&first, &sessions_dir).unwrap();

    let records = stats.load_all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].game_type, "Fallout 4");
    assert!(records[0].critical >= 1);

    // The minimal fixture stands in for a cleaned-up rerun.
    let clean_request = AnalysisRequest::new(
        fixture("crash-2024-02-02-minimal.log"),
        AnalysisKind::CrashLog,
    );
    let clean = orchestrator().run_analysis(&clean_request).unwrap();
    let second = SessionData::new(request.input_path.clone(), clean.results.clone());

    let diff = session::compare(&first, &second);
    assert!(
        diff.resolved_issues.iter().any(|t| t == "MemoryError"),
        "MemoryError should resolve: {diff:?}"
    );

    session::save(&second, &sessions_dir).unwrap();
    let latest = session::latest_for_log(&sessions_dir, &request.input_path).unwrap();
    assert_eq!(latest.id, second.id);
}

// =============================================================================
// FCX pipeline
// =============================================================================

/// File-integrity runs use a different analyzer set and degrade
/// gracefully with no configured game root.
#[test]
fn e2e_fcx_pipeline_without_configuration() {
    let request = AnalysisRequest::new(
        fixture("crash-2024-01-15-buffout4.log"),
        AnalysisKind::FileIntegrity,
    );
    let outcome = orchestrator().run_analysis(&request).unwrap();

    let names: Vec<&str> = outcome
        .results
        .iter()
        .map(|r| r.analyzer_name.as_str())
        .collect();
    assert!(names.contains(&"game-integrity"));
    assert!(names.contains(&"documents-path"));
    assert!(!names.contains(&"suspects"));
    assert!(outcome
        .results
        .iter()
        .all(|r| r.status == AnalysisStatus::Ok));
}
