// Scanner111 - main.rs
//
// CLI entry point. Handles:
// 1. Argument parsing (subcommands per the CLI contract)
// 2. Logging initialisation
// 3. Settings + registry + orchestrator wiring
// 4. Exit codes: 0 success, 1 user error, 2 critical findings,
//    3 internal failure.

use clap::{Parser, Subcommand};
use colored::Colorize;
use scanner111::analyzers::register_builtin_analyzers;
use scanner111::app::cache::IncrementalAnalyzer;
use scanner111::app::orchestrator::{AnalysisRequest, Orchestrator};
use scanner111::app::session::SessionData;
use scanner111::app::stats::{ScanRecord, StatsStore};
use scanner111::app::watcher::{LogWatcher, WatchConfig};
use scanner111::core::knowledge;
use scanner111::core::model::{AnalysisKind, OrchestrationResult, Severity};
use scanner111::core::report::{ComposerOptions, ReportFormat};
use scanner111::core::settings::{self, Scope, SettingsView};
use scanner111::core::template::AdvancedReportGenerator;
use scanner111::platform::config::PlatformPaths;
use scanner111::util::cancel::CancellationHandle;
use scanner111::util::constants;
use scanner111::util::error::ScanError;
use std::path::PathBuf;
use std::sync::Arc;

const EXIT_OK: i32 = 0;
const EXIT_USER_ERROR: i32 = 1;
const EXIT_CRITICAL_FINDINGS: i32 = 2;
const EXIT_INTERNAL: i32 = 3;

/// Scanner111 — crash-log analysis for Bethesda games.
///
/// Point it at a Buffout 4 or Crash Logger crash log to find suspect
/// plugins, Form IDs, mod conflicts, and engine-level faults.
#[derive(Parser, Debug)]
#[command(name = "scanner111", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'v', long = "verbose", global = true)]
    verbose: bool,

    /// Disable ANSI colour in terminal output.
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    /// Disable progress output (reports only).
    #[arg(long = "no-progress", global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyse one crash log or every crash log in a directory.
    Scan(ScanArgs),

    /// File-integrity (FCX) checks: game files, settings, paths.
    Fcx(ScanArgs),

    /// Watch a directory and reanalyse crash logs as they change.
    Watch {
        /// Directory to watch for crash logs.
        #[arg(long = "scan-dir")]
        scan_dir: PathBuf,

        /// Report format for each reanalysis.
        #[arg(long, default_value = "markdown")]
        format: String,
    },

    /// Inspect or edit the scanner settings file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Version and directory information.
    About,

    /// Prompt-driven scanning loop.
    Interactive,
}

#[derive(clap::Args, Debug)]
struct ScanArgs {
    /// A single crash log to analyse.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Analyse every crash log in this directory.
    #[arg(long = "scan-dir")]
    scan_dir: Option<PathBuf>,

    /// Write the report here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Report format: markdown, html, json, or text.
    #[arg(long, default_value = "markdown")]
    format: String,

    /// Comma-separated analyzer names to run (default: all applicable).
    #[arg(long)]
    analyzers: Option<String>,

    /// Report template: executive, technical, summary, or full.
    #[arg(long, default_value = "technical")]
    template: String,

    /// Parallel analyzer cap (clamped to 1..=10).
    #[arg(long = "max-parallel")]
    max_parallel: Option<usize>,

    /// Normalise plugin tokens and strip removal-list lines in place
    /// before analysing.
    #[arg(long)]
    reformat: bool,

    /// Bypass the incremental cache for this run.
    #[arg(long = "no-cache")]
    no_cache: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the whole settings file.
    List,
    /// Print one dotted key.
    Get { key: String },
    /// Set one dotted key.
    Set { key: String, value: String },
    /// Delete one dotted key (or the whole file with no key).
    Reset { key: Option<String> },
}

fn main() {
    let cli = Cli::parse();
    scanner111::util::logging::init(cli.verbose, None);
    if cli.no_color {
        colored::control::set_override(false);
    }

    let code = match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            exit_code_for(&e)
        }
    };
    std::process::exit(code);
}

fn exit_code_for(e: &ScanError) -> i32 {
    match e {
        ScanError::NotFound { .. } | ScanError::Config(_) => EXIT_USER_ERROR,
        _ => EXIT_INTERNAL,
    }
}

fn run(cli: &Cli) -> Result<i32, ScanError> {
    let paths = PlatformPaths::resolve();

    match &cli.command {
        Command::Scan(args) => run_scan(cli, args, &paths, AnalysisKind::CrashLog),
        Command::Fcx(args) => run_scan(cli, args, &paths, AnalysisKind::FileIntegrity),
        Command::Watch { scan_dir, format } => run_watch(cli, scan_dir, format, &paths),
        Command::Config { action } => run_config(action, &paths),
        Command::About => run_about(&paths),
        Command::Interactive => run_interactive(cli, &paths),
    }
}

// =============================================================================
// Engine wiring
// =============================================================================

struct Engine {
    orchestrator: Arc<Orchestrator>,
    cache: Arc<IncrementalAnalyzer>,
    settings: Arc<SettingsView>,
    generator: AdvancedReportGenerator,
    stats: StatsStore,
    sessions_dir: PathBuf,
}

fn build_engine(
    paths: &PlatformPaths,
    max_parallel: Option<usize>,
    progress: bool,
) -> Result<Engine, ScanError> {
    let game = std::env::var(constants::ENV_GAME).unwrap_or_else(|_| "fallout4".to_string());
    let settings = Arc::new(SettingsView::load(&paths.settings_dir, &game)?);

    let mut orchestrator = Orchestrator::new(
        Arc::new(register_builtin_analyzers()),
        Arc::clone(&settings),
    );
    if let Some(n) = max_parallel {
        orchestrator = orchestrator.with_max_parallel(n);
    }
    if progress {
        orchestrator = orchestrator
            .with_reporter(Arc::new(scanner111::app::reporter::ConsoleReporter));
    }
    let orchestrator = Arc::new(orchestrator);

    Ok(Engine {
        cache: Arc::new(IncrementalAnalyzer::new(
            Arc::clone(&orchestrator),
            paths.cache_dir.clone(),
        )),
        orchestrator,
        settings,
        generator: AdvancedReportGenerator::new(),
        stats: StatsStore::new(paths.stats_path()),
        sessions_dir: paths.sessions_dir(),
    })
}

// =============================================================================
// scan / fcx
// =============================================================================

fn collect_inputs(args: &ScanArgs) -> Result<Vec<PathBuf>, ScanError> {
    if let Some(file) = &args.log_file {
        if !file.exists() {
            return Err(ScanError::NotFound { path: file.clone() });
        }
        return Ok(vec![file.clone()]);
    }
    let Some(dir) = &args.scan_dir else {
        return Err(ScanError::Config(
            scanner111::util::error::ConfigError::InvalidValue {
                what: "input",
                value: "either --log-file or --scan-dir is required".to_string(),
            },
        ));
    };
    if !dir.is_dir() {
        return Err(ScanError::NotFound { path: dir.clone() });
    }

    let patterns: Vec<glob::Pattern> = constants::WATCH_INCLUDE_PATTERNS
        .iter()
        .filter_map(|p| glob::Pattern::new(p).ok())
        .collect();
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| ScanError::Io {
            path: dir.clone(),
            operation: "read dir",
            source: e,
        })?
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| {
            let name = p
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            patterns.iter().any(|pat| pat.matches(&name))
        })
        .collect();
    files.sort();
    Ok(files)
}

fn run_scan(
    cli: &Cli,
    args: &ScanArgs,
    paths: &PlatformPaths,
    kind: AnalysisKind,
) -> Result<i32, ScanError> {
    let format = ReportFormat::parse(&args.format).ok_or_else(|| {
        ScanError::Config(scanner111::util::error::ConfigError::InvalidValue {
            what: "format",
            value: args.format.clone(),
        })
    })?;
    let engine = build_engine(paths, args.max_parallel, !cli.no_progress)?;
    let inputs = collect_inputs(args)?;
    if inputs.is_empty() {
        println!("No crash logs found.");
        return Ok(EXIT_OK);
    }

    let selected: Option<Vec<String>> = args.analyzers.as_ref().map(|csv| {
        csv.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    });

    let options = ComposerOptions {
        format,
        color: args.output.is_none() && !cli.no_color,
        number_sections: false,
    };

    let cancellation = CancellationHandle::new();
    let mut worst = Severity::None;
    let mut reports: Vec<String> = Vec::new();

    for input in &inputs {
        if args.reformat {
            let removed = engine
                .settings
                .get_list(Scope::Main, "reformat.remove")
                .unwrap_or_else(|| knowledge::builtin().reformat_remove.clone());
            let xse = engine
                .settings
                .get_string_or(Scope::Game, "xse_acronym", "F4SE");
            scanner111::core::reformat::reformat_file(input, &removed, &xse)?;
        }

        let outcome = if args.no_cache || selected.is_some() || kind != AnalysisKind::CrashLog {
            // Explicit selections and FCX runs bypass the cache: their
            // result set does not represent the full crash-log pipeline.
            let mut request = AnalysisRequest::new(input.clone(), kind);
            request.selected_analyzers = selected.clone();
            request.cancellation = cancellation.clone();
            engine.orchestrator.run_analysis(&request)?
        } else {
            let results = engine
                .cache
                .analyze_incremental(input, kind, &cancellation)?;
            OrchestrationResult {
                results,
                parsed_log: None,
                shared_data: Default::default(),
                duration: std::time::Duration::ZERO,
                was_cancelled: cancellation.is_cancelled(),
            }
        };

        worst = worst.max(outcome.max_severity());
        if !cli.no_progress {
            print_summary_line(input, &outcome);
        }

        if let Err(e) = engine
            .stats
            .append(&ScanRecord::from_outcome(&outcome, input))
        {
            tracing::warn!(error = %e, "Statistics append failed");
        }
        // Compare against the previous session over the same log before
        // recording the new one.
        let session = SessionData::new(input.clone(), outcome.results.clone());
        if !cli.no_progress {
            if let Some(previous) =
                scanner111::app::session::latest_for_log(&engine.sessions_dir, input)
            {
                let diff = scanner111::app::session::compare(&previous, &session);
                if !diff.new_issues.is_empty() {
                    eprintln!("  new since last scan: {}", diff.new_issues.join(", "));
                }
                if !diff.resolved_issues.is_empty() {
                    eprintln!("  resolved: {}", diff.resolved_issues.join(", "));
                }
            }
        }
        if let Err(e) = scanner111::app::session::save(&session, &engine.sessions_dir) {
            tracing::warn!(error = %e, "Session save failed");
        }

        reports.push(
            engine
                .generator
                .generate_report(&outcome.results, &args.template, &options),
        );
    }

    let combined = reports.join("\n");
    match &args.output {
        Some(path) => {
            scanner111::platform::fs::write_atomic(path, combined.as_bytes()).map_err(|e| {
                ScanError::Io {
                    path: path.clone(),
                    operation: "write report",
                    source: e,
                }
            })?;
            if !cli.no_progress {
                println!("Report written to {}", path.display());
            }
        }
        None => print!("{combined}"),
    }

    Ok(if worst >= Severity::Critical {
        EXIT_CRITICAL_FINDINGS
    } else {
        EXIT_OK
    })
}

fn print_summary_line(input: &std::path::Path, outcome: &OrchestrationResult) {
    let severity = outcome.max_severity();
    let tag = match severity {
        Severity::Critical => "CRITICAL".bright_red().bold(),
        Severity::Error => "ERROR".red(),
        Severity::Warning => "WARNING".yellow(),
        Severity::Info => "INFO".cyan(),
        Severity::None => "CLEAN".green(),
    };
    let findings = outcome.results.iter().filter(|r| r.has_findings).count();
    eprintln!(
        "[{tag}] {} — {} analyzer(s), {} finding(s)",
        input.display(),
        outcome.results.len(),
        findings
    );
}

// =============================================================================
// watch
// =============================================================================

fn run_watch(
    cli: &Cli,
    scan_dir: &PathBuf,
    format: &str,
    paths: &PlatformPaths,
) -> Result<i32, ScanError> {
    let format = ReportFormat::parse(format).ok_or_else(|| {
        ScanError::Config(scanner111::util::error::ConfigError::InvalidValue {
            what: "format",
            value: format.to_string(),
        })
    })?;
    if !scan_dir.is_dir() {
        return Err(ScanError::NotFound {
            path: scan_dir.clone(),
        });
    }

    let engine = build_engine(paths, None, false)?;
    let _sweeper = engine.cache.spawn_sweeper();
    let cancellation = CancellationHandle::new();

    let mut watcher = LogWatcher::new();
    watcher.start_watch(scan_dir.clone(), WatchConfig::from_settings(&engine.settings));
    eprintln!("Watching {} (Ctrl-C to stop)", scan_dir.display());

    let options = ComposerOptions {
        format,
        color: !cli.no_color,
        number_sections: false,
    };

    loop {
        for changed in watcher.poll_changed() {
            match engine
                .cache
                .analyze_incremental(&changed.path, AnalysisKind::CrashLog, &cancellation)
            {
                Ok(results) => {
                    let report =
                        engine
                            .generator
                            .generate_report(&results, "summary", &options);
                    println!("{report}");
                }
                Err(e) => eprintln!("{} {e}", "error:".red()),
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(200));
    }
}

// =============================================================================
// config
// =============================================================================

fn run_config(action: &ConfigAction, paths: &PlatformPaths) -> Result<i32, ScanError> {
    let path = paths
        .settings_dir
        .join(constants::SETTINGS_FILE_NAME);

    match action {
        ConfigAction::List => {
            if path.exists() {
                let doc = settings::load_yaml_file(&path)?;
                print!(
                    "{}",
                    serde_yaml::to_string(&doc).unwrap_or_else(|_| "{}\n".to_string())
                );
            } else {
                println!("# no settings file at {}", path.display());
            }
        }
        ConfigAction::Get { key } => {
            let doc = if path.exists() {
                settings::load_yaml_file(&path)?
            } else {
                serde_yaml::Value::Null
            };
            let mut node = Some(&doc);
            for part in key.split('.') {
                node = node.and_then(|n| n.get(part));
            }
            match node {
                None | Some(serde_yaml::Value::Null) => {
                    println!("# {key} is not set");
                }
                Some(other) => print!(
                    "{}",
                    serde_yaml::to_string(other).unwrap_or_else(|_| "~\n".to_string())
                ),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut doc = if path.exists() {
                settings::load_yaml_file(&path)?
            } else {
                serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
            };
            settings::set_dotted_key(&mut doc, key, value);
            settings::save_yaml_file(&path, &doc)?;
            println!("{key} = {value}");
        }
        ConfigAction::Reset { key } => match key {
            Some(key) => {
                if path.exists() {
                    let mut doc = settings::load_yaml_file(&path)?;
                    if settings::remove_dotted_key(&mut doc, key) {
                        settings::save_yaml_file(&path, &doc)?;
                        println!("{key} reset");
                    } else {
                        println!("# {key} was not set");
                    }
                }
            }
            None => {
                if path.exists() {
                    std::fs::remove_file(&path).map_err(|e| ScanError::Io {
                        path: path.clone(),
                        operation: "remove settings",
                        source: e,
                    })?;
                }
                println!("settings reset");
            }
        },
    }
    Ok(EXIT_OK)
}

// =============================================================================
// about / interactive
// =============================================================================

fn run_about(paths: &PlatformPaths) -> Result<i32, ScanError> {
    println!("{} v{}", constants::APP_NAME, constants::APP_VERSION);
    println!("Crash-log analysis for Bethesda games (Buffout 4 / Crash Logger)");
    println!();
    println!("settings: {}", paths.settings_dir.display());
    println!("cache:    {}", paths.cache_dir.display());
    println!("data:     {}", paths.data_dir.display());
    Ok(EXIT_OK)
}

fn run_interactive(cli: &Cli, paths: &PlatformPaths) -> Result<i32, ScanError> {
    if scanner111::platform::config::non_interactive() {
        return Err(ScanError::Config(
            scanner111::util::error::ConfigError::InvalidValue {
                what: "mode",
                value: format!("interactive mode disabled by {}", constants::ENV_NO_INTERACTIVE),
            },
        ));
    }

    let engine = build_engine(paths, None, false)?;
    let cancellation = CancellationHandle::new();
    let options = ComposerOptions {
        format: ReportFormat::Markdown,
        color: !cli.no_color,
        number_sections: false,
    };

    println!("{} v{} — interactive mode", constants::APP_NAME, constants::APP_VERSION);
    println!("Enter a crash log path, or: stats, clear-cache, quit");

    let stdin = std::io::stdin();
    let mut worst = Severity::None;
    loop {
        let mut line = String::new();
        if stdin.read_line(&mut line).is_err() {
            break;
        }
        let input = line.trim();
        if input.is_empty() || input == "quit" || input == "exit" {
            break;
        }
        if input == "stats" {
            let cache = engine.cache.stats();
            let (scans, with_critical, most_common) = engine.stats.summary();
            println!(
                "cache: {} entries, {} hits, {} misses, {} bytes on disk",
                cache.entries, cache.hits, cache.misses, cache.disk_bytes
            );
            println!(
                "history: {scans} scan(s), {with_critical} with critical findings{}",
                most_common
                    .map(|n| format!(", most frequent issue source: {n}"))
                    .unwrap_or_default()
            );
            continue;
        }
        if input == "clear-cache" {
            engine.cache.clear(None);
            println!("cache cleared");
            continue;
        }

        match engine.cache.analyze_incremental(
            std::path::Path::new(input),
            AnalysisKind::CrashLog,
            &cancellation,
        ) {
            Ok(results) => {
                worst = worst.max(
                    results
                        .iter()
                        .map(|r| r.severity)
                        .max()
                        .unwrap_or(Severity::None),
                );
                let report = engine
                    .generator
                    .generate_report(&results, "summary", &options);
                println!("{report}");
            }
            Err(e) => eprintln!("{} {e}", "error:".red()),
        }
        println!("Enter a crash log path, or: stats, clear-cache, quit");
    }

    Ok(if worst >= Severity::Critical {
        EXIT_CRITICAL_FINDINGS
    } else {
        EXIT_OK
    })
}
