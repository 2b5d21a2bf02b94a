// Scanner111 - analyzers/paths.rs
//
// Installation-path validation and the Documents/My Games INI check.
// Cloud-synced and UAC-protected locations are the two classic causes of
// silent mod-loading failures, so both analyzers run in the
// file-integrity pipeline.

use crate::analyzers::Analyzer;
use crate::core::fragment::{FragmentKind, ReportFragment};
use crate::core::knowledge;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult};
use crate::core::settings::Scope;
use std::path::Path;

/// Path substrings that indicate a problematic install location.
const BAD_LOCATIONS: &[(&str, &str)] = &[
    (
        "OneDrive",
        "OneDrive syncs and rewrites files while the game runs; move the installation out of any synced folder.",
    ),
    (
        "Program Files",
        "Program Files is UAC-protected; mod managers and script extenders cannot write there reliably.",
    ),
];

/// Check one path against the location rules.
pub fn validate_location(path: &str) -> Vec<(&'static str, &'static str)> {
    BAD_LOCATIONS
        .iter()
        .filter(|(needle, _)| path.to_lowercase().contains(&needle.to_lowercase()))
        .copied()
        .collect()
}

// =============================================================================
// PathValidationAnalyzer
// =============================================================================

pub struct PathValidationAnalyzer;

impl Analyzer for PathValidationAnalyzer {
    fn name(&self) -> &'static str {
        "path-validation"
    }

    fn priority(&self) -> i32 {
        45
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog, AnalysisKind::FileIntegrity]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let mut children: Vec<ReportFragment> = Vec::new();

        // The crash log's own location matters too: a log under OneDrive
        // means the whole game tree is synced.
        let log_path = ctx.parsed_log.path.display().to_string();
        for (needle, advice) in validate_location(&log_path) {
            children.push(ReportFragment::warning(
                format!("Crash log inside {needle}"),
                advice,
            ));
        }

        match ctx.settings.get_string(Scope::Game, "root") {
            Some(root) => {
                for (needle, advice) in validate_location(&root) {
                    children.push(ReportFragment::warning(
                        format!("Game installed inside {needle}"),
                        advice,
                    ));
                }
                if !Path::new(&root).exists() {
                    children.push(ReportFragment::warning(
                        "Game root not found",
                        format!("Configured game root '{root}' does not exist."),
                    ));
                }
                // Game-relative paths must actually sit under the root.
                if let Some(dir) = ctx.settings.get_string(Scope::Game, "xse_plugins_dir") {
                    if !Path::new(&dir).starts_with(&root) {
                        children.push(ReportFragment::warning(
                            "Script extender outside the game root",
                            format!(
                                "'{dir}' is not under the game root '{root}'; the game will \
                                 not load plugins from there."
                            ),
                        ));
                    }
                }
            }
            None => {
                children.push(ReportFragment::text(
                    FragmentKind::Info,
                    "Game root not configured; only the crash log location was checked.",
                ));
            }
        }

        if children.is_empty()
            || children
                .iter()
                .all(|c| !matches!(c, ReportFragment::Leaf { kind: FragmentKind::Warning, .. }))
        {
            children.push(ReportFragment::text(
                FragmentKind::Success,
                "No problematic install locations detected.",
            ));
        }

        AnalysisResult::ok(
            self.name(),
            ReportFragment::section("Install Paths", children),
        )
    }
}

// =============================================================================
// DocumentsPathAnalyzer
// =============================================================================

/// Minimal INI lookup: find `key` under `[section]`. Comments (`;`/`#`)
/// and surrounding whitespace are tolerated; the first hit wins.
pub fn ini_value(content: &str, section: &str, key: &str) -> Option<String> {
    let mut in_section = false;
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            in_section = name.eq_ignore_ascii_case(section);
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim().eq_ignore_ascii_case(key) {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}

pub struct DocumentsPathAnalyzer;

impl DocumentsPathAnalyzer {
    /// The per-game "My Games" directory holding the INI files.
    ///
    /// An explicit `documents_path` setting wins; otherwise the path is
    /// derived from the platform documents folder plus the game's
    /// `my_games_folder` name. The XSE acronym always comes from
    /// settings, never from path sniffing.
    fn documents_dir(ctx: &AnalysisContext) -> Option<std::path::PathBuf> {
        if let Some(dir) = ctx.settings.get_string(Scope::Game, "documents_path") {
            return Some(std::path::PathBuf::from(dir));
        }
        let folder = ctx.settings.get_string(Scope::Game, "my_games_folder")?;
        let documents = directories::UserDirs::new()?.document_dir()?.to_path_buf();
        Some(documents.join("My Games").join(folder))
    }
}

impl Analyzer for DocumentsPathAnalyzer {
    fn name(&self) -> &'static str {
        "documents-path"
    }

    fn priority(&self) -> i32 {
        35
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::FileIntegrity]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let Some(dir) = Self::documents_dir(ctx) else {
            return AnalysisResult::ok(
                self.name(),
                ReportFragment::section(
                    "Game INI Files",
                    vec![ReportFragment::text(
                        FragmentKind::Info,
                        "Documents path not configured; INI check skipped.",
                    )],
                ),
            );
        };

        let mut children: Vec<ReportFragment> = Vec::new();
        for toggle in &knowledge::builtin().ini_toggles {
            let path = dir.join(&toggle.file);
            let content = match crate::platform::fs::read_file_lossy(&path) {
                Ok(content) => content,
                Err(_) => {
                    children.push(ReportFragment::text(
                        FragmentKind::Info,
                        format!("{} not found under '{}'.", toggle.file, dir.display()),
                    ));
                    continue;
                }
            };
            let label = format!("{} [{}] {}", toggle.file, toggle.section, toggle.key);
            match ini_value(&content, &toggle.section, &toggle.key) {
                Some(actual) if actual == toggle.expected => {
                    children.push(ReportFragment::success(label, format!("= {actual}")));
                }
                Some(actual) => {
                    children.push(ReportFragment::info(
                        label,
                        format!(
                            "= {actual}, recommended {} — {}",
                            if toggle.expected.is_empty() {
                                "(empty)"
                            } else {
                                &toggle.expected
                            },
                            toggle.note
                        ),
                    ));
                }
                None => {
                    children.push(ReportFragment::info(
                        label,
                        format!("not set — {}", toggle.note),
                    ));
                }
            }
        }

        AnalysisResult::ok(
            self.name(),
            ReportFragment::section("Game INI Files", children),
        )
    }
}
