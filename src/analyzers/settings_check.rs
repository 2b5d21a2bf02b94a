// Scanner111 - analyzers/settings_check.rs
//
// Crash-generator configuration check: parses Buffout4.toml /
// CrashLogger.toml / EngineFixes.toml from the script-extender plugin
// directory and compares each known key against the expected-value
// table.

use crate::analyzers::Analyzer;
use crate::core::fragment::{compose, FragmentKind, ReportFragment};
use crate::core::knowledge;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult};
use crate::core::settings::Scope;
use std::path::PathBuf;

/// Walk a dotted key ("Patches.MemoryManager") through a parsed TOML
/// document and render the scalar found there.
fn toml_value_at(doc: &toml::Value, key: &str) -> Option<String> {
    let mut node = doc;
    for part in key.split('.') {
        node = node.get(part)?;
    }
    match node {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        _ => None,
    }
}

/// Compare one configuration file against its expected entries.
///
/// Returns a leaf per checked key: success on match, warning plus a fix
/// hint on mismatch or absence.
pub fn check_settings_file(
    file_name: &str,
    content: &str,
    expected: &knowledge::ExpectedSettingsFile,
) -> Vec<ReportFragment> {
    let doc: toml::Value = match content.parse() {
        Ok(doc) => doc,
        Err(e) => {
            return vec![ReportFragment::warning(
                file_name.to_string(),
                format!("cannot parse: {e}"),
            )];
        }
    };

    let mut children = Vec::new();
    for entry in &expected.entries {
        match toml_value_at(&doc, &entry.key) {
            Some(actual) if actual == entry.expected => {
                children.push(ReportFragment::success(
                    format!("{file_name}: {}", entry.key),
                    format!("= {actual}"),
                ));
            }
            Some(actual) => {
                children.push(ReportFragment::warning(
                    format!("{file_name}: {}", entry.key),
                    format!("= {actual}, expected {}", entry.expected),
                ));
                children.push(ReportFragment::text(
                    FragmentKind::Fix,
                    format!("Set {} = {} — {}", entry.key, entry.expected, entry.note),
                ));
            }
            None => {
                children.push(ReportFragment::warning(
                    format!("{file_name}: {}", entry.key),
                    format!("not set, expected {}", entry.expected),
                ));
            }
        }
    }
    children
}

pub struct SettingsAnalyzer;

impl SettingsAnalyzer {
    /// The script-extender plugin directory holding the crash-generator
    /// configuration files. Explicit setting first, then derived from
    /// the game root.
    fn plugins_dir(ctx: &AnalysisContext) -> Option<PathBuf> {
        if let Some(dir) = ctx.settings.get_string(Scope::Game, "xse_plugins_dir") {
            return Some(PathBuf::from(dir));
        }
        let root = ctx.settings.get_string(Scope::Game, "root")?;
        let xse = ctx
            .settings
            .get_string_or(Scope::Game, "xse_acronym", "F4SE");
        Some(PathBuf::from(root).join("Data").join(xse).join("Plugins"))
    }
}

impl Analyzer for SettingsAnalyzer {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn priority(&self) -> i32 {
        50
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog, AnalysisKind::FileIntegrity]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let mut children: Vec<ReportFragment> = Vec::new();

        // The log itself names the crash generator; flag stale releases.
        let log = &ctx.parsed_log;
        if let Some(generator) = knowledge::builtin().crash_generator(&log.crashgen_name) {
            if crate::core::version::is_outdated(&log.crashgen_version, &generator.latest) {
                children.push(ReportFragment::warning(
                    format!("{} is outdated", generator.name),
                    format!(
                        "log written by v{}, latest is v{} — {}",
                        log.crashgen_version, generator.latest, generator.note
                    ),
                ));
            } else {
                children.push(ReportFragment::success(
                    generator.name.clone(),
                    format!("v{} is current", log.crashgen_version),
                ));
            }
        }

        let Some(dir) = Self::plugins_dir(ctx) else {
            children.push(ReportFragment::text(
                FragmentKind::Info,
                "Game root not configured; settings file check skipped.",
            ));
            return AnalysisResult::ok(
                self.name(),
                ReportFragment::section("Crash Generator Settings", children),
            );
        };
        for expected in &knowledge::builtin().expected_settings {
            let path = dir.join(&expected.file);
            if ctx.cancellation.is_cancelled() {
                return AnalysisResult::skipped(self.name());
            }
            match crate::platform::fs::read_file_lossy(&path) {
                Ok(content) => {
                    children.extend(check_settings_file(&expected.file, &content, expected));
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(file = %path.display(), "Settings file absent, skipped");
                }
                Err(e) => {
                    children.push(ReportFragment::warning(
                        expected.file.clone(),
                        format!("cannot read '{}': {e}", path.display()),
                    ));
                }
            }
        }

        if children.is_empty() {
            children.push(ReportFragment::text(
                FragmentKind::Info,
                "No crash generator configuration files found.",
            ));
        }

        AnalysisResult::ok(
            self.name(),
            ReportFragment::section("Crash Generator Settings", children),
        )
    }
}
