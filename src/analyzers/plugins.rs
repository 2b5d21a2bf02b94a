// Scanner111 - analyzers/plugins.rs
//
// Single-plugin suspect matching: each plugin in the load order is
// checked against the embedded warning database.

use crate::analyzers::Analyzer;
use crate::core::fragment::{compose, conditional_section, FragmentKind, ReportFragment};
use crate::core::knowledge;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult, Severity};

fn severity_kind(severity: Severity) -> FragmentKind {
    match severity {
        Severity::Info => FragmentKind::Info,
        Severity::Warning => FragmentKind::Warning,
        Severity::Critical => FragmentKind::Critical,
        _ => FragmentKind::Error,
    }
}

pub struct PluginAnalyzer;

impl Analyzer for PluginAnalyzer {
    fn name(&self) -> &'static str {
        "plugins"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let log = &ctx.parsed_log;
        let mut findings: Vec<ReportFragment> = Vec::new();

        for warning in &knowledge::builtin().plugin_warnings {
            let Some(token) = log.plugin_token(&warning.plugin) else {
                continue;
            };
            findings.push(ReportFragment::Leaf {
                kind: severity_kind(warning.severity),
                title: Some(warning.plugin.clone()),
                order: 0,
                content: Some(format!("[{token}] {}", warning.note)),
            });
            tracing::debug!(plugin = %warning.plugin, "Plugin warning matched");
        }

        // Script-extender DLLs live in the "<XSE> PLUGINS:" segment, not
        // the load order.
        let xse_lines: Vec<&String> = log.xse_plugin_lines().collect();
        for warning in &knowledge::builtin().xse_plugin_warnings {
            let needle = warning.dll.to_lowercase();
            if !xse_lines
                .iter()
                .any(|line| line.to_lowercase().contains(&needle))
            {
                continue;
            }
            findings.push(ReportFragment::Leaf {
                kind: severity_kind(warning.severity),
                title: Some(warning.dll.clone()),
                order: 0,
                content: Some(warning.note.clone()),
            });
            tracing::debug!(dll = %warning.dll, "XSE plugin warning matched");
        }

        let fragment = if findings.is_empty() {
            ReportFragment::section(
                "Plugin Suspects",
                vec![ReportFragment::text(
                    FragmentKind::Success,
                    "No plugins from the warning database are present.",
                )],
            )
        } else {
            conditional_section("Plugin Suspects", 0, || compose(findings))
        };

        AnalysisResult::ok(self.name(), fragment)
    }
}
