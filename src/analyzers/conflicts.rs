// Scanner111 - analyzers/conflicts.rs
//
// Pairwise mod-conflict detection and the recommended-mods check. Both
// consult the plugin table; the recommended-mods check also looks at the
// script-extender plugin segment, since most of those mods are DLLs
// rather than plugins.

use crate::analyzers::Analyzer;
use crate::core::fragment::{compose, conditional_section, FragmentKind, ReportFragment};
use crate::core::knowledge;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult, Severity};

// =============================================================================
// ModConflictAnalyzer
// =============================================================================

pub struct ModConflictAnalyzer;

impl Analyzer for ModConflictAnalyzer {
    fn name(&self) -> &'static str {
        "mod-conflicts"
    }

    fn priority(&self) -> i32 {
        75
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

        for rule in &knowledge::builtin().mod_conflicts {
            if !(log.mod_present(&rule.first) && log.mod_present(&rule.second)) {
                continue;
            }
            let kind = match rule.severity {
                Severity::Error | Severity::Critical => FragmentKind::Error,
                _ => FragmentKind::Warning,
            };
            findings.push(ReportFragment::Leaf {
                kind,
                title: Some(format!("{} + {}", rule.first, rule.second)),
                order: 0,
                content: Some(rule.note.clone()),
            });
            tracing::debug!(first = %rule.first, second = %rule.second, "Mod conflict matched");
        }

        // Missing hard requirements read like conflicts to the user:
        // the mod is present but cannot work.
        for requirement in &knowledge::builtin().mod_requirements {
            if log.mod_present(&requirement.plugin)
                && !log.mod_present(&requirement.requires)
            {
                findings.push(ReportFragment::warning(
                    format!("{} without {}", requirement.plugin, requirement.requires),
                    requirement.note.clone(),
                ));
                tracing::debug!(
                    plugin = %requirement.plugin,
                    missing = %requirement.requires,
                    "Mod requirement unmet"
                );
            }
        }

        let fragment = if findings.is_empty() {
            ReportFragment::section(
                "Mod Conflicts",
                vec![ReportFragment::text(
                    FragmentKind::Success,
                    "No known conflicting mod pairs are active together.",
                )],
            )
        } else {
            conditional_section("Mod Conflicts", 0, || compose(findings))
        };

        AnalysisResult::ok(self.name(), fragment)
    }
}

// =============================================================================
// ImportantModsAnalyzer
// =============================================================================

pub struct ImportantModsAnalyzer;

impl Analyzer for ImportantModsAnalyzer {
    fn name(&self) -> &'static str {
        "important-mods"
    }

    fn priority(&self) -> i32 {
        70
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog, AnalysisKind::ModScan]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let log = &ctx.parsed_log;
        let mut children: Vec<ReportFragment> = Vec::new();

        for important in &knowledge::builtin().important_mods {
            if log.mod_present(&important.plugin) {
                children.push(ReportFragment::success(
                    important.display_name.clone(),
                    "installed",
                ));
            } else {
                children.push(ReportFragment::warning(
                    important.display_name.clone(),
                    format!("not detected — {}", important.note),
                ));
            }
        }

        AnalysisResult::ok(
            self.name(),
            ReportFragment::section("Recommended Mods", children),
        )
    }
}
