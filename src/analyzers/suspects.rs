// Scanner111 - analyzers/suspects.rs
//
// Suspect scanner: matches the crash log's main error against the
// embedded pattern database (one critical finding per matched suspect)
// and evaluates the call-stack rules, which can demand required terms,
// alternatives, exclusions, and a minimum occurrence count.

use crate::analyzers::Analyzer;
use crate::core::fragment::{conditional_section, FragmentKind, ReportFragment};
use crate::core::knowledge::{self, StackSuspect};
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult, Severity};

/// Per-suspect match progression. A suspect with several patterns moves
/// through the states as its patterns hit the main error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchState {
    Unmatched,
    MatchedOnce,
    MatchedMany,
}

impl MatchState {
    fn advance(self) -> Self {
        match self {
            MatchState::Unmatched => MatchState::MatchedOnce,
            MatchState::MatchedOnce | MatchState::MatchedMany => MatchState::MatchedMany,
        }
    }
}

/// Match one suspect's patterns against the main error.
///
/// Returns the final state and the patterns that hit, in database order.
/// Matching is case-insensitive substring containment.
pub fn match_suspect(main_error: &str, patterns: &[String]) -> (MatchState, Vec<String>) {
    let haystack = main_error.to_lowercase();
    let mut state = MatchState::Unmatched;
    let mut hits = Vec::new();
    for pattern in patterns {
        if haystack.contains(&pattern.to_lowercase()) {
            state = state.advance();
            hits.push(pattern.clone());
        }
    }
    (state, hits)
}

/// Evaluate one call-stack rule.
///
/// Matching is case-insensitive over the joined stack text. All
/// `required` terms must appear; with a non-empty `any` list at least
/// one alternative must appear; any `not` term vetoes the rule; the
/// combined occurrence count of the required terms must reach
/// `min_count`.
pub fn match_stack_rule(call_stack: &[String], rule: &StackSuspect) -> bool {
    let haystack = call_stack.join("\n").to_lowercase();

    let mut occurrences = 0usize;
    for term in &rule.required {
        let count = haystack.matches(&term.to_lowercase()).count();
        if count == 0 {
            return false;
        }
        occurrences += count;
    }
    if !rule.any.is_empty()
        && !rule
            .any
            .iter()
            .any(|term| haystack.contains(&term.to_lowercase()))
    {
        return false;
    }
    if rule
        .not
        .iter()
        .any(|term| haystack.contains(&term.to_lowercase()))
    {
        return false;
    }
    occurrences >= rule.min_count
}

pub struct SuspectScannerAnalyzer;

impl Analyzer for SuspectScannerAnalyzer {
    fn name(&self) -> &'static str {
        "suspects"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let main_error = &ctx.parsed_log.main_error;
        let mut findings: Vec<ReportFragment> = Vec::new();

        for suspect in &knowledge::builtin().suspects {
            let (state, hits) = match_suspect(main_error, &suspect.patterns);
            if state == MatchState::Unmatched {
                continue;
            }
            let detail = match state {
                MatchState::MatchedOnce => format!("matched \"{}\"", hits[0]),
                _ => format!("matched {} patterns: {}", hits.len(), hits.join(", ")),
            };
            findings.push(ReportFragment::Leaf {
                kind: FragmentKind::Critical,
                title: Some(suspect.id.clone()),
                order: 0,
                content: Some(format!("{} ({detail})", suspect.description)),
            });
            tracing::debug!(suspect = %suspect.id, ?state, "Suspect matched");
        }

        for rule in &knowledge::builtin().stack_suspects {
            if !match_stack_rule(&ctx.parsed_log.call_stack, rule) {
                continue;
            }
            let kind = match rule.severity {
                Severity::Critical => FragmentKind::Critical,
                Severity::Error => FragmentKind::Error,
                _ => FragmentKind::Warning,
            };
            findings.push(ReportFragment::Leaf {
                kind,
                title: Some(rule.id.clone()),
                order: 0,
                content: Some(format!("{} (call stack)", rule.description)),
            });
            tracing::debug!(suspect = %rule.id, "Stack suspect matched");
        }

        let fragment = if findings.is_empty() {
            ReportFragment::section(
                "Crash Suspects",
                vec![ReportFragment::text(
                    FragmentKind::Success,
                    "Neither the main error nor the call stack matches a known crash suspect.",
                )],
            )
        } else {
            conditional_section("Crash Suspects", 0, || {
                crate::core::fragment::compose(findings)
            })
        };

        AnalysisResult::ok(self.name(), fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testutil;
    use crate::core::model::{AnalysisStatus, ParsedCrashLog, Severity};

    fn run(main_error: &str) -> AnalysisResult {
        let log = ParsedCrashLog {
            main_error: main_error.to_string(),
            ..Default::default()
        };
        SuspectScannerAnalyzer.analyze(&testutil::context(log))
    }

    /// Scenario: "out of memory" produces exactly one critical with the
    /// MemoryError id.
    #[test]
    fn test_out_of_memory_maps_to_memory_error() {
        let result = run("Unhandled exception: out of memory");
        assert_eq!(result.severity, Severity::Critical);
        assert!(result.has_findings);
        let rendered = format!("{:?}", result.fragment);
        assert!(rendered.contains("MemoryError"));
        assert!(!rendered.contains("NullReferenceError"));
    }

    #[test]
    fn test_null_pointer_maps_to_null_reference_error() {
        let result = run("Unhandled exception: null pointer dereference");
        assert!(format!("{:?}", result.fragment).contains("NullReferenceError"));
    }

    #[test]
    fn test_directx_maps_to_graphics_error() {
        let result = run("Unhandled exception: DirectX error in swap chain");
        assert!(format!("{:?}", result.fragment).contains("GraphicsError"));
    }

    #[test]
    fn test_clean_error_emits_success_note() {
        let result = run("Unhandled exception at 0x0001 in a calm and tidy module");
        assert_eq!(result.status, AnalysisStatus::Ok);
        assert!(!result.has_findings);
        assert_eq!(result.severity, Severity::None);
    }

    #[test]
    fn test_match_state_progression() {
        let patterns = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let (state, hits) = match_suspect("nothing here", &patterns);
        assert_eq!(state, MatchState::Unmatched);
        assert!(hits.is_empty());

        let (state, hits) = match_suspect("only ALPHA appears", &patterns);
        assert_eq!(state, MatchState::MatchedOnce);
        assert_eq!(hits, vec!["alpha"]);

        let (state, hits) = match_suspect("alpha then beta", &patterns);
        assert_eq!(state, MatchState::MatchedMany);
        assert_eq!(hits.len(), 2);
    }

    fn rule(
        required: &[&str],
        any: &[&str],
        not: &[&str],
        min_count: usize,
    ) -> knowledge::StackSuspect {
        knowledge::StackSuspect {
            id: "TestRule".to_string(),
            severity: Severity::Critical,
            description: "test".to_string(),
            required: required.iter().map(|s| (*s).to_string()).collect(),
            any: any.iter().map(|s| (*s).to_string()).collect(),
            not: not.iter().map(|s| (*s).to_string()).collect(),
            min_count,
        }
    }

    fn stack(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_stack_rule_required_and_min_count() {
        let lines = stack(&["\tnvwgf2umx.dll+1000", "\tnvwgf2umx.dll+2000"]);
        assert!(match_stack_rule(&lines, &rule(&["nvwgf2umx.dll"], &[], &[], 2)));
        assert!(!match_stack_rule(&lines, &rule(&["nvwgf2umx.dll"], &[], &[], 3)));
        assert!(!match_stack_rule(&lines, &rule(&["missing.dll"], &[], &[], 1)));
    }

    #[test]
    fn test_stack_rule_any_alternatives() {
        let lines = stack(&["\tf4ee.dll+100", "\tBodyMorphInterface::Apply"]);
        let hit = rule(&["f4ee.dll"], &["BodyMorphInterface", "OverlayInterface"], &[], 1);
        assert!(match_stack_rule(&lines, &hit));

        let miss = rule(&["f4ee.dll"], &["OverlayInterface"], &[], 1);
        assert!(!match_stack_rule(&lines, &miss));
    }

    #[test]
    fn test_stack_rule_not_veto() {
        let lines = stack(&["\tWorkshopScript::OnTimer", "\tBSPackedCombined+40"]);
        let vetoed = rule(&["WorkshopScript"], &[], &["BSPackedCombined"], 1);
        assert!(!match_stack_rule(&lines, &vetoed));
    }

    #[test]
    fn test_stack_rule_matching_is_case_insensitive() {
        let lines = stack(&["\tBHKWORLD::StepSimulation"]);
        assert!(match_stack_rule(&lines, &rule(&["bhkWorld"], &[], &[], 1)));
    }

    #[test]
    fn test_analyzer_reports_stack_suspects() {
        let log = ParsedCrashLog {
            call_stack: stack(&["\tBSPackedCombined+0x40", "\tFallout4.exe+1234"]),
            ..Default::default()
        };
        let result = SuspectScannerAnalyzer.analyze(&testutil::context(log));
        assert_eq!(result.severity, Severity::Critical);
        assert!(format!("{:?}", result.fragment).contains("PrecombinesCrash"));
    }

    #[test]
    fn test_cancelled_context_skips() {
        let log = ParsedCrashLog::default();
        let ctx = testutil::context(log);
        ctx.cancellation.cancel();
        let result = SuspectScannerAnalyzer.analyze(&ctx);
        assert_eq!(result.status, AnalysisStatus::Skipped);
        assert!(result.fragment.is_none());
    }
}
