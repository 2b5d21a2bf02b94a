// Scanner111 - analyzers/records.rs
//
// Named-record scanner: finds four-letter record type signatures (NPC_,
// ACTI, WEAP, ...) in the probable call stack and reports which kinds of
// game records were being handled when the crash happened.

use crate::analyzers::Analyzer;
use crate::core::fragment::{compose, conditional_section, FragmentKind, ReportFragment};
use crate::core::knowledge;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult};
use regex::Regex;
use std::sync::OnceLock;

/// Example lines kept per record kind in the report.
const MAX_EXAMPLES: usize = 3;

/// Crash generators print editor IDs in single quotes after the record
/// type, e.g. `NPC_ 'Settler'`.
fn quoted_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"'([^']+)'").expect("quoted name regex is valid"))
}

/// Call-stack lines referencing one record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHits {
    pub kind: String,
    pub count: usize,
    pub examples: Vec<String>,
    /// Distinct quoted editor IDs on the matching lines.
    pub names: Vec<String>,
}

/// Scan the call stack for each configured record signature.
pub fn scan_records(call_stack: &[String], kinds: &[String]) -> Vec<RecordHits> {
    let name_re = quoted_name_regex();
    let mut results = Vec::new();
    for kind in kinds {
        let mut count = 0usize;
        let mut examples = Vec::new();
        let mut names: Vec<String> = Vec::new();
        for line in call_stack {
            if line.contains(kind.as_str()) {
                count += 1;
                if examples.len() < MAX_EXAMPLES {
                    examples.push(line.trim().to_string());
                }
                for caps in name_re.captures_iter(line) {
                    let name = caps[1].to_string();
                    if !names.contains(&name) && names.len() < MAX_EXAMPLES {
                        names.push(name);
                    }
                }
            }
        }
        if count > 0 {
            results.push(RecordHits {
                kind: kind.clone(),
                count,
                examples,
                names,
            });
        }
    }
    results
}

pub struct RecordScannerAnalyzer;

impl Analyzer for RecordScannerAnalyzer {
    fn name(&self) -> &'static str {
        "records"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let hits = scan_records(
            &ctx.parsed_log.call_stack,
            &knowledge::builtin().record_kinds,
        );

        let fragment = if hits.is_empty() {
            ReportFragment::section(
                "Named Records",
                vec![ReportFragment::text(
                    FragmentKind::Success,
                    "No named record references in the call stack.",
                )],
            )
        } else {
            conditional_section("Named Records", 0, || {
                compose(
                    hits.iter()
                        .map(|hit| {
                            let title = if hit.names.is_empty() {
                                format!("{} ({} reference(s))", hit.kind, hit.count)
                            } else {
                                format!(
                                    "{} ({} reference(s): {})",
                                    hit.kind,
                                    hit.count,
                                    hit.names.join(", ")
                                )
                            };
                            ReportFragment::info(title, hit.examples.join("\n"))
                        })
                        .collect(),
                )
            })
        };

        AnalysisResult::ok(self.name(), fragment)
    }
}
