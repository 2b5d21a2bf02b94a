// Scanner111 - core/template.rs
//
// Predefined report views. A template selects which analyzer sections
// appear, the minimum severity shown, and the overall shape (table of
// contents, severity grouping). Unknown template names fall back to
// "technical".

use crate::core::fragment::{FragmentKind, ReportFragment};
use crate::core::model::{AnalysisResult, AnalysisStatus, Severity};
use crate::core::report::{ComposerOptions, ReportComposer};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

// =============================================================================
// Template definition
// =============================================================================

/// One report view.
#[derive(Debug, Clone)]
pub struct ReportTemplate {
    /// Registry key, matched case-insensitively.
    pub name: String,
    pub description: String,
    /// Analyzer names to include; None includes every analyzer.
    pub included_sections: Option<Vec<String>>,
    /// Results below this severity are omitted (failed results always
    /// surface through the errors section).
    pub min_severity: Severity,
    pub table_of_contents: bool,
    pub group_by_severity: bool,
    /// Free-text audience note shown in the report preamble.
    pub audience: String,
    /// Append per-analyzer durations and metadata.
    pub include_metadata: bool,
}

impl ReportTemplate {
    fn technical() -> Self {
        Self {
            name: "technical".to_string(),
            description: "Every analyzer section with full detail".to_string(),
            included_sections: None,
            min_severity: Severity::None,
            table_of_contents: true,
            group_by_severity: false,
            audience: "mod authors and power users".to_string(),
            include_metadata: false,
        }
    }

    fn executive() -> Self {
        Self {
            name: "executive".to_string(),
            description: "Actionable findings only, grouped by severity".to_string(),
            included_sections: None,
            min_severity: Severity::Warning,
            table_of_contents: false,
            group_by_severity: true,
            audience: "users deciding what to fix first".to_string(),
            include_metadata: false,
        }
    }

    fn summary() -> Self {
        Self {
            name: "summary".to_string(),
            description: "Counts and headline findings, one screen".to_string(),
            included_sections: Some(Vec::new()),
            min_severity: Severity::Warning,
            table_of_contents: false,
            group_by_severity: false,
            audience: "quick triage".to_string(),
            include_metadata: false,
        }
    }

    fn full() -> Self {
        Self {
            name: "full".to_string(),
            description: "Everything, including analyzer metadata".to_string(),
            included_sections: None,
            min_severity: Severity::None,
            table_of_contents: true,
            group_by_severity: false,
            audience: "bug reports and support threads".to_string(),
            include_metadata: true,
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// Aggregate numbers over one result set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReportStats {
    pub total_analyzers: usize,
    pub ok: usize,
    pub failed: usize,
    pub skipped: usize,
    pub with_findings: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub total_duration: Duration,
}

impl ReportStats {
    /// Render the counts as a report fragment (used by the summary
    /// template).
    pub fn to_fragment(&self) -> ReportFragment {
        let severities = self
            .by_severity
            .iter()
            .filter(|(severity, count)| **severity > Severity::None && **count > 0)
            .map(|(severity, count)| format!("{count} {severity}"))
            .collect::<Vec<_>>()
            .join(", ");
        ReportFragment::leaf(
            FragmentKind::Info,
            "Scan Statistics",
            format!(
                "{} analyzer(s): {} ok, {} failed, {} skipped; {} with findings{}{} in {} ms",
                self.total_analyzers,
                self.ok,
                self.failed,
                self.skipped,
                self.with_findings,
                if severities.is_empty() { "" } else { " — " },
                severities,
                self.total_duration.as_millis()
            ),
        )
    }
}

// =============================================================================
// Generator
// =============================================================================

/// Renders result sets through registered templates.
pub struct AdvancedReportGenerator {
    templates: HashMap<String, ReportTemplate>,
}

impl AdvancedReportGenerator {
    /// Generator with the four built-in templates registered.
    pub fn new() -> Self {
        let mut generator = Self {
            templates: HashMap::new(),
        };
        for template in [
            ReportTemplate::technical(),
            ReportTemplate::executive(),
            ReportTemplate::summary(),
            ReportTemplate::full(),
        ] {
            generator.register_template(template);
        }
        generator
    }

    /// Register or replace a template under its (lowercased) name.
    pub fn register_template(&mut self, template: ReportTemplate) {
        self.templates
            .insert(template.name.to_lowercase(), template);
    }

    /// Look up a template; unknown names fall back to "technical".
    pub fn template(&self, name: &str) -> &ReportTemplate {
        self.templates.get(&name.to_lowercase()).unwrap_or_else(|| {
            tracing::warn!(template = name, "Unknown template, using technical");
            self.templates
                .get("technical")
                .expect("technical template is registered in new()")
        })
    }

    /// Render `results` through the named template.
    pub fn generate_report(
        &self,
        results: &[AnalysisResult],
        template_name: &str,
        options: &ComposerOptions,
    ) -> String {
        let template = self.template(template_name);
        let fragments = self.fragments_for(results, template);
        ReportComposer::compose_from_fragments(fragments, options)
    }

    /// Aggregate counts for one result set.
    pub fn generate_statistics(&self, results: &[AnalysisResult]) -> ReportStats {
        let mut stats = ReportStats {
            total_analyzers: results.len(),
            ..Default::default()
        };
        for result in results {
            match result.status {
                AnalysisStatus::Ok => stats.ok += 1,
                AnalysisStatus::FailedWithError => stats.failed += 1,
                AnalysisStatus::Skipped => stats.skipped += 1,
            }
            if result.has_findings {
                stats.with_findings += 1;
            }
            *stats.by_severity.entry(result.severity).or_insert(0) += 1;
            stats.total_duration += result.duration;
        }
        stats
    }

    // -------------------------------------------------------------------------
    // Fragment assembly
    // -------------------------------------------------------------------------

    fn fragments_for(
        &self,
        results: &[AnalysisResult],
        template: &ReportTemplate,
    ) -> Vec<ReportFragment> {
        let selected: Vec<&AnalysisResult> = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::Ok)
            .filter(|r| r.severity >= template.min_severity)
            .filter(|r| match &template.included_sections {
                None => true,
                Some(names) => names
                    .iter()
                    .any(|n| n.eq_ignore_ascii_case(&r.analyzer_name)),
            })
            .collect();

        let mut fragments = vec![ReportFragment::Leaf {
            kind: FragmentKind::Header,
            title: Some(format!(
                "{} Report ({})",
                crate::util::constants::APP_NAME,
                template.name
            )),
            order: i32::MIN,
            content: None,
        }];

        let stats = self.generate_statistics(results);
        fragments.push(ReportFragment::text(
            FragmentKind::Notice,
            format!(
                "Audience: {}. Analyzers: {} ok, {} failed, {} skipped; {} with findings.",
                template.audience, stats.ok, stats.failed, stats.skipped, stats.with_findings
            ),
        ));

        if template.table_of_contents {
            let toc = selected
                .iter()
                .filter_map(|r| r.fragment.as_ref().and_then(|f| f.title()))
                .enumerate()
                .map(|(i, t)| format!("{}. {t}", i + 1))
                .collect::<Vec<_>>()
                .join("\n");
            if !toc.is_empty() {
                fragments
                    .push(ReportFragment::leaf(FragmentKind::Notice, "Contents", toc));
            }
        }

        if template.group_by_severity {
            fragments.extend(self.severity_groups(&selected));
        } else {
            fragments.extend(
                selected
                    .iter()
                    .filter_map(|r| r.fragment.clone()),
            );
        }

        // Summary template: statistics and headline titles instead of
        // full sections.
        if template
            .included_sections
            .as_ref()
            .is_some_and(Vec::is_empty)
        {
            fragments.push(stats.to_fragment());
            let headlines = results
                .iter()
                .filter(|r| r.severity >= template.min_severity && r.has_findings)
                .map(|r| format!("{} ({})", r.analyzer_name, r.severity))
                .collect::<Vec<_>>()
                .join("\n");
            if !headlines.is_empty() {
                fragments.push(ReportFragment::leaf(
                    FragmentKind::Warning,
                    "Findings",
                    headlines,
                ));
            } else {
                fragments.push(ReportFragment::text(
                    FragmentKind::Success,
                    "No findings at or above warning severity.",
                ));
            }
        }

        if template.include_metadata {
            let body = results
                .iter()
                .map(|r| {
                    let pairs = r
                        .metadata
                        .iter()
                        .map(|(k, v)| format!("{k}={v}"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    format!(
                        "{}: {:?} in {} ms{}{}",
                        r.analyzer_name,
                        r.status,
                        r.duration.as_millis(),
                        if pairs.is_empty() { "" } else { " — " },
                        pairs
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");
            fragments.push(
                ReportFragment::section(
                    "Analyzer Metadata",
                    vec![ReportFragment::text(FragmentKind::Info, body)],
                )
                .with_order(i32::MAX - 1),
            );
        }

        // The errors section always renders when something failed.
        let failures: Vec<&AnalysisResult> = results
            .iter()
            .filter(|r| r.status == AnalysisStatus::FailedWithError)
            .collect();
        if !failures.is_empty() {
            let body = failures
                .iter()
                .map(|r| format!("{}: {}", r.analyzer_name, r.errors.join("; ")))
                .collect::<Vec<_>>()
                .join("\n");
            fragments.push(
                ReportFragment::section(
                    "Analyzer Errors",
                    vec![ReportFragment::text(FragmentKind::Error, body)],
                )
                .with_order(i32::MAX),
            );
        }

        fragments
    }

    fn severity_groups(&self, selected: &[&AnalysisResult]) -> Vec<ReportFragment> {
        let mut groups = Vec::new();
        for (severity, title) in [
            (Severity::Critical, "Critical Findings"),
            (Severity::Error, "Errors"),
            (Severity::Warning, "Warnings"),
            (Severity::Info, "Information"),
        ] {
            let children: Vec<ReportFragment> = selected
                .iter()
                .filter(|r| r.severity == severity)
                .filter_map(|r| r.fragment.clone())
                .collect();
            if !children.is_empty() {
                groups.push(ReportFragment::section(title, children));
            }
        }
        groups
    }
}

impl Default for AdvancedReportGenerator {
    fn default() -> Self {
        Self::new()
    }
}
