// Scanner111 - analyzers/form_ids.rs
//
// Form ID extraction: pulls 8-hex-digit record identifiers out of the
// probable call stack, drops dynamic (FF-prefixed) forms, counts
// repeats, and resolves the owning plugin from the load-order prefix
// byte.

use crate::analyzers::Analyzer;
use crate::core::fragment::{FragmentKind, ReportFragment};
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult, ParsedCrashLog};
use crate::core::settings::Scope;
use crate::util::constants;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;

fn form_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // The trailing boundary keeps longer hex tokens (14-digit code
    // addresses like 0x7FF6D23B6FDD) from yielding a bogus 8-digit prefix.
    RE.get_or_init(|| Regex::new(r"0x([0-9A-Fa-f]{8})\b").expect("form id regex is valid"))
}

/// One extracted Form ID with its repeat count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormIdHit {
    /// Uppercase 8-hex-digit id, without the 0x prefix.
    pub form_id: String,
    /// How many call-stack lines referenced it.
    pub count: usize,
}

/// Extract Form IDs from the call stack in first-seen order.
///
/// IDs whose leading byte is FF are runtime-created forms owned by no
/// plugin and are dropped entirely.
pub fn extract_form_ids(call_stack: &[String]) -> Vec<FormIdHit> {
    let re = form_id_regex();
    let mut hits: Vec<FormIdHit> = Vec::new();
    for line in call_stack {
        for caps in re.captures_iter(line) {
            let id = caps[1].to_uppercase();
            if id.starts_with("FF") {
                continue;
            }
            match hits.iter_mut().find(|h| h.form_id == id) {
                Some(hit) => hit.count += 1,
                None => hits.push(FormIdHit { form_id: id, count: 1 }),
            }
        }
    }
    hits
}

/// Resolve the owning plugin of a Form ID from its first byte.
fn owning_plugin<'a>(log: &'a ParsedCrashLog, form_id: &str) -> Option<&'a str> {
    let byte = u8::from_str_radix(&form_id[..2], 16).ok()?;
    log.plugin_for_load_byte(byte)
}

/// Load an optional local Form ID description database.
///
/// Line format: `XXXXXXXX | Plugin.esp | Description`. Malformed lines
/// are skipped; descriptions are keyed by uppercase id. The database is
/// pointed at by the Game-scope setting "form_id_db" and is entirely
/// optional.
pub fn load_form_id_db(path: &Path) -> HashMap<String, String> {
    let mut db = HashMap::new();
    let Ok(content) = crate::platform::fs::read_file_lossy(path) else {
        tracing::debug!(path = %path.display(), "Form ID database not readable, skipped");
        return db;
    };
    for line in content.lines() {
        let mut parts = line.splitn(3, '|');
        let (Some(id), Some(_plugin), Some(description)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let id = id.trim().to_uppercase();
        if id.len() == 8 && id.chars().all(|c| c.is_ascii_hexdigit()) {
            db.insert(id, description.trim().to_string());
        }
    }
    db
}

pub struct FormIdAnalyzer;

impl Analyzer for FormIdAnalyzer {
    fn name(&self) -> &'static str {
        "form-ids"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let log = &ctx.parsed_log;
        let hits = extract_form_ids(&log.call_stack);

        // Optional local description database.
        let db = ctx
            .settings
            .get_string(Scope::Game, "form_id_db")
            .map(|p| load_form_id_db(Path::new(&p)))
            .unwrap_or_default();

        let fragment = if hits.is_empty() {
            ReportFragment::section(
                "Form ID Suspects",
                vec![ReportFragment::text(
                    FragmentKind::Info,
                    constants::NO_FORM_ID_SUSPECTS,
                )],
            )
        } else {
            let listing = hits
                .iter()
                .map(|hit| {
                    let owner = owning_plugin(log, &hit.form_id).unwrap_or(constants::UNKNOWN);
                    match db.get(&hit.form_id) {
                        Some(description) => format!(
                            "- Form ID: {} | [{}] | {} | {}",
                            hit.form_id, owner, hit.count, description
                        ),
                        None => {
                            format!("- Form ID: {} | [{}] | {}", hit.form_id, owner, hit.count)
                        }
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            ReportFragment::section(
                "Form ID Suspects",
                vec![ReportFragment::Leaf {
                    kind: FragmentKind::Warning,
                    title: Some(format!("{} Form ID(s) referenced in the call stack", hits.len())),
                    order: 0,
                    content: Some(listing),
                }],
            )
        };

        let mut result = AnalysisResult::ok(self.name(), fragment);
        result
            .metadata
            .insert("form_id_count".to_string(), hits.len().to_string());
        result
    }
}
