// Scanner111 - analyzers/environment.rs
//
// Environment-level analyzers: GPU vendor inference from the system
// specs and module list, notable-mod detection from the load order, and
// the mod staging folder scan.

use crate::analyzers::Analyzer;
use crate::core::fragment::{compose, conditional_section, FragmentKind, ReportFragment};
use crate::core::knowledge;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult, ParsedCrashLog};
use crate::core::settings::Scope;
use crate::util::constants;

// =============================================================================
// GpuAnalyzer
// =============================================================================

/// shared_data key published by the GPU analyzer.
pub const GPU_VENDOR_KEY: &str = "gpu_vendor";

/// (needle, vendor) pairs checked against the system specs and modules.
const GPU_SIGNATURES: &[(&str, &str)] = &[
    ("nvidia", "NVIDIA"),
    ("geforce", "NVIDIA"),
    ("nvwgf2umx.dll", "NVIDIA"),
    ("amd ", "AMD"),
    ("radeon", "AMD"),
    ("atidxx64.dll", "AMD"),
    ("intel(r)", "Intel"),
    ("intel arc", "Intel"),
    ("igxelpicd64.dll", "Intel"),
];

/// Infer the GPU vendor from the SYSTEM SPECS and MODULES segments.
pub fn detect_gpu_vendor(log: &ParsedCrashLog) -> Option<&'static str> {
    let lines = log
        .other_segments
        .get("SYSTEM SPECS:")
        .into_iter()
        .chain(log.other_segments.get("MODULES:"))
        .flatten();
    for line in lines {
        let lower = line.to_lowercase();
        for (needle, vendor) in GPU_SIGNATURES {
            if lower.contains(needle) {
                return Some(vendor);
            }
        }
    }
    None
}

pub struct GpuAnalyzer;

impl Analyzer for GpuAnalyzer {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn priority(&self) -> i32 {
        65
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let fragment = match detect_gpu_vendor(&ctx.parsed_log) {
            Some(vendor) => {
                ctx.set_shared(GPU_VENDOR_KEY, vendor);
                ReportFragment::section(
                    "Graphics",
                    vec![ReportFragment::info("GPU Vendor", vendor)],
                )
            }
            None => ReportFragment::section(
                "Graphics",
                vec![ReportFragment::text(
                    FragmentKind::Info,
                    "GPU vendor could not be determined from the log.",
                )],
            ),
        };
        AnalysisResult::ok(self.name(), fragment)
    }
}

// =============================================================================
// ModDetectionAnalyzer
// =============================================================================

pub struct ModDetectionAnalyzer;

impl Analyzer for ModDetectionAnalyzer {
    fn name(&self) -> &'static str {
        "mod-detection"
    }

    fn priority(&self) -> i32 {
        55
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog, AnalysisKind::ModScan]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let log = &ctx.parsed_log;
        // The GPU analyzer may or may not have published the vendor yet;
        // vendor-qualified notes only fire once the fact is present.
        let gpu_vendor = ctx.get_shared(GPU_VENDOR_KEY);
        let findings: Vec<ReportFragment> = knowledge::builtin()
            .notable_mods
            .iter()
            .filter(|m| log.plugin_token(&m.plugin).is_some())
            .filter(|m| match (&m.gpu_vendor, &gpu_vendor) {
                (None, _) => true,
                (Some(wanted), Some(detected)) => wanted.eq_ignore_ascii_case(detected),
                (Some(_), None) => false,
            })
            .map(|m| match &m.gpu_vendor {
                Some(vendor) => ReportFragment::warning(
                    m.plugin.clone(),
                    format!("({vendor} GPU) {}", m.note),
                ),
                None => ReportFragment::info(m.plugin.clone(), m.note.clone()),
            })
            .collect();

        let fragment = if findings.is_empty() {
            ReportFragment::Empty
        } else {
            conditional_section("Notable Mods", 0, || compose(findings))
        };

        // An empty fragment is a valid "nothing to say" result.
        AnalysisResult::ok(self.name(), fragment)
    }
}

// =============================================================================
// ModFileScanAnalyzer
// =============================================================================

/// One problematic file found in the staging folder.
#[derive(Debug, Clone)]
pub struct ProblemFile {
    pub path: std::path::PathBuf,
    pub note: String,
}

/// Walk the staging folder looking for problem extensions.
///
/// Depth and file-count limits keep a pathological folder from stalling
/// the scan; per-entry walk errors are skipped.
pub fn scan_staging_dir(
    dir: &std::path::Path,
    extensions: &[knowledge::ProblemExtension],
) -> Vec<ProblemFile> {
    let mut found = Vec::new();
    let walker = walkdir::WalkDir::new(dir)
        .max_depth(constants::MOD_SCAN_MAX_DEPTH)
        .follow_links(false)
        .into_iter()
        .flatten()
        .take(constants::MOD_SCAN_MAX_FILES);

    for entry in walker {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_lowercase();
        for problem in extensions {
            if name.ends_with(&problem.extension.to_lowercase()) {
                found.push(ProblemFile {
                    path: entry.path().to_path_buf(),
                    note: problem.note.clone(),
                });
                break;
            }
        }
    }
    found
}

pub struct ModFileScanAnalyzer;

impl Analyzer for ModFileScanAnalyzer {
    fn name(&self) -> &'static str {
        "mod-file-scan"
    }

    fn priority(&self) -> i32 {
        30
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::ModScan]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let Some(dir) = ctx.settings.get_string(Scope::Settings, "mod_staging_dir") else {
            return AnalysisResult::ok(
                self.name(),
                ReportFragment::section(
                    "Mod Files",
                    vec![ReportFragment::text(
                        FragmentKind::Info,
                        "Mod staging directory not configured; file scan skipped.",
                    )],
                ),
            );
        };
        let dir = std::path::PathBuf::from(dir);
        if !dir.is_dir() {
            return AnalysisResult::ok(
                self.name(),
                ReportFragment::section(
                    "Mod Files",
                    vec![ReportFragment::warning(
                        "Staging directory missing",
                        format!("'{}' does not exist or is not a directory.", dir.display()),
                    )],
                ),
            );
        }

        let problems = scan_staging_dir(&dir, &knowledge::builtin().problem_extensions);
        tracing::debug!(dir = %dir.display(), problems = problems.len(), "Mod staging scanned");

        let fragment = if problems.is_empty() {
            ReportFragment::section(
                "Mod Files",
                vec![ReportFragment::text(
                    FragmentKind::Success,
                    "No problematic files in the mod staging folder.",
                )],
            )
        } else {
            conditional_section("Mod Files", 0, || {
                compose(
                    problems
                        .iter()
                        .map(|p| {
                            ReportFragment::warning(
                                p.path.display().to_string(),
                                p.note.clone(),
                            )
                        })
                        .collect(),
                )
            })
        };

        AnalysisResult::ok(self.name(), fragment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::testutil;
    use crate::core::model::{AnalysisStatus, Severity};
    use crate::core::settings::{Scope, SettingsView};
    use std::collections::HashMap;

    fn log_with_specs(lines: &[&str]) -> ParsedCrashLog {
        let mut log = ParsedCrashLog::default();
        log.other_segments.insert(
            "SYSTEM SPECS:".to_string(),
            lines.iter().map(|s| (*s).to_string()).collect(),
        );
        log
    }

    #[test]
    fn test_gpu_vendor_from_system_specs() {
        assert_eq!(
            detect_gpu_vendor(&log_with_specs(&["\tGPU #1: Nvidia GeForce RTX 3080"])),
            Some("NVIDIA")
        );
        assert_eq!(
            detect_gpu_vendor(&log_with_specs(&["\tGPU #1: AMD Radeon RX 6800"])),
            Some("AMD")
        );
        assert_eq!(detect_gpu_vendor(&ParsedCrashLog::default()), None);
    }

    #[test]
    fn test_gpu_vendor_from_modules_segment() {
        let mut log = ParsedCrashLog::default();
        log.other_segments.insert(
            "MODULES:".to_string(),
            vec!["\tnvwgf2umx.dll".to_string()],
        );
        assert_eq!(detect_gpu_vendor(&log), Some("NVIDIA"));
    }

    #[test]
    fn test_gpu_analyzer_publishes_shared_fact() {
        let ctx = testutil::context(log_with_specs(&["\tGPU #1: Nvidia GeForce RTX 3080"]));
        let result = GpuAnalyzer.analyze(&ctx);
        assert_eq!(result.status, AnalysisStatus::Ok);
        assert_eq!(ctx.get_shared(GPU_VENDOR_KEY), Some("NVIDIA".to_string()));
    }

    #[test]
    fn test_mod_detection_reports_notable_mods() {
        let log = testutil::log_with_plugins(&[("SS2.esm", "05")]);
        let result = ModDetectionAnalyzer.analyze(&testutil::context(log));
        assert!(format!("{:?}", result.fragment).contains("SS2.esm"));

        let clean = testutil::log_with_plugins(&[("Fallout4.esm", "00")]);
        let result = ModDetectionAnalyzer.analyze(&testutil::context(clean));
        assert_eq!(result.fragment, Some(ReportFragment::Empty));
    }

    #[test]
    fn test_vendor_qualified_note_needs_matching_gpu_fact() {
        let log = testutil::log_with_plugins(&[("WeaponDebrisCrashFix.esp", "10")]);

        // No published vendor: the AMD-only note stays silent.
        let ctx = testutil::context(log.clone());
        let result = ModDetectionAnalyzer.analyze(&ctx);
        assert!(!format!("{:?}", result.fragment).contains("WeaponDebrisCrashFix"));

        // AMD vendor published (normally by the GPU analyzer): it fires.
        let ctx = testutil::context(log.clone());
        ctx.set_shared(GPU_VENDOR_KEY, "AMD");
        let result = ModDetectionAnalyzer.analyze(&ctx);
        assert!(format!("{:?}", result.fragment).contains("WeaponDebrisCrashFix"));
        assert_eq!(result.severity, Severity::Warning);

        // NVIDIA vendor: silent again.
        let ctx = testutil::context(log);
        ctx.set_shared(GPU_VENDOR_KEY, "NVIDIA");
        let result = ModDetectionAnalyzer.analyze(&ctx);
        assert!(!format!("{:?}", result.fragment).contains("WeaponDebrisCrashFix"));
    }

    #[test]
    fn test_staging_scan_flags_problem_extensions() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("SomeMod")).unwrap();
        std::fs::write(dir.path().join("SomeMod/texture.ba2.bak"), b"x").unwrap();
        std::fs::write(dir.path().join("SomeMod/script.psc"), b"x").unwrap();
        std::fs::write(dir.path().join("SomeMod/fine.esp"), b"x").unwrap();

        let problems = scan_staging_dir(dir.path(), &knowledge::builtin().problem_extensions);
        assert_eq!(problems.len(), 2);
    }

    #[test]
    fn test_mod_file_scan_with_configured_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("stale.dll.tmp"), b"x").unwrap();

        let mut docs = HashMap::new();
        docs.insert(
            Scope::Settings,
            serde_yaml::from_str(&format!("mod_staging_dir: '{}'\n", dir.path().display()))
                .unwrap(),
        );
        let ctx = testutil::context_with_settings(
            ParsedCrashLog::default(),
            SettingsView::from_documents(docs),
        );
        let result = ModFileScanAnalyzer.analyze(&ctx);
        assert_eq!(result.severity, Severity::Warning);
        assert!(format!("{:?}", result.fragment).contains("stale.dll.tmp"));
    }

    #[test]
    fn test_mod_file_scan_unconfigured_skips() {
        let result =
            ModFileScanAnalyzer.analyze(&testutil::context(ParsedCrashLog::default()));
        assert!(!result.has_findings);
        assert!(format!("{:?}", result.fragment).contains("file scan skipped"));
    }
}
