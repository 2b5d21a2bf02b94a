// Scanner111 - analyzers/plugin_limit.rs
//
// Load-order headroom check: counts full (non-light) plugins against
// the engine's 254-slot cap. Light FE-slot plugins do not consume full
// slots and are excluded from the count.

use crate::analyzers::Analyzer;
use crate::core::fragment::ReportFragment;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult};
use crate::util::constants;

/// Where a load order sits relative to the full-plugin cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitState {
    UnderThreshold,
    /// At or past the warning threshold but still loadable.
    Approaching,
    /// At or past the hard cap; the engine cannot load this order.
    Exceeded,
}

/// Classify a full-plugin count.
pub fn classify(full_plugins: usize) -> LimitState {
    if full_plugins >= constants::PLUGIN_CRITICAL_THRESHOLD {
        LimitState::Exceeded
    } else if full_plugins >= constants::PLUGIN_WARN_THRESHOLD {
        LimitState::Approaching
    } else {
        LimitState::UnderThreshold
    }
}

pub struct PluginLimitAnalyzer;

impl Analyzer for PluginLimitAnalyzer {
    fn name(&self) -> &'static str {
        "plugin-limit"
    }

    fn priority(&self) -> i32 {
        85
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::CrashLog]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let log = &ctx.parsed_log;
        let full = log.full_plugin_count();
        let light = log.light_plugin_count();

        let counts = format!("{full} full plugin(s), {light} light plugin(s) in the load order.");
        let finding = match classify(full) {
            LimitState::Exceeded => ReportFragment::critical(
                "Full Plugin Limit Exceeded",
                format!(
                    "{counts}\nThe engine supports at most {} full plugins; convert mods to \
                     light (ESL) plugins or disable some.",
                    constants::PLUGIN_CRITICAL_THRESHOLD - 1
                ),
            ),
            LimitState::Approaching => ReportFragment::warning(
                "Approaching Full Plugin Limit",
                format!(
                    "{counts}\nOnly {} full slot(s) remain before the cap.",
                    constants::PLUGIN_CRITICAL_THRESHOLD - 1 - full
                ),
            ),
            LimitState::UnderThreshold => ReportFragment::success("Plugin Count", counts),
        };

        AnalysisResult::ok(
            self.name(),
            ReportFragment::section("Plugin Limit", vec![finding]),
        )
    }
}
