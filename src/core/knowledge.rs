// Scanner111 - core/knowledge.rs
//
// Embedded diagnostic databases: suspect patterns, plugin warnings,
// known conflicts, game-file digests, and expected crash-generator
// settings. Shipped in-binary via include_str! so a scanner install is
// self-contained; the YAML sources live under data/.

use crate::core::model::Severity;
use serde::Deserialize;
use std::sync::OnceLock;

const SUSPECTS_YAML: &str = include_str!("../../data/suspects.yaml");
const PLUGINS_YAML: &str = include_str!("../../data/plugins.yaml");
const GAMES_YAML: &str = include_str!("../../data/games.yaml");

// =============================================================================
// Record shapes (mirroring the YAML layout)
// =============================================================================

/// One suspect pattern group matched against the main error.
#[derive(Debug, Clone, Deserialize)]
pub struct SuspectPattern {
    /// Stable identifier, e.g. "MemoryError".
    pub id: String,
    pub severity: Severity,
    pub description: String,
    /// Case-insensitive substrings; any match triggers the suspect.
    pub patterns: Vec<String>,
}

/// One call-stack suspect rule.
///
/// Fires when every `required` term appears in the call stack, at least
/// one `any` term appears (when that list is non-empty), no `not` term
/// appears, and the required terms occur `min_count` times in total.
#[derive(Debug, Clone, Deserialize)]
pub struct StackSuspect {
    pub id: String,
    pub severity: Severity,
    pub description: String,
    pub required: Vec<String>,
    #[serde(default)]
    pub any: Vec<String>,
    #[serde(default)]
    pub not: Vec<String>,
    #[serde(default = "default_min_count")]
    pub min_count: usize,
}

fn default_min_count() -> usize {
    1
}

/// A single plugin with a known problem.
#[derive(Debug, Clone, Deserialize)]
pub struct PluginWarning {
    pub plugin: String,
    pub severity: Severity,
    pub note: String,
}

/// A script-extender DLL with a known problem.
#[derive(Debug, Clone, Deserialize)]
pub struct XsePluginWarning {
    pub dll: String,
    pub severity: Severity,
    pub note: String,
}

/// A pair of plugins that must not be active together.
#[derive(Debug, Clone, Deserialize)]
pub struct ModConflict {
    pub first: String,
    pub second: String,
    pub severity: Severity,
    pub note: String,
}

/// A plugin that needs another mod installed to function.
#[derive(Debug, Clone, Deserialize)]
pub struct ModRequirement {
    pub plugin: String,
    pub requires: String,
    pub note: String,
}

/// A mod whose presence is recommended.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportantMod {
    pub plugin: String,
    pub display_name: String,
    pub note: String,
}

/// A mod worth calling out when present (informational only).
#[derive(Debug, Clone, Deserialize)]
pub struct NotableMod {
    pub plugin: String,
    /// When set, the note only applies on this GPU vendor.
    #[serde(default)]
    pub gpu_vendor: Option<String>,
    pub note: String,
}

/// A loose-file extension the mod staging scan flags.
#[derive(Debug, Clone, Deserialize)]
pub struct ProblemExtension {
    pub extension: String,
    pub note: String,
}

/// A known crash generator and its latest released version.
#[derive(Debug, Clone, Deserialize)]
pub struct CrashGenerator {
    pub name: String,
    pub latest: String,
    pub note: String,
}

/// Known-good digest for a critical game file.
#[derive(Debug, Clone, Deserialize)]
pub struct GameFileHash {
    pub game: String,
    pub path: String,
    pub sha256: String,
}

/// One dotted key with its expected value in a crash-generator TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedSetting {
    pub key: String,
    pub expected: String,
    pub note: String,
}

/// Expected settings grouped by configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct ExpectedSettingsFile {
    pub file: String,
    pub entries: Vec<ExpectedSetting>,
}

/// A Documents/My Games INI toggle worth reporting.
#[derive(Debug, Clone, Deserialize)]
pub struct IniToggle {
    pub file: String,
    pub section: String,
    pub key: String,
    pub expected: String,
    pub note: String,
}

// =============================================================================
// Database roots
// =============================================================================

#[derive(Debug, Deserialize)]
struct SuspectsDoc {
    suspects: Vec<SuspectPattern>,
    #[serde(default)]
    stack_suspects: Vec<StackSuspect>,
}

#[derive(Debug, Deserialize)]
struct PluginsDoc {
    plugin_warnings: Vec<PluginWarning>,
    #[serde(default)]
    xse_plugin_warnings: Vec<XsePluginWarning>,
    mod_conflicts: Vec<ModConflict>,
    #[serde(default)]
    mod_requirements: Vec<ModRequirement>,
    important_mods: Vec<ImportantMod>,
    notable_mods: Vec<NotableMod>,
    record_kinds: Vec<String>,
    problem_extensions: Vec<ProblemExtension>,
    reformat_remove: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GamesDoc {
    #[serde(default)]
    crash_generators: Vec<CrashGenerator>,
    game_files: Vec<GameFileHash>,
    expected_settings: Vec<ExpectedSettingsFile>,
    ini_toggles: Vec<IniToggle>,
}

/// The merged, immutable diagnostic database.
#[derive(Debug)]
pub struct KnowledgeBase {
    pub suspects: Vec<SuspectPattern>,
    pub stack_suspects: Vec<StackSuspect>,
    pub plugin_warnings: Vec<PluginWarning>,
    pub xse_plugin_warnings: Vec<XsePluginWarning>,
    pub mod_conflicts: Vec<ModConflict>,
    pub mod_requirements: Vec<ModRequirement>,
    pub important_mods: Vec<ImportantMod>,
    pub notable_mods: Vec<NotableMod>,
    pub record_kinds: Vec<String>,
    pub problem_extensions: Vec<ProblemExtension>,
    pub reformat_remove: Vec<String>,
    pub crash_generators: Vec<CrashGenerator>,
    pub game_files: Vec<GameFileHash>,
    pub expected_settings: Vec<ExpectedSettingsFile>,
    pub ini_toggles: Vec<IniToggle>,
}

impl KnowledgeBase {
    /// Latest-version entry for a crash generator (case-insensitive).
    pub fn crash_generator(&self, name: &str) -> Option<&CrashGenerator> {
        self.crash_generators
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name))
    }

    /// Game-file digests for one game (matched case-insensitively).
    pub fn game_files_for(&self, game: &str) -> Vec<&GameFileHash> {
        self.game_files
            .iter()
            .filter(|f| f.game.eq_ignore_ascii_case(game))
            .collect()
    }

    /// Expected settings for one configuration file name.
    pub fn expected_settings_for(&self, file: &str) -> Option<&ExpectedSettingsFile> {
        self.expected_settings
            .iter()
            .find(|f| f.file.eq_ignore_ascii_case(file))
    }
}

/// The embedded database, parsed once per process.
///
/// The embedded YAML is part of the build; a parse failure here is a
/// build defect caught by the tests below, so the expect is acceptable.
pub fn builtin() -> &'static KnowledgeBase {
    static KB: OnceLock<KnowledgeBase> = OnceLock::new();
    KB.get_or_init(|| {
        let suspects: SuspectsDoc =
            serde_yaml::from_str(SUSPECTS_YAML).expect("embedded suspects.yaml is valid");
        let plugins: PluginsDoc =
            serde_yaml::from_str(PLUGINS_YAML).expect("embedded plugins.yaml is valid");
        let games: GamesDoc =
            serde_yaml::from_str(GAMES_YAML).expect("embedded games.yaml is valid");

        KnowledgeBase {
            stack_suspects: suspects.stack_suspects,
            suspects: suspects.suspects,
            plugin_warnings: plugins.plugin_warnings,
            xse_plugin_warnings: plugins.xse_plugin_warnings,
            mod_conflicts: plugins.mod_conflicts,
            mod_requirements: plugins.mod_requirements,
            important_mods: plugins.important_mods,
            notable_mods: plugins.notable_mods,
            record_kinds: plugins.record_kinds,
            problem_extensions: plugins.problem_extensions,
            reformat_remove: plugins.reformat_remove,
            crash_generators: games.crash_generators,
            game_files: games.game_files,
            expected_settings: games.expected_settings,
            ini_toggles: games.ini_toggles,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The embedded YAML must parse; this is the guard behind the
    /// expect() in builtin().
    #[test]
    fn test_builtin_database_parses() {
        let kb = builtin();
        assert!(!kb.suspects.is_empty());
        assert!(!kb.plugin_warnings.is_empty());
        assert!(!kb.mod_conflicts.is_empty());
        assert!(!kb.record_kinds.is_empty());
        assert!(!kb.reformat_remove.is_empty());
    }

    #[test]
    fn test_suspect_ids_are_unique() {
        let kb = builtin();
        let mut ids: Vec<&str> = kb.suspects.iter().map(|s| s.id.as_str()).collect();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total, "duplicate suspect ids in suspects.yaml");
    }

    #[test]
    fn test_known_suspects_present() {
        let kb = builtin();
        for id in ["MemoryError", "NullReferenceError", "GraphicsError"] {
            assert!(
                kb.suspects.iter().any(|s| s.id == id),
                "suspect {id} missing from database"
            );
        }
    }

    #[test]
    fn test_crash_generator_lookup() {
        let kb = builtin();
        assert!(kb.crash_generator("buffout 4").is_some());
        assert!(kb.crash_generator("Unknown Logger").is_none());
    }

    #[test]
    fn test_stack_suspects_and_requirements_present() {
        let kb = builtin();
        assert!(!kb.stack_suspects.is_empty());
        assert!(kb.stack_suspects.iter().all(|s| !s.required.is_empty()));
        assert!(kb.stack_suspects.iter().all(|s| s.min_count >= 1));
        assert!(!kb.mod_requirements.is_empty());
        assert!(!kb.xse_plugin_warnings.is_empty());
    }

    #[test]
    fn test_vendor_qualified_notable_mods_name_known_vendors() {
        let kb = builtin();
        for entry in &kb.notable_mods {
            if let Some(vendor) = &entry.gpu_vendor {
                assert!(
                    ["NVIDIA", "AMD", "Intel"].contains(&vendor.as_str()),
                    "unexpected vendor {vendor} for {}",
                    entry.plugin
                );
            }
        }
    }

    #[test]
    fn test_game_files_filter_by_game() {
        let kb = builtin();
        let f4 = kb.game_files_for("Fallout 4");
        assert!(!f4.is_empty());
        assert!(f4.iter().all(|f| f.game == "Fallout 4"));
        assert!(kb.game_files_for("No Such Game").is_empty());
    }

    #[test]
    fn test_expected_settings_lookup_is_case_insensitive() {
        let kb = builtin();
        assert!(kb.expected_settings_for("buffout4.toml").is_some());
        assert!(kb.expected_settings_for("Unknown.toml").is_none());
    }

    #[test]
    fn test_game_file_digests_are_well_formed() {
        let kb = builtin();
        for f in &kb.game_files {
            assert_eq!(f.sha256.len(), 64, "digest for {} is not SHA-256", f.path);
            assert!(f.sha256.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }
}
