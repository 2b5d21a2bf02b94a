// Scanner111 - core/settings.rs
//
// Read-only keyed settings lookup over YAML documents, one document per
// scope. Lookups use dotted keys ("logging.level"); a missing key or a
// type mismatch yields the caller's default unless the caller declared
// the key mandatory via the require_* variants.

use crate::util::error::{ConfigError, ScanError};
use serde_yaml::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Settings scopes, each backed by its own YAML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Static application data shipped with the scanner.
    Main,
    /// User-editable scanner settings.
    Settings,
    /// Static per-game data (paths, file maps, expected values).
    Game,
    /// User-editable per-game overrides.
    GameLocal,
}

impl Scope {
    /// On-disk file name for the scope. The game scopes are qualified by
    /// the active game's short name.
    pub fn file_name(&self, game: &str) -> String {
        match self {
            Scope::Main => "main.yaml".to_string(),
            Scope::Settings => "settings.yaml".to_string(),
            Scope::Game => format!("game-{}.yaml", game.to_lowercase()),
            Scope::GameLocal => format!("game-{}-local.yaml", game.to_lowercase()),
        }
    }
}

/// Immutable view over the loaded scope documents.
///
/// Shared read-only across analyzers for the duration of a run.
#[derive(Debug, Default)]
pub struct SettingsView {
    docs: HashMap<Scope, Value>,
}

impl SettingsView {
    /// A view with no documents: every lookup yields the default.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a view from in-memory YAML documents (used by tests and by
    /// the embedded knowledge databases).
    pub fn from_documents(docs: HashMap<Scope, Value>) -> Self {
        Self { docs }
    }

    /// Load all scope documents present under `dir` for `game`.
    ///
    /// Missing files are normal (the scope stays empty); a file that
    /// exists but fails to parse is a configuration error.
    pub fn load(dir: &Path, game: &str) -> Result<Self, ScanError> {
        let mut docs = HashMap::new();
        for scope in [Scope::Main, Scope::Settings, Scope::Game, Scope::GameLocal] {
            let path = dir.join(scope.file_name(game));
            if !path.exists() {
                continue;
            }
            docs.insert(scope, load_yaml_file(&path)?);
        }
        tracing::debug!(
            dir = %dir.display(),
            game,
            scopes = docs.len(),
            "Settings loaded"
        );
        Ok(Self { docs })
    }

    /// Walk a dotted key inside one scope. The GameLocal scope overrides
    /// Game on a per-key basis, so Game lookups consult GameLocal first.
    fn lookup(&self, scope: Scope, key: &str) -> Option<&Value> {
        if scope == Scope::Game {
            if let Some(v) = self.lookup(Scope::GameLocal, key) {
                return Some(v);
            }
        }
        let mut node = self.docs.get(&scope)?;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        Some(node)
    }

    // -------------------------------------------------------------------------
    // Typed getters (missing key or wrong type -> None / default)
    // -------------------------------------------------------------------------

    pub fn get_string(&self, scope: Scope, key: &str) -> Option<String> {
        self.lookup(scope, key)?.as_str().map(str::to_string)
    }

    pub fn get_string_or(&self, scope: Scope, key: &str, default: &str) -> String {
        self.get_string(scope, key)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_int(&self, scope: Scope, key: &str) -> Option<i64> {
        self.lookup(scope, key)?.as_i64()
    }

    pub fn get_int_or(&self, scope: Scope, key: &str, default: i64) -> i64 {
        self.get_int(scope, key).unwrap_or(default)
    }

    pub fn get_bool(&self, scope: Scope, key: &str) -> Option<bool> {
        self.lookup(scope, key)?.as_bool()
    }

    pub fn get_bool_or(&self, scope: Scope, key: &str, default: bool) -> bool {
        self.get_bool(scope, key).unwrap_or(default)
    }

    /// Sequence of scalars rendered as strings. Non-sequences yield None.
    pub fn get_list(&self, scope: Scope, key: &str) -> Option<Vec<String>> {
        let seq = self.lookup(scope, key)?.as_sequence()?;
        Some(
            seq.iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect(),
        )
    }

    /// String->string mapping. Non-mappings yield None.
    pub fn get_map(
        &self,
        scope: Scope,
        key: &str,
    ) -> Option<std::collections::BTreeMap<String, String>> {
        let mapping = self.lookup(scope, key)?.as_mapping()?;
        Some(
            mapping
                .iter()
                .filter_map(|(k, v)| {
                    let k = k.as_str()?.to_string();
                    let v = match v {
                        Value::String(s) => s.clone(),
                        Value::Number(n) => n.to_string(),
                        Value::Bool(b) => b.to_string(),
                        _ => return None,
                    };
                    Some((k, v))
                })
                .collect(),
        )
    }

    // -------------------------------------------------------------------------
    // Mandatory keys (missing -> Config error)
    // -------------------------------------------------------------------------

    pub fn require_string(&self, scope: Scope, key: &str) -> Result<String, ScanError> {
        match self.lookup(scope, key) {
            None => Err(ConfigError::MissingKey {
                scope: format!("{scope:?}"),
                key: key.to_string(),
            }
            .into()),
            Some(v) => v.as_str().map(str::to_string).ok_or_else(|| {
                ConfigError::TypeMismatch {
                    scope: format!("{scope:?}"),
                    key: key.to_string(),
                    expected: "string",
                }
                .into()
            }),
        }
    }
}

// =============================================================================
// YAML file helpers (shared with the config CLI subcommand)
// =============================================================================

/// Read and parse a YAML file.
pub fn load_yaml_file(path: &Path) -> Result<Value, ScanError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let value = serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(value)
}

/// Serialise a YAML document back to disk, creating parent directories.
pub fn save_yaml_file(path: &Path, value: &Value) -> Result<(), ScanError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let content = serde_yaml::to_string(value).map_err(|e| ConfigError::YamlParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    crate::platform::fs::write_atomic(path, content.as_bytes()).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

/// Set a dotted key inside a YAML document, creating intermediate
/// mappings as needed. The value is parsed as YAML so "true", "42" and
/// quoted strings keep their natural types.
pub fn set_dotted_key(doc: &mut Value, key: &str, raw_value: &str) {
    let parsed: Value = serde_yaml::from_str(raw_value).unwrap_or(Value::String(raw_value.to_string()));

    if !doc.is_mapping() {
        *doc = Value::Mapping(serde_yaml::Mapping::new());
    }
    let mut node = doc;
    let parts: Vec<&str> = key.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        let mapping = node.as_mapping_mut().expect("node forced to mapping above");
        let entry_key = Value::String((*part).to_string());
        if i == parts.len() - 1 {
            mapping.insert(entry_key, parsed);
            return;
        }
        let child = mapping
            .entry(entry_key)
            .or_insert_with(|| Value::Mapping(serde_yaml::Mapping::new()));
        if !child.is_mapping() {
            *child = Value::Mapping(serde_yaml::Mapping::new());
        }
        node = child;
    }
}

/// Remove a dotted key from a YAML document. Returns true when a value
/// was actually removed.
pub fn remove_dotted_key(doc: &mut Value, key: &str) -> bool {
    let parts: Vec<&str> = key.split('.').collect();
    let mut node = match doc.as_mapping_mut() {
        Some(m) => m,
        None => return false,
    };
    for part in &parts[..parts.len() - 1] {
        node = match node.get_mut(*part).and_then(Value::as_mapping_mut) {
            Some(m) => m,
            None => return false,
        };
    }
    node.remove(parts[parts.len() - 1]).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(yaml: &str) -> SettingsView {
        let mut docs = HashMap::new();
        docs.insert(Scope::Main, serde_yaml::from_str(yaml).unwrap());
        SettingsView::from_documents(docs)
    }

    #[test]
    fn test_dotted_lookup() {
        let v = view("logging:\n  level: debug\nmax_parallel: 4\n");
        assert_eq!(
            v.get_string(Scope::Main, "logging.level"),
            Some("debug".to_string())
        );
        assert_eq!(v.get_int(Scope::Main, "max_parallel"), Some(4));
        assert_eq!(v.get_string(Scope::Main, "logging.missing"), None);
    }

    #[test]
    fn test_defaults_on_missing_or_mistyped() {
        let v = view("flag: true\nname: scanner\n");
        assert_eq!(v.get_string_or(Scope::Main, "nope", "fallback"), "fallback");
        assert_eq!(v.get_int_or(Scope::Main, "name", 7), 7); // wrong type
        assert!(v.get_bool_or(Scope::Main, "flag", false));
        assert_eq!(v.get_bool(Scope::Settings, "flag"), None); // wrong scope
    }

    #[test]
    fn test_list_and_map_lookups() {
        let v = view("remove:\n  - Steam.dll\n  - overlay\nexpected:\n  MemoryManager: 'true'\n");
        assert_eq!(
            v.get_list(Scope::Main, "remove"),
            Some(vec!["Steam.dll".to_string(), "overlay".to_string()])
        );
        let map = v.get_map(Scope::Main, "expected").unwrap();
        assert_eq!(map["MemoryManager"], "true");
    }

    #[test]
    fn test_game_local_overrides_game() {
        let mut docs = HashMap::new();
        docs.insert(
            Scope::Game,
            serde_yaml::from_str("root: 'C:/Games/Fallout4'\nxse: F4SE\n").unwrap(),
        );
        docs.insert(
            Scope::GameLocal,
            serde_yaml::from_str("root: 'D:/Fallout4'\n").unwrap(),
        );
        let v = SettingsView::from_documents(docs);
        assert_eq!(
            v.get_string(Scope::Game, "root"),
            Some("D:/Fallout4".to_string())
        );
        // Keys without an override fall through to the base document.
        assert_eq!(v.get_string(Scope::Game, "xse"), Some("F4SE".to_string()));
    }

    #[test]
    fn test_require_string_errors() {
        let v = view("a: 1\n");
        assert!(v.require_string(Scope::Main, "missing").is_err());
        assert!(v.require_string(Scope::Main, "a").is_err()); // not a string
    }

    #[test]
    fn test_set_and_remove_dotted_key() {
        let mut doc: Value = serde_yaml::from_str("logging:\n  level: info\n").unwrap();
        set_dotted_key(&mut doc, "logging.level", "debug");
        set_dotted_key(&mut doc, "cache.enabled", "true");
        assert_eq!(doc["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(doc["cache"]["enabled"].as_bool(), Some(true));

        assert!(remove_dotted_key(&mut doc, "cache.enabled"));
        assert!(!remove_dotted_key(&mut doc, "cache.enabled"));
    }

    #[test]
    fn test_load_missing_dir_yields_empty_view() {
        let dir = tempfile::TempDir::new().unwrap();
        let v = SettingsView::load(dir.path(), "fallout4").unwrap();
        assert_eq!(v.get_string(Scope::Main, "anything"), None);
    }

    #[test]
    fn test_load_reads_scope_files() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.yaml"), "max_parallel: 2\n").unwrap();
        std::fs::write(dir.path().join("game-fallout4.yaml"), "xse: F4SE\n").unwrap();
        let v = SettingsView::load(dir.path(), "fallout4").unwrap();
        assert_eq!(v.get_int(Scope::Settings, "max_parallel"), Some(2));
        assert_eq!(v.get_string(Scope::Game, "xse"), Some("F4SE".to_string()));
    }
}
