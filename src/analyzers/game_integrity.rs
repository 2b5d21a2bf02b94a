// Scanner111 - analyzers/game_integrity.rs
//
// Game-file integrity verification: hashes the critical installation
// files and compares them against the known-good digest map. Runs in
// the file-integrity (FCX) pipeline only.

use crate::analyzers::Analyzer;
use crate::core::fragment::{FragmentKind, ReportFragment};
use crate::core::knowledge;
use crate::core::model::{AnalysisContext, AnalysisKind, AnalysisResult};
use crate::core::settings::Scope;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Lowercase hex SHA-256 of a file's content.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let bytes = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

pub struct GameIntegrityAnalyzer;

impl Analyzer for GameIntegrityAnalyzer {
    fn name(&self) -> &'static str {
        "game-integrity"
    }

    fn priority(&self) -> i32 {
        40
    }

    fn supported_kinds(&self) -> &'static [AnalysisKind] {
        &[AnalysisKind::FileIntegrity]
    }

    fn analyze(&self, ctx: &AnalysisContext) -> AnalysisResult {
        if ctx.cancellation.is_cancelled() {
            return AnalysisResult::skipped(self.name());
        }

        let Some(root) = ctx.settings.get_string(Scope::Game, "root") else {
            return AnalysisResult::ok(
                self.name(),
                ReportFragment::section(
                    "Game Integrity",
                    vec![ReportFragment::text(
                        FragmentKind::Info,
                        "Game root not configured; integrity check skipped.",
                    )],
                ),
            );
        };
        let root = Path::new(&root);

        // Prefer the game named in the log; fall back to the configured one.
        let mut game = ctx.parsed_log.game_name().to_string();
        if game == crate::util::constants::UNKNOWN {
            game = ctx
                .settings
                .get_string_or(Scope::Game, "name", "Fallout 4");
        }

        let entries = knowledge::builtin().game_files_for(&game);
        let mut children: Vec<ReportFragment> = Vec::new();

        for entry in entries {
            if ctx.cancellation.is_cancelled() {
                return AnalysisResult::skipped(self.name());
            }
            let path = root.join(&entry.path);
            if !path.exists() {
                children.push(ReportFragment::warning(
                    entry.path.clone(),
                    "file is missing from the game folder",
                ));
                continue;
            }
            match sha256_file(&path) {
                Ok(digest) if digest == entry.sha256 => {
                    children.push(ReportFragment::success(entry.path.clone(), "hash verified"));
                }
                Ok(digest) => {
                    children.push(ReportFragment::error(
                        entry.path.clone(),
                        format!(
                            "hash mismatch (found {}..., expected {}...) — the file is \
                             modified or from a different game version",
                            &digest[..12],
                            &entry.sha256[..12]
                        ),
                    ));
                }
                Err(e) => {
                    children.push(ReportFragment::warning(
                        entry.path.clone(),
                        format!("cannot hash: {e}"),
                    ));
                }
            }
        }

        if children.is_empty() {
            children.push(ReportFragment::text(
                FragmentKind::Info,
                format!("No integrity data for game '{game}'."),
            ));
        }

        AnalysisResult::ok(
            self.name(),
            ReportFragment::section("Game Integrity", children),
        )
    }
}
