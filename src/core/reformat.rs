// Scanner111 - core/reformat.rs
//
// Opt-in crash-log reformat pass: normalises plugin-table load-order
// tokens in place ("[ 1]" -> "[01]", "[FE:  0]" -> "[FE:000]") and drops
// lines containing any entry of the configured removal list. This is the
// only code path that modifies a source crash log, and only when the
// user asks for it.

use crate::core::parser::{is_segment_header, normalize_plugin_token};
use crate::util::error::{ParseError, ScanError};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Matches a bracketed load-order index at the start of a (possibly
/// indented) plugin line, keeping the indent and the remainder intact.
fn bracket_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<indent>\s*)\[(?P<idx>[^\]]+)\](?P<rest>.*)$")
            .expect("bracket regex is valid")
    })
}

/// Reformat a line sequence.
///
/// Token normalisation applies only inside the "PLUGINS:" segment so
/// call-stack frames like "[ 1] 0x..." are left untouched. Removal-list
/// matching is line-contains and applies everywhere.
pub fn reformat_lines(lines: &[String], remove_list: &[String], xse_acronym: &str) -> Vec<String> {
    let re = bracket_regex();
    let mut in_plugin_table = false;
    let mut out = Vec::with_capacity(lines.len());

    for line in lines {
        if remove_list.iter().any(|needle| line.contains(needle)) {
            continue;
        }

        if is_segment_header(line, xse_acronym) {
            in_plugin_table = line == "PLUGINS:";
            out.push(line.clone());
            continue;
        }

        if in_plugin_table {
            if let Some(caps) = re.captures(line) {
                if let Some(token) = normalize_plugin_token(&caps["idx"]) {
                    out.push(format!("{}[{}]{}", &caps["indent"], token, &caps["rest"]));
                    continue;
                }
            }
        }
        out.push(line.clone());
    }
    out
}

/// Reformat the crash log at `path` in place (atomic rewrite).
///
/// Returns true when the file content actually changed.
pub fn reformat_file(
    path: &Path,
    remove_list: &[String],
    xse_acronym: &str,
) -> Result<bool, ScanError> {
    if !path.exists() {
        return Err(ScanError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = crate::platform::fs::read_file_lossy(path).map_err(|e| ParseError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let lines = crate::core::parser::split_lines(&content);
    let reformatted = reformat_lines(&lines, remove_list, xse_acronym);

    if reformatted == lines {
        return Ok(false);
    }

    let mut new_content = reformatted.join("\n");
    new_content.push('\n');
    crate::platform::fs::write_atomic(path, new_content.as_bytes()).map_err(|e| {
        ScanError::Io {
            path: path.to_path_buf(),
            operation: "reformat",
            source: e,
        }
    })?;
    tracing::info!(path = %path.display(), "Crash log reformatted");
    Ok(true)
}
