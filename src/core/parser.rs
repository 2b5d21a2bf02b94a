// Scanner111 - core/parser.rs
//
// Crash-log parsing: segment extraction, header scalars, plugin table,
// call-stack capture. Core layer: works over a line sequence; the file
// read itself goes through platform::fs so the incremental cache can hash
// the exact lines that were parsed.

use crate::core::model::ParsedCrashLog;
use crate::util::constants;
use crate::util::error::{ParseError, ScanError};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Configuration for parsing operations.
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Script-extender acronym used in the "<XSE> PLUGINS:" segment header
    /// (F4SE for Fallout 4, SKSE for Skyrim SE). Taken from settings.
    pub xse_acronym: String,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            xse_acronym: "F4SE".to_string(),
        }
    }
}

/// Segment headers that are always recognised, independent of the game.
const FIXED_HEADERS: &[&str] = &[
    "SYSTEM SPECS:",
    "PROBABLE CALL STACK:",
    "REGISTERS:",
    "STACK:",
    "MODULES:",
    "PLUGINS:",
];

/// Marker beginning the main error paragraph.
const MAIN_ERROR_MARKER: &str = "Unhandled exception";

/// True when `line` is one of the recognised segment headers for the
/// given script-extender acronym. Shared with the reformat pass so both
/// agree on segment boundaries.
pub fn is_segment_header(line: &str, xse_acronym: &str) -> bool {
    FIXED_HEADERS.contains(&line)
        || line == format!("{} PLUGINS:", xse_acronym.to_uppercase())
}

// =============================================================================
// Entry points
// =============================================================================

/// Parse the crash log at `path`.
///
/// Fails with `NotFound` when the path does not exist and `Parse` on
/// unreadable or oversized files. Decoding errors are recovered by lossy
/// UTF-8 conversion; an empty file yields an empty `ParsedCrashLog` with
/// "UNKNOWN" scalars rather than an error.
pub fn parse(path: &Path, config: &ParserConfig) -> Result<ParsedCrashLog, ScanError> {
    if !path.exists() {
        return Err(ScanError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let size = std::fs::metadata(path)
        .map_err(|e| ParseError::Io {
            path: path.to_path_buf(),
            source: e,
        })?
        .len();
    if size > constants::MAX_CRASH_LOG_SIZE {
        return Err(ParseError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            max_size: constants::MAX_CRASH_LOG_SIZE,
        }
        .into());
    }

    let content = crate::platform::fs::read_file_lossy(path).map_err(|e| ParseError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let lines: Vec<String> = split_lines(&content);
    Ok(parse_lines(path, lines, config))
}

/// Split file content into lines, stripping a leading BOM, preserving
/// empty lines, and trimming trailing whitespace on each line (internal
/// tabs are kept).
pub fn split_lines(content: &str) -> Vec<String> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    content
        .lines()
        .map(|l| l.trim_end().to_string())
        .collect()
}

/// Parse an already-read line sequence.
///
/// This is the shape the incremental cache uses: it hashes `lines` and
/// passes the same sequence here, so the fingerprint always matches what
/// was actually analysed.
pub fn parse_lines(path: &Path, lines: Vec<String>, config: &ParserConfig) -> ParsedCrashLog {
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    let mut log = ParsedCrashLog {
        path: canonical,
        game_version: constants::UNKNOWN.to_string(),
        crashgen_name: constants::UNKNOWN.to_string(),
        crashgen_version: constants::UNKNOWN.to_string(),
        main_error: constants::UNKNOWN.to_string(),
        ..Default::default()
    };

    if lines.is_empty() {
        tracing::debug!(path = %log.path.display(), "Empty crash log");
        log.raw_lines = lines;
        return log;
    }

    extract_header_scalars(&lines, &mut log);
    extract_main_error(&lines, &mut log);
    extract_segments(&lines, config, &mut log);

    tracing::debug!(
        path = %log.path.display(),
        lines = lines.len(),
        plugins = log.plugins.len(),
        call_stack = log.call_stack.len(),
        segments = log.other_segments.len(),
        "Crash log parsed"
    );

    log.raw_lines = lines;
    log
}

// =============================================================================
// Header scalars
// =============================================================================

/// Matches a "<Name> v<digits.dots>" version line, e.g.
/// "Fallout 4 v1.10.163" or "Buffout 4 v1.26.2".
fn version_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?P<name>\S.*?) v(?P<version>\d+(?:\.\d+)+)")
            .expect("version line regex is valid")
    })
}

/// The first version-shaped line names the game; the next one names the
/// crash generator. Both default to "UNKNOWN" when absent.
fn extract_header_scalars(lines: &[String], log: &mut ParsedCrashLog) {
    let re = version_line_regex();
    let mut matches = lines
        .iter()
        .take(constants::HEADER_SCAN_LINES)
        .filter_map(|line| re.captures(line));

    if let Some(caps) = matches.next() {
        log.game_version = caps.get(0).map(|m| m.as_str().to_string()).unwrap_or_default();
    }
    if let Some(caps) = matches.next() {
        log.crashgen_name = caps["name"].to_string();
        log.crashgen_version = caps["version"].to_string();
    }
}

// =============================================================================
// Main error
// =============================================================================

/// The main error is the first non-empty paragraph beginning with
/// "Unhandled exception". Continuation lines are joined with newlines
/// until the first empty line, and `|` split-markers inside a single
/// source line become newlines of their own.
fn extract_main_error(lines: &[String], log: &mut ParsedCrashLog) {
    let Some(start) = lines
        .iter()
        .position(|l| l.trim_start().starts_with(MAIN_ERROR_MARKER))
    else {
        return;
    };

    let mut parts: Vec<String> = Vec::new();
    for line in &lines[start..] {
        if line.trim().is_empty() {
            break;
        }
        for piece in line.split('|') {
            parts.push(piece.trim().to_string());
        }
    }
    log.main_error = parts.join("\n");
}

// =============================================================================
// Segments
// =============================================================================

/// Split the log into its named segments.
///
/// A segment starts at an exact-match header line and runs until the next
/// known header or EOF. Blank lines inside a segment are preserved. The
/// "PROBABLE CALL STACK:" segment lands in `call_stack`, the plugin
/// segments feed the plugin table, and everything else is keyed into
/// `other_segments` (present even when empty).
fn extract_segments(lines: &[String], config: &ParserConfig, log: &mut ParsedCrashLog) {
    let xse_header = format!("{} PLUGINS:", config.xse_acronym.to_uppercase());
    let is_header =
        |line: &str| -> bool { FIXED_HEADERS.contains(&line) || line == xse_header.as_str() };

    let mut current: Option<(String, Vec<String>)> = None;

    let mut close = |log: &mut ParsedCrashLog, header: String, body: Vec<String>| {
        if header == "PROBABLE CALL STACK:" {
            log.call_stack = body;
        } else if header == "PLUGINS:" {
            parse_plugin_table(&body, log);
        } else {
            log.other_segments.insert(header, body);
        }
    };

    for line in lines {
        if is_header(line) {
            if let Some((header, body)) = current.take() {
                close(log, header, body);
            }
            current = Some((line.clone(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line.clone());
        }
    }
    if let Some((header, body)) = current.take() {
        close(log, header, body);
    }
}

// =============================================================================
// Plugin table
// =============================================================================

/// Matches an accepted plugin line: `[<idx>] <name>`. Lines with unclosed
/// brackets or no name are rejected by the shape; the index grammar is
/// enforced separately after space normalisation.
fn plugin_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[(?P<idx>[^\]]+)\]\s+(?P<name>\S.*)$").expect("plugin line regex is valid")
    })
}

/// Matches a normalised full-plugin token ("00".."FE").
fn full_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-F]{2}$").expect("full token regex is valid"))
}

/// Matches a normalised light-slot token ("FE:000".."FE:FFF").
fn light_token_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^FE:[0-9A-F]{3}$").expect("light token regex is valid"))
}

/// Normalise a raw bracket index into a load-order token.
///
/// Spaces inside the bracket pair stand for leading zeros and are
/// replaced by '0' (`[ 1]` -> "01", `[FE:  0]` -> "FE:000"). Returns
/// None when the normalised text matches neither token grammar — this is
/// what rejects the literal `[XX]` placeholder lines.
pub fn normalize_plugin_token(raw: &str) -> Option<String> {
    let token = raw.replace(' ', "0").to_uppercase();
    if full_token_regex().is_match(&token) || light_token_regex().is_match(&token) {
        Some(token)
    } else {
        None
    }
}

/// Parse the plugin table body. Malformed lines are skipped silently;
/// duplicate plugin names overwrite the earlier token in place.
///
/// Crash generators indent the table with a leading tab, so the grammar
/// applies after leading whitespace is stripped.
fn parse_plugin_table(body: &[String], log: &mut ParsedCrashLog) {
    let re = plugin_line_regex();
    for line in body {
        let Some(caps) = re.captures(line.trim_start()) else {
            continue;
        };
        let Some(token) = normalize_plugin_token(&caps["idx"]) else {
            continue;
        };
        let name = caps["name"].to_string();

        match log
            .plugins
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = token,
            None => log.plugins.push((name, token)),
        }
    }
}
