// Scanner111 - core/version.rs
//
// Dotted version comparison for crash-generator and script-extender
// version checks. Crash logs carry versions like "1.26.2" or
// "1.10.163.0"; comparison is numeric per segment, with missing
// segments treated as zero.

use std::cmp::Ordering;

/// Parse a dotted version into numeric segments.
///
/// A leading 'v' is tolerated ("v1.26.2"); non-numeric segments end the
/// parse, so "1.26.2-beta" compares as 1.26.2.
pub fn parse_version(s: &str) -> Vec<u64> {
    s.trim()
        .trim_start_matches(['v', 'V'])
        .split('.')
        .map_while(|seg| {
            let digits: String = seg.chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u64>().ok()
        })
        .collect()
}

/// Compare two dotted versions numerically.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let (a, b) = (parse_version(a), parse_version(b));
    let len = a.len().max(b.len());
    for i in 0..len {
        let (x, y) = (
            a.get(i).copied().unwrap_or(0),
            b.get(i).copied().unwrap_or(0),
        );
        match x.cmp(&y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

/// True when `found` is older than `latest`.
///
/// Unparseable versions (including "UNKNOWN") are never reported as
/// outdated; there is nothing trustworthy to compare.
pub fn is_outdated(found: &str, latest: &str) -> bool {
    if parse_version(found).is_empty() || parse_version(latest).is_empty() {
        return false;
    }
    compare_versions(found, latest) == Ordering::Less
}
