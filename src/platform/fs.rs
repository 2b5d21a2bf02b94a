// Scanner111 - platform/fs.rs
//
// Filesystem helpers shared across layers: lossy text reads for crash
// logs with unreliable encodings, metadata lookups, and atomic writes
// for everything the scanner persists.

use chrono::{DateTime, Utc};
use std::io;
use std::path::Path;

/// Read the full content of a file as a string.
///
/// For files with invalid UTF-8, uses lossy conversion. The zero-copy
/// path is tried first since most crash logs are valid UTF-8.
pub fn read_file_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).into_owned()),
    }
}

/// File metadata needed by the incremental cache: (size, mtime UTC).
pub fn file_fingerprint(path: &Path) -> io::Result<(u64, DateTime<Utc>)> {
    let meta = std::fs::metadata(path)?;
    let mtime: DateTime<Utc> = meta.modified()?.into();
    Ok((meta.len(), mtime))
}

/// Write `bytes` to `path` atomically (write temp, then rename), creating
/// parent directories as needed. A crash mid-write loses the new content
/// but never corrupts an existing file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path).inspect_err(|_| {
        // Clean up the temp file on failure; ignore any secondary error.
        let _ = std::fs::remove_file(&tmp);
    })
}
