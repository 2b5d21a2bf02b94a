// Scanner111 - util/error.rs
//
// Typed error hierarchy with context-preserving error chains.
// No string-based error propagation; all errors keep the causal chain
// for diagnostic logging.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Top-level error type for all Scanner111 operations.
///
/// The variants mirror the propagation policy: `Analyzer` failures are
/// captured inside an `AnalysisResult` and never abort a run; `Cancelled`
/// and `Internal` propagate to the caller; the rest surface wherever the
/// failing operation was invoked.
#[derive(Debug)]
pub enum ScanError {
    /// Cooperative cancellation was observed.
    Cancelled,

    /// A file or directory the caller expected does not exist.
    NotFound { path: PathBuf },

    /// Underlying read/write failure.
    Io {
        path: PathBuf,
        operation: &'static str,
        source: io::Error,
    },

    /// Malformed input the parser cannot recover from.
    Parse(ParseError),

    /// Missing or mistyped settings key the caller declared mandatory,
    /// or an invalid registry/configuration operation.
    Config(ConfigError),

    /// A single analyzer failed. Isolated to its result; carried here only
    /// when an analyzer error must cross an API boundary on its own.
    Analyzer { name: String, message: String },

    /// Invariant violation; surfaced to the caller verbatim.
    Internal { message: String },
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "Operation cancelled"),
            Self::NotFound { path } => {
                write!(f, "Path '{}' does not exist", path.display())
            }
            Self::Io {
                path,
                operation,
                source,
            } => write!(
                f,
                "I/O error during {operation} on '{}': {source}",
                path.display()
            ),
            Self::Parse(e) => write!(f, "Parse error: {e}"),
            Self::Config(e) => write!(f, "Configuration error: {e}"),
            Self::Analyzer { name, message } => {
                write!(f, "Analyzer '{name}' failed: {message}")
            }
            Self::Internal { message } => write!(f, "Internal error: {message}"),
        }
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse errors
// ---------------------------------------------------------------------------

/// Errors related to crash-log parsing.
///
/// Most malformations are tolerated by the parser (skipped lines, lossy
/// decoding); these variants cover the unrecoverable cases only.
#[derive(Debug)]
pub enum ParseError {
    /// The crash log exceeds the maximum accepted size.
    FileTooLarge {
        path: PathBuf,
        size: u64,
        max_size: u64,
    },

    /// I/O error while reading the crash log.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileTooLarge {
                path,
                size,
                max_size,
            } => write!(
                f,
                "'{}' is {size} bytes, exceeds maximum crash log size of {max_size} bytes",
                path.display()
            ),
            Self::Io { path, source } => {
                write!(f, "'{}': I/O error: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ParseError> for ScanError {
    fn from(e: ParseError) -> Self {
        Self::Parse(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// Errors related to settings loading and registry configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// YAML settings file could not be parsed.
    YamlParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// A mandatory settings key is absent.
    MissingKey { scope: String, key: String },

    /// A settings key exists but holds the wrong type.
    TypeMismatch {
        scope: String,
        key: String,
        expected: &'static str,
    },

    /// Two analyzers were registered under the same name.
    DuplicateAnalyzer { name: String },

    /// An analyzer was requested by a name the registry does not know.
    UnknownAnalyzer { name: String },

    /// An unknown analysis kind or template name was requested.
    InvalidValue { what: &'static str, value: String },

    /// I/O error reading a settings file.
    Io { path: PathBuf, source: io::Error },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YamlParse { path, source } => {
                write!(f, "Failed to parse YAML '{}': {source}", path.display())
            }
            Self::MissingKey { scope, key } => {
                write!(f, "Missing mandatory settings key '{scope}.{key}'")
            }
            Self::TypeMismatch {
                scope,
                key,
                expected,
            } => write!(f, "Settings key '{scope}.{key}' is not a {expected}"),
            Self::DuplicateAnalyzer { name } => {
                write!(f, "Analyzer '{name}' is already registered")
            }
            Self::UnknownAnalyzer { name } => {
                write!(f, "Unknown analyzer '{name}'")
            }
            Self::InvalidValue { what, value } => {
                write!(f, "Invalid {what}: '{value}'")
            }
            Self::Io { path, source } => {
                write!(
                    f,
                    "I/O error reading settings '{}': {source}",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::YamlParse { source, .. } => Some(source),
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for ScanError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Convenience type alias for Scanner111 results.
pub type Result<T> = std::result::Result<T, ScanError>;
