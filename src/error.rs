//! Structured error types for configuration operations.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Source errors
    MalformedSource,
    SourceNotFound,
    AmbiguousUserSource,

    // Filesystem errors
    DirectoryNotFound,
    IoError,

    // Hot reload
    WatchFailure,
}

/// Errors raised by the configuration engine.
///
/// None of these cross the store's write path: a failed load leaves the store
/// in its previous state and the error is returned to the direct caller only.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Text failed to parse as JSON after comment stripping.
    #[error("malformed configuration source {origin}: {source}")]
    MalformedSource {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    /// An explicitly named source file does not exist.
    #[error("configuration source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// More than one file matched the user settings naming convention.
    #[error("ambiguous user configuration, candidates: {}", display_paths(.0))]
    AmbiguousUserSource(Vec<PathBuf>),

    /// An overlay directory does not exist.
    #[error("configuration directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file-watch backend failed or is unavailable.
    #[error("file watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl ConfigError {
    pub fn malformed(origin: impl Into<String>, source: serde_json::Error) -> Self {
        Self::MalformedSource {
            origin: origin.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ConfigError::MalformedSource { .. } => ErrorCode::MalformedSource,
            ConfigError::SourceNotFound(_) => ErrorCode::SourceNotFound,
            ConfigError::AmbiguousUserSource(_) => ErrorCode::AmbiguousUserSource,
            ConfigError::DirectoryNotFound(_) => ErrorCode::DirectoryNotFound,
            ConfigError::Io { .. } => ErrorCode::IoError,
            ConfigError::Watch(_) => ErrorCode::WatchFailure,
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = ConfigError::DirectoryNotFound(PathBuf::from("missing"));
        assert_eq!(err.code(), ErrorCode::DirectoryNotFound);

        let err = ConfigError::AmbiguousUserSource(vec![
            PathBuf::from("settings.json"),
            PathBuf::from("settings.jsonc"),
        ]);
        assert_eq!(err.code(), ErrorCode::AmbiguousUserSource);
        assert!(err.to_string().contains("settings.json, settings.jsonc"));
    }

    #[test]
    fn test_malformed_source_message() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = ConfigError::malformed("inline", source);
        assert_eq!(err.code(), ErrorCode::MalformedSource);
        assert!(err.to_string().starts_with("malformed configuration source inline"));
    }

    #[test]
    fn test_error_code_serialization() {
        let json = serde_json::to_string(&ErrorCode::AmbiguousUserSource).unwrap();
        assert_eq!(json, "\"AMBIGUOUS_USER_SOURCE\"");
    }
}
