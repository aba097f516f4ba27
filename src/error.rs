//! Error types for annotrain.

use thiserror::Error;

/// Result type for annotrain operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for annotrain operations.
///
/// Duplicate samples and duplicate entity values are deliberately *not*
/// errors: re-import of known text is a silent skip, and resolving an
/// existing (entity, value) pair returns the stored record.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Malformed input: empty text, empty entity name, bad purpose label.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced sample, entity, or entity value does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The import stream could not be parsed (missing header, bad columns).
    #[error("import parse error at line {line}: {message}")]
    Parse {
        /// 1-based line in the delimited input.
        line: u64,
        /// Column name, when the failure is attributable to one.
        column: Option<String>,
        /// What went wrong.
        message: String,
    },

    /// The external recognition engine failed. Passed through verbatim.
    #[error("engine error: {0}")]
    Engine(String),

    /// Underlying persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot (de)serialization error.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create a stream-level parse error.
    pub fn parse(line: u64, column: Option<String>, msg: impl Into<String>) -> Self {
        Error::Parse {
            line,
            column,
            message: msg.into(),
        }
    }

    /// Create an engine error.
    pub fn engine(msg: impl Into<String>) -> Self {
        Error::Engine(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_reports_line() {
        let err = Error::parse(7, Some("intent".into()), "missing field");
        let msg = err.to_string();
        assert!(msg.contains("line 7"), "got: {msg}");
        assert!(msg.contains("missing field"));
    }

    #[test]
    fn constructors_map_to_variants() {
        assert!(matches!(Error::validation("x"), Error::Validation(_)));
        assert!(matches!(Error::not_found("x"), Error::NotFound(_)));
        assert!(matches!(Error::engine("x"), Error::Engine(_)));
        assert!(matches!(Error::storage("x"), Error::Storage(_)));
    }
}
