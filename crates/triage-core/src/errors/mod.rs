use std::path::PathBuf;
use thiserror::Error;

/// A log file whose event sequence is structurally inconsistent.
///
/// Aborts the parse of that single file only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("some tests are not completed: {}", names.join(", "))]
    IncompleteTestRuns { names: Vec<String> },

    #[error("line {line_no}: no unfinished test named {name}")]
    UnknownTest { name: String, line_no: usize },

    #[error("line {line_no}: invalid timestamp {value}")]
    InvalidTimestamp { value: String, line_no: usize },

    #[error("line {line_no}: test {name} finishes before it started")]
    FinishBeforeStart { name: String, line_no: usize },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Classification store unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("decision prompt failed: {0}")]
    Prompt(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {detail}", path.display())]
    Parse { path: PathBuf, detail: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}
