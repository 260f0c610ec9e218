use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocDiffError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Extraction error for {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("Scan failed for {path}: {reason}")]
    FatalScan { path: PathBuf, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl DocDiffError {
    /// Whether this error terminates the whole operation. Per-file IO and
    /// extraction failures are recoverable and get attached to the affected
    /// record as warnings instead of propagating.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DocDiffError::FatalScan { .. })
    }
}

pub type Result<T> = std::result::Result<T, DocDiffError>;
