//! Error types for benchmark verification
//!
//! Only I/O and structural file problems are errors. Bad cell values never are:
//! they become absent values and surface as findings in the report.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed CSV in {path} at row {row}: {source}")]
    Csv {
        path: PathBuf,
        row: u64,
        #[source]
        source: csv::Error,
    },
    #[error("Invalid config {path}: {message}")]
    Config { path: PathBuf, message: String },
    #[error("Report output failed: {0}")]
    Report(#[from] std::io::Error),
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl VerifyError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn csv(path: impl Into<PathBuf>, row: u64, source: csv::Error) -> Self {
        Self::Csv {
            path: path.into(),
            row,
            source,
        }
    }
}

/// Result type for verification operations
pub type Result<T> = std::result::Result<T, VerifyError>;
