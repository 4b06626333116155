//! Common error types for ARGO

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for ARGO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the ARGO tools
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A table is missing a column the pipeline cannot run without
    #[error("Configuration error: table '{table}' has no '{column}' column")]
    MissingColumn { table: String, column: String },

    /// A required input file does not exist
    #[error("Configuration error: input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Malformed row or value
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Structural errors that mean the run was misconfigured, as opposed to
    /// malformed data or I/O failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Config(_) | Error::MissingColumn { .. } | Error::MissingInput(_)
        )
    }
}
