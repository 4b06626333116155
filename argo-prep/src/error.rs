//! Error types for argo-prep

use crate::reporting::charts::ChartError;
use crate::services::redcap_client::RedcapError;
use thiserror::Error;

/// Pipeline error type
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Table, configuration or I/O failure from argo-common
    #[error(transparent)]
    Common(#[from] argo_common::Error),

    /// REDCap fetch or parse failure
    #[error("REDCap error: {0}")]
    Redcap(#[from] RedcapError),

    /// Chart rendering failure
    #[error("Chart error: {0}")]
    Chart(#[from] ChartError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PipelineError {
    /// Whether the run failed because it was misconfigured
    pub fn is_configuration(&self) -> bool {
        matches!(self, PipelineError::Common(e) if e.is_configuration())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        PipelineError::Common(err.into())
    }
}

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;
