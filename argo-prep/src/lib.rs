//! argo-prep library interface
//!
//! Services, reporting and the pipeline commands behind the `argo-prep`
//! binary, exposed for integration testing.

pub mod error;
pub mod reporting;
pub mod services;
pub mod settings;
pub mod workflow;

pub use crate::error::{PipelineError, PipelineResult};
pub use crate::workflow::{OutputLayout, RecordSource, Stage};
