//! Pipeline commands
//!
//! Each command is one sequential pass over its inputs:
//! - **process**: REDCap + Halo Link → reconciled tables, cohort charts, site splits
//! - **evaluate**: reconciled tables + feature cache → training tables, progress charts
//! - **collect**: REDCap → legacy per-institution cohort tables
//! - **relabel**: clinical table → downstream label vocabulary
//! - **validate**: cohort tables → raw/processed file checks per institution

pub mod collect;
pub mod evaluate;
pub mod layout;
pub mod process;
pub mod relabel;
pub mod validate;

pub use collect::run_collect;
pub use evaluate::{run_evaluate, EvaluateOutcome};
pub use layout::{OutputLayout, Stage};
pub use process::{run_process, ProcessOutcome};
pub use relabel::{default_relabel_output, run_relabel};
pub use validate::run_validate;

use crate::error::PipelineResult;
use crate::services::redcap_client::{load_records, RawRecord, RedcapClient, RedcapCredentials};
use std::path::PathBuf;
use tracing::info;

/// Where REDCap records come from
#[derive(Debug, Clone)]
pub enum RecordSource {
    /// Live export over the REDCap API
    Api(RedcapCredentials),
    /// A previously saved JSON export
    File(PathBuf),
}

impl RecordSource {
    pub async fn fetch(&self) -> PipelineResult<Vec<RawRecord>> {
        let records = match self {
            RecordSource::Api(credentials) => {
                info!("Fetching records from REDCap at {}", credentials.api_url);
                RedcapClient::new(credentials.clone())?
                    .export_records()
                    .await?
            }
            RecordSource::File(path) => {
                info!("Loading REDCap export from {}", path.display());
                load_records(path)?
            }
        };
        info!("Retrieved {} REDCap records", records.len());
        Ok(records)
    }
}
