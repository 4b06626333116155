//! Legacy per-institution cohort tables
//!
//! Writes `retrospective_<inst>_*` and `prospective_*` table pairs directly
//! into the tables root.

use super::layout::OutputLayout;
use super::RecordSource;
use crate::error::PipelineResult;
use crate::services::{ClinicalExtractor, Cohort, CohortExporter, Institution};
use argo_common::config::TomlConfig;
use argo_common::StatusVocabulary;
use tracing::info;

pub async fn run_collect(
    config: &TomlConfig,
    source: &RecordSource,
    vocabulary: Option<StatusVocabulary>,
) -> PipelineResult<Vec<Cohort>> {
    let records = source.fetch().await?;
    let vocabulary = match vocabulary {
        Some(vocabulary) => vocabulary,
        None => config.clinical.resolve_vocabulary()?,
    };
    info!("Using status vocabulary '{}'", vocabulary.version);

    let extractor = ClinicalExtractor::new(vocabulary);
    let exporter = CohortExporter::new(&extractor);

    let mut cohorts = Vec::with_capacity(Institution::ALL.len() + 1);
    for institution in Institution::ALL {
        cohorts.push(exporter.retrospective(&records, institution)?);
    }
    cohorts.push(exporter.prospective(&records)?);

    let layout = OutputLayout::from_config(&config.paths);
    for cohort in &cohorts {
        cohort.write(layout.tables_root())?;
    }
    info!(
        "Saved {} cohorts to {}",
        cohorts.len(),
        layout.tables_root().display()
    );
    Ok(cohorts)
}
