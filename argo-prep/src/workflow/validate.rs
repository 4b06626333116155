//! Per-institution processing checks over the cohort tables

use super::layout::OutputLayout;
use crate::error::PipelineResult;
use crate::services::{InstitutionReport, ProcessingValidator};
use argo_common::config::TomlConfig;
use argo_common::SlideTable;
use tracing::info;

pub const PROSPECTIVE_SLIDE_FILE: &str = "prospective_slide_table.csv";

/// Validate every configured prospective site, then every retrospective
/// cohort
pub fn run_validate(config: &TomlConfig) -> PipelineResult<Vec<InstitutionReport>> {
    let layout = OutputLayout::from_config(&config.paths);
    let validator = ProcessingValidator::new(&config.paths.data_dir, &config.validate);
    let mut reports = Vec::new();

    if !config.validate.prospective_sites.is_empty() {
        let prospective = SlideTable::read_csv(&layout.tables_root().join(PROSPECTIVE_SLIDE_FILE))?;
        for site in &config.validate.prospective_sites {
            let slides = prospective.filtered(|s| s.site.as_deref() == Some(site.as_str()));
            reports.push(validator.validate(&site.to_uppercase(), &slides)?);
        }
    }

    for cohort in &config.validate.retrospective_cohorts {
        let institution = format!("retrospective_{}", cohort);
        let slides = SlideTable::read_csv(
            &layout
                .tables_root()
                .join(format!("{}_slide_table.csv", institution)),
        )?;
        reports.push(validator.validate(&institution, &slides)?);
    }

    let clean = reports.iter().filter(|r| r.is_clean()).count();
    info!("{}/{} institutions passed validation", clean, reports.len());
    Ok(reports)
}
