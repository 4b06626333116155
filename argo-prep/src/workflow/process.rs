//! Stage 0: ingestion and reconciliation
//!
//! REDCap records become the clinical table, Halo Link exports the slide
//! table. Both are written in full, reconciled, written again, charted and
//! split by site.

use super::layout::{OutputLayout, Stage};
use super::RecordSource;
use crate::error::PipelineResult;
use crate::reporting::charts::{self, CountKind};
use crate::reporting::summary::{self, StatusShareRow};
use crate::reporting::RunReport;
use crate::services::{
    partition_by_site, reconcile, ClinicalExtractor, HaloInventory, ReconcileAudit, SlideScanner,
};
use argo_common::config::TomlConfig;
use argo_common::{ClinicalTable, SlideTable};
use tracing::{info, warn};

pub const CLINICAL_FULL_FILE: &str = "clinical_table_full.csv";
pub const SLIDE_FULL_FILE: &str = "slide_table_full.csv";
pub const CLINICAL_FILE: &str = "clinical_table.csv";
pub const SLIDE_FILE: &str = "slide_table.csv";
pub const RUN_REPORT_FILE: &str = "reconciliation_report.json";

/// Counts of a completed `process` run
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub audit: ReconcileAudit,
    pub sites: Vec<String>,
    pub unsited_slides: usize,
}

pub async fn run_process(
    config: &TomlConfig,
    source: &RecordSource,
) -> PipelineResult<ProcessOutcome> {
    let layout = OutputLayout::from_config(&config.paths);
    layout.prepare(Stage::Process)?;

    info!("Step 1: Building clinical table");
    let records = source.fetch().await?;
    let extractor = ClinicalExtractor::new(config.clinical.resolve_vocabulary()?);
    let clinical = extractor.extract(&records)?;
    info!("Created clinical table with {} patients", clinical.len());

    info!("Step 2: Building slide table");
    let inventory = HaloInventory::load(&config.paths.data_dir)?;
    let slides = inventory.build_slide_table();
    info!(
        "Created slide table with {} slides from {} exports",
        slides.len(),
        inventory.exports.len()
    );

    info!("Step 3: Verifying slides on disk");
    let index = SlideScanner::new().scan(&config.paths.slide_dirs);
    let (slides, verification) = index.verify(&slides);
    verification.log();

    process_tables(&layout, &clinical, &slides)
}

/// Everything after ingestion: full tables, reconciliation, charts, site
/// splits
pub fn process_tables(
    layout: &OutputLayout,
    clinical: &ClinicalTable,
    slides: &SlideTable,
) -> PipelineResult<ProcessOutcome> {
    layout.prepare(Stage::Process)?;
    let tables_dir = layout.tables(Stage::Process);

    clinical.write_csv(&tables_dir.join(CLINICAL_FULL_FILE))?;
    slides.write_csv(&tables_dir.join(SLIDE_FULL_FILE))?;
    info!("Saved full tables to {}", tables_dir.display());

    info!("Step 4: Reconciling tables");
    let reconciled = reconcile(clinical, slides);
    reconciled.audit.log_summary();
    reconciled.clinical.write_csv(&tables_dir.join(CLINICAL_FILE))?;
    reconciled.slides.write_csv(&tables_dir.join(SLIDE_FILE))?;

    info!("Step 5: Generating cohort charts");
    write_cohort_charts(layout, &reconciled.clinical, &reconciled.slides, &reconciled.audit)?;

    info!("Step 6: Splitting tables by site");
    let partitions = partition_by_site(&reconciled.clinical, &reconciled.slides);
    for partition in &partitions.partitions {
        partition.write(&tables_dir)?;
    }
    if !partitions.unsited.is_empty() {
        warn!(
            "{} slides have no site and were left out of the site tables",
            partitions.unsited.len()
        );
    }

    Ok(ProcessOutcome {
        sites: partitions.sites().into_iter().map(str::to_string).collect(),
        unsited_slides: partitions.unsited.len(),
        audit: reconciled.audit,
    })
}

fn write_cohort_charts(
    layout: &OutputLayout,
    clinical: &ClinicalTable,
    slides: &SlideTable,
    audit: &ReconcileAudit,
) -> PipelineResult<()> {
    let charts_dir = layout.charts(Stage::Process);
    let merged = summary::merge_status(clinical, slides);

    let counts = summary::site_status_counts(&merged);
    let patient_rows: Vec<_> = counts
        .iter()
        .map(|c| (c.site.as_str(), c.status, c.patients))
        .collect();
    let slide_rows: Vec<_> = counts
        .iter()
        .map(|c| (c.site.as_str(), c.status, c.slides))
        .collect();
    let count_header = ["SITE", "MSI_STATUS", "COUNT"];

    summary::write_rows(
        &charts_dir.join("patient_count_by_site.csv"),
        &patient_rows,
        &count_header,
    )?;
    charts::render_site_status_counts(
        &charts_dir.join("patient_count_by_site.svg"),
        &counts,
        CountKind::Patients,
    )?;

    summary::write_rows(&charts_dir.join("slide_count_by_site.csv"), &slide_rows, &count_header)?;
    charts::render_site_status_counts(
        &charts_dir.join("slide_count_by_site.svg"),
        &counts,
        CountKind::Slides,
    )?;

    let per_patient = summary::slides_per_patient(&merged);
    summary::write_rows(
        &charts_dir.join("slides_per_patient.csv"),
        &per_patient,
        &["PATIENT", "MSI_STATUS", "SLIDE_COUNT"],
    )?;
    charts::render_slides_per_patient(&charts_dir.join("slides_per_patient.svg"), &per_patient)?;

    let shares: Vec<StatusShareRow> = audit.distribution.iter().map(StatusShareRow::from).collect();
    summary::write_rows(
        &charts_dir.join("overall_msi_distribution.csv"),
        &shares,
        &["MSI_STATUS", "PATIENT_COUNT", "PERCENTAGE"],
    )?;
    charts::render_status_distribution(&charts_dir.join("overall_msi_distribution.svg"), &shares)?;

    RunReport::from_audit(audit).export_json(&charts_dir.join(RUN_REPORT_FILE))?;
    info!("Saved cohort charts to {}", charts_dir.display());
    Ok(())
}
