//! Stage 2: feature extraction progress
//!
//! Annotates the reconciled slide table with cached feature artifacts,
//! reports which slides and patients are still unprocessed, and writes the
//! training tables where `FILENAME` is the artifact path.

use super::layout::{OutputLayout, Stage};
use super::process::{CLINICAL_FILE, CLINICAL_FULL_FILE, SLIDE_FILE, SLIDE_FULL_FILE};
use crate::error::PipelineResult;
use crate::reporting::charts::{self, CountKind};
use crate::reporting::summary;
use crate::services::{
    partition_by_site, AnnotationSummary, ExtractorLayout, FeatureLayout, FeatureLocator,
    SitePartition,
};
use argo_common::config::TomlConfig;
use argo_common::{ClinicalTable, SlideTable};
use std::path::Path;
use tracing::info;

/// Heatmaps only show sites with at least this many slides
pub const HEATMAP_MIN_SLIDES: usize = 5;

pub const ALL_CLINICAL_FILE: &str = "all_clinical_table.csv";
pub const ALL_SLIDE_FILE: &str = "all_slide_table.csv";

#[derive(Debug, Clone)]
pub struct EvaluateOutcome {
    pub annotation: AnnotationSummary,
    pub processed_slides: usize,
    pub total_slides: usize,
    pub missing_patients: usize,
    /// Fixed-width per-site table for the console
    pub console_table: String,
}

pub fn run_evaluate(config: &TomlConfig) -> PipelineResult<EvaluateOutcome> {
    let layout = OutputLayout::from_config(&config.paths);
    let feature_layout = ExtractorLayout::from_config(&config.features);
    let mut locator = FeatureLocator::new(config.paths.features_base_dir(), feature_layout);
    evaluate_tables(&layout, &mut locator)
}

pub fn evaluate_tables<L: FeatureLayout>(
    layout: &OutputLayout,
    locator: &mut FeatureLocator<L>,
) -> PipelineResult<EvaluateOutcome> {
    layout.prepare(Stage::Evaluate)?;

    info!("Step 1: Reading stage 0 tables");
    let input_dir = layout.tables(Stage::Process);
    let clinical = ClinicalTable::read_csv(&input_dir.join(CLINICAL_FILE))?;
    let slides = SlideTable::read_csv(&input_dir.join(SLIDE_FILE))?;
    info!(
        "Found {} patients and {} slides in clean tables",
        clinical.len(),
        slides.len()
    );
    log_full_tables(&input_dir);

    info!("Step 2: Adding feature paths to slide table");
    let (annotated, annotation) = locator.annotate(&slides);
    annotation.log();

    info!("Step 3: Generating processing status charts");
    let report = write_processing_report(layout, &clinical, &annotated)?;

    info!("Step 4: Writing training tables");
    write_training_tables(&layout.tables(Stage::Evaluate), &clinical, &annotated)?;

    Ok(EvaluateOutcome {
        annotation,
        ..report
    })
}

/// The full tables are informational only; their absence is not an error
fn log_full_tables(dir: &Path) {
    let full_clinical = ClinicalTable::read_csv(&dir.join(CLINICAL_FULL_FILE));
    let full_slides = SlideTable::read_csv(&dir.join(SLIDE_FULL_FILE));
    if let (Ok(clinical), Ok(slides)) = (full_clinical, full_slides) {
        info!(
            "Found {} patients and {} slides in full tables",
            clinical.len(),
            slides.len()
        );
    }
}

fn write_processing_report(
    layout: &OutputLayout,
    clinical: &ClinicalTable,
    annotated: &SlideTable,
) -> PipelineResult<EvaluateOutcome> {
    let charts_dir = layout.charts(Stage::Evaluate);
    let merged = summary::merge_status(clinical, annotated);

    let missing_slides = summary::missing_slides(&merged);
    summary::write_rows(
        &charts_dir.join("missing_slides.csv"),
        &missing_slides,
        &["PATIENT", "SITE", "FILENAME", "MSI_STATUS"],
    )?;

    let sites = summary::site_processing(&merged);
    charts::render_processing_by_site(&charts_dir.join("processing_status_by_site.svg"), &sites)?;

    let cells = summary::site_status_processing(&merged);
    let heatmap_sites = summary::heatmap_sites(&sites, &cells, HEATMAP_MIN_SLIDES);
    charts::render_processing_heatmap(
        &charts_dir.join("processing_heatmap_slides.svg"),
        &heatmap_sites,
        &cells,
        CountKind::Slides,
    )?;
    charts::render_processing_heatmap(
        &charts_dir.join("processing_heatmap_patients.svg"),
        &heatmap_sites,
        &cells,
        CountKind::Patients,
    )?;

    let patients = summary::patient_processing(&merged);
    let by_status = summary::status_processing(&patients);
    charts::render_patient_processing(
        &charts_dir.join("patients_with_processed_slides.svg"),
        &by_status,
    )?;
    for row in &by_status {
        info!(
            "{}: {}/{} patients with processed slides ({:.1}%)",
            row.status,
            row.with_processed,
            row.patients,
            row.percentage()
        );
    }

    let missing_patients = summary::missing_patients(&patients);
    summary::write_rows(
        &charts_dir.join("missing_patient_processing_stats.csv"),
        &missing_patients,
        &["PATIENT", "MSI_STATUS", "SITE", "SLIDE_COUNT"],
    )?;
    summary::write_rows(
        &charts_dir.join("missing_patients_by_site.csv"),
        &summary::missing_by_site(&missing_patients),
        &["SITE", "MSI_STATUS", "MISSING_PATIENT_COUNT"],
    )?;
    info!(
        "{} slides and {} patients without features",
        missing_slides.len(),
        missing_patients.len()
    );

    Ok(EvaluateOutcome {
        annotation: AnnotationSummary::default(),
        processed_slides: merged.iter().filter(|s| s.processed).count(),
        total_slides: merged.len(),
        missing_patients: missing_patients.len(),
        console_table: summary::format_processing_table(&merged),
    })
}

/// `all_*` and per-site tables; slides without features are left out and
/// `FILENAME` holds the feature path
fn write_training_tables(
    dir: &Path,
    clinical: &ClinicalTable,
    annotated: &SlideTable,
) -> PipelineResult<()> {
    clinical.write_csv(&dir.join(ALL_CLINICAL_FILE))?;
    let training_slides = annotated.with_feature_paths_as_filenames();
    training_slides.write_csv(&dir.join(ALL_SLIDE_FILE))?;
    info!(
        "Saved {} patients and {} slides with features to {}",
        clinical.len(),
        training_slides.len(),
        dir.display()
    );

    for partition in partition_by_site(clinical, annotated).partitions {
        SitePartition {
            slides: partition.slides.with_feature_paths_as_filenames(),
            ..partition
        }
        .write(dir)?;
    }
    Ok(())
}
