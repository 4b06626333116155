//! End-to-end tests of the process and evaluate stages on temporary
//! directories

use argo_common::{ClinicalTable, MsiStatus, PatientRecord, SlideRecord, SlideTable};
use argo_prep::services::{ExtractorLayout, FeatureLocator};
use argo_prep::workflow::evaluate::evaluate_tables;
use argo_prep::workflow::process::process_tables;
use argo_prep::workflow::{OutputLayout, Stage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn site(name: &str) -> Option<String> {
    Some(name.to_string())
}

/// P1: MSI-H, two slides at siteA
/// P2: MSS, one slide at siteB
/// P3: no status, one slide at siteA
/// P4: MSS, no slides
/// P9: slide only
fn cohort() -> (ClinicalTable, SlideTable) {
    let clinical = ClinicalTable::new(
        Vec::new(),
        vec![
            PatientRecord::new("P1", Some(MsiStatus::MsiHigh)),
            PatientRecord::new("P2", Some(MsiStatus::Stable)),
            PatientRecord::new("P3", None),
            PatientRecord::new("P4", Some(MsiStatus::Stable)),
        ],
    );
    let slides = SlideTable::new(
        Vec::new(),
        vec![
            SlideRecord::new("P1", "s1.svs", site("siteA")),
            SlideRecord::new("P1", "s2.svs", site("siteA")),
            SlideRecord::new("P2", "s3.svs", site("siteB")),
            SlideRecord::new("P3", "s4.svs", site("siteA")),
            SlideRecord::new("P9", "s5.svs", site("siteB")),
        ],
    );
    (clinical, slides)
}

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

fn layout(dir: &TempDir) -> OutputLayout {
    OutputLayout::new(dir.path().join("tables"), dir.path().join("visualizations"))
}

#[test]
fn test_process_writes_reconciled_tables_and_charts() {
    let dir = TempDir::new().unwrap();
    let layout = layout(&dir);
    let (clinical, slides) = cohort();

    let outcome = process_tables(&layout, &clinical, &slides).unwrap();

    assert_eq!(outcome.audit.patients_missing_status(), 1);
    assert_eq!(outcome.audit.orphan_slides(), 2);
    assert_eq!(outcome.audit.patients_without_slides(), 1);
    assert_eq!(outcome.audit.final_patients, 2);
    assert_eq!(outcome.audit.final_slides, 3);
    assert_eq!(outcome.sites, vec!["siteA", "siteB"]);
    assert_eq!(outcome.unsited_slides, 0);

    let tables = layout.tables(Stage::Process);
    let full = ClinicalTable::read_csv(&tables.join("clinical_table_full.csv")).unwrap();
    assert_eq!(full.len(), 4);
    let clean = SlideTable::read_csv(&tables.join("slide_table.csv")).unwrap();
    assert_eq!(clean.len(), 3);
    let site_b = ClinicalTable::read_csv(&tables.join("siteB_clinical_table.csv")).unwrap();
    assert_eq!(site_b.records[0].patient_id, "P2");

    let charts = layout.charts(Stage::Process);
    for name in [
        "patient_count_by_site.svg",
        "slide_count_by_site.svg",
        "slides_per_patient.svg",
        "overall_msi_distribution.svg",
        "reconciliation_report.json",
    ] {
        assert!(charts.join(name).is_file(), "{} not written", name);
    }
    let counts = fs::read_to_string(charts.join("slide_count_by_site.csv")).unwrap();
    assert_eq!(
        counts,
        "SITE,MSI_STATUS,COUNT\nsiteA,MSI-H,2\nsiteB,MSS,1\n"
    );
    let distribution = fs::read_to_string(charts.join("overall_msi_distribution.csv")).unwrap();
    assert!(distribution.contains("MSI-H,1,50.0"));
}

#[test]
fn test_process_is_idempotent_on_its_own_output() {
    let dir = TempDir::new().unwrap();
    let layout = layout(&dir);
    let (clinical, slides) = cohort();
    process_tables(&layout, &clinical, &slides).unwrap();

    let tables = layout.tables(Stage::Process);
    let clean_clinical = ClinicalTable::read_csv(&tables.join("clinical_table.csv")).unwrap();
    let clean_slides = SlideTable::read_csv(&tables.join("slide_table.csv")).unwrap();

    let second = process_tables(&layout, &clean_clinical, &clean_slides).unwrap();
    assert_eq!(second.audit.total_removed(), 0);
    assert_eq!(
        ClinicalTable::read_csv(&tables.join("clinical_table.csv")).unwrap(),
        clean_clinical
    );
}

#[test]
fn test_evaluate_reports_progress_and_writes_training_tables() {
    let dir = TempDir::new().unwrap();
    let layout = layout(&dir);
    let (clinical, slides) = cohort();
    process_tables(&layout, &clinical, &slides).unwrap();

    let features = dir.path().join("features");
    let artifact = features.join("siteA/features/xiyuewang-v1/s1.h5");
    touch(&artifact);
    touch(&features.join("siteA/features/unrelated/s2.h5"));

    let mut locator = FeatureLocator::new(&features, ExtractorLayout::default());
    let outcome = evaluate_tables(&layout, &mut locator).unwrap();

    assert_eq!(outcome.annotation.found, 1);
    assert_eq!(outcome.annotation.missing, 2);
    assert_eq!(outcome.processed_slides, 1);
    assert_eq!(outcome.total_slides, 3);
    assert_eq!(outcome.missing_patients, 1);
    assert!(outcome.console_table.contains("Overall: 1/3 (33.3%)"));

    let charts = layout.charts(Stage::Evaluate);
    let missing = fs::read_to_string(charts.join("missing_slides.csv")).unwrap();
    assert_eq!(
        missing,
        "PATIENT,SITE,FILENAME,MSI_STATUS\nP1,siteA,s2.svs,MSI-H\nP2,siteB,s3.svs,MSS\n"
    );
    let by_site = fs::read_to_string(charts.join("missing_patients_by_site.csv")).unwrap();
    assert_eq!(by_site, "SITE,MSI_STATUS,MISSING_PATIENT_COUNT\nsiteB,MSS,1\n");
    for name in [
        "processing_status_by_site.svg",
        "processing_heatmap_slides.svg",
        "processing_heatmap_patients.svg",
        "patients_with_processed_slides.svg",
    ] {
        assert!(charts.join(name).is_file(), "{} not written", name);
    }

    let tables = layout.tables(Stage::Evaluate);
    let training = SlideTable::read_csv(&tables.join("all_slide_table.csv")).unwrap();
    assert_eq!(training.len(), 1);
    assert_eq!(training.records[0].filename, artifact.to_string_lossy());
    let all_clinical = ClinicalTable::read_csv(&tables.join("all_clinical_table.csv")).unwrap();
    assert_eq!(all_clinical.len(), 2);

    let site_b = SlideTable::read_csv(&tables.join("siteB_slide_table.csv")).unwrap();
    assert!(site_b.is_empty());
    let site_b_clinical =
        ClinicalTable::read_csv(&tables.join("siteB_clinical_table.csv")).unwrap();
    assert_eq!(site_b_clinical.len(), 1);
}

#[test]
fn test_evaluate_without_stage_zero_is_configuration_error() {
    let dir = TempDir::new().unwrap();
    let mut locator = FeatureLocator::new(dir.path(), ExtractorLayout::default());

    let err = evaluate_tables(&layout(&dir), &mut locator).unwrap_err();
    assert!(err.is_configuration());
}
