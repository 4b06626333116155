//! Legacy cohort collection from a saved REDCap export, followed by the
//! per-institution processing checks over the written tables

use argo_common::config::TomlConfig;
use argo_common::{ClinicalTable, MsiStatus, SlideTable};
use argo_prep::workflow::{run_collect, run_validate, RecordSource};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const EXPORT: &str = r#"[
  {"record_id": "1", "batch_number": "1", "crc_redcap_number": "101",
   "filename": "MSK-1", "msi_status_mmr": "1"},
  {"record_id": "2", "batch_number": "2", "crc_redcap_number": "202",
   "filename": "OAU-1", "msi_status_mmr": "2"},
  {"record_id": "3", "batch_number": "", "redcap_data_access_group": "luth",
   "r01_redcap_data_access_group": "luth", "r01_record_id": "7",
   "slide_name": "L-1.svs, L-2.svs", "cmo_msi_status": "Stable"},
  {"record_id": "4", "batch_number": "3", "redcap_data_access_group": "uith",
   "r01_redcap_data_access_group": "uith", "r01_record_id": "8",
   "slide_name": "", "cmo_msi_status": "Instable"}
]"#;

fn touch(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"").unwrap();
}

fn config(dir: &TempDir) -> TomlConfig {
    let mut config = TomlConfig::default();
    config.paths.data_dir = dir.path().join("data");
    config.paths.tables_dir = dir.path().join("tables");
    config.paths.charts_dir = dir.path().join("visualizations");
    config.validate.prospective_sites = vec!["luth".to_string()];
    config
}

async fn collect(dir: &TempDir, config: &TomlConfig) {
    let export = dir.path().join("redcap.json");
    fs::write(&export, EXPORT).unwrap();
    run_collect(config, &RecordSource::File(export), None)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_collect_writes_cohort_tables() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    collect(&dir, &config).await;

    let tables = dir.path().join("tables");
    let msk =
        ClinicalTable::read_csv(&tables.join("retrospective_msk_clinical_table.csv")).unwrap();
    assert_eq!(msk.records[0].patient_id, "crc_101");
    assert_eq!(msk.records[0].msi_status, Some(MsiStatus::MsiHigh));

    let oau = SlideTable::read_csv(&tables.join("retrospective_oau_slide_table.csv")).unwrap();
    assert_eq!(oau.records[0].filename, "OAU-1");

    let prospective =
        ClinicalTable::read_csv(&tables.join("prospective_clinical_table.csv")).unwrap();
    assert_eq!(prospective.extra_columns, vec!["SITE"]);
    assert_eq!(prospective.len(), 2);
    assert_eq!(prospective.records[0].patient_id, "luth_7");

    let slides = SlideTable::read_csv(&tables.join("prospective_slide_table.csv")).unwrap();
    let names: Vec<&str> = slides.records.iter().map(|s| s.filename.as_str()).collect();
    assert_eq!(names, vec!["L-1", "L-2"]);
    assert_eq!(slides.records[0].site.as_deref(), Some("luth"));
}

#[tokio::test]
async fn test_validate_reports_each_institution() {
    let dir = TempDir::new().unwrap();
    let config = config(&dir);
    collect(&dir, &config).await;

    let data = dir.path().join("data");
    let processed = &config.validate.processed_dir;
    touch(&data.join("LUTH/raw/L-1.svs"));
    touch(&data.join("LUTH/raw/L-2.svs"));
    touch(&data.join(format!("LUTH/processed/{}/L-1.h5", processed)));
    touch(&data.join("retrospective_msk/raw/MSK-1.svs"));
    touch(&data.join(format!("retrospective_msk/processed/{}/MSK-1.h5", processed)));

    let reports = run_validate(&config).unwrap();
    let institutions: Vec<&str> = reports.iter().map(|r| r.institution.as_str()).collect();
    assert_eq!(institutions, vec!["LUTH", "retrospective_msk", "retrospective_oau"]);

    assert!(reports[0].missing_raw.is_empty());
    assert_eq!(reports[0].missing_processed, vec!["L-2"]);
    assert!(reports[1].is_clean());
    assert_eq!(reports[2].missing_raw, vec!["OAU-1"]);
    assert_eq!(reports[2].missing_processed, vec!["OAU-1"]);
}

#[tokio::test]
async fn test_validate_without_collected_tables_fails() {
    let dir = TempDir::new().unwrap();
    let err = run_validate(&config(&dir)).unwrap_err();
    assert!(err.is_configuration());
}
