//! Per-institution processing checks
//!
//! Verifies that every slide of an institution has its raw image and its
//! processed feature file, and collects error lines from the extractor log.
//! Findings are reported, never fatal.

use argo_common::config::ValidateConfig;
use argo_common::{Result, SlideTable};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

const RAW_EXTENSION: &str = "svs";
const PROCESSED_EXTENSION: &str = "h5";
const LOG_ERROR_MARKERS: [&str; 2] = ["ERROR", "Exception"];

/// Findings for one institution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstitutionReport {
    pub institution: String,
    pub slides_checked: usize,
    pub missing_raw: Vec<String>,
    pub missing_processed: Vec<String>,
    pub log_errors: Vec<String>,
}

impl InstitutionReport {
    pub fn is_clean(&self) -> bool {
        self.missing_raw.is_empty()
            && self.missing_processed.is_empty()
            && self.log_errors.is_empty()
    }

    /// Human-readable report block
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "\nValidating {}...", self.institution);

        if self.missing_raw.is_empty() {
            let _ = writeln!(out, "✓ All raw files present");
        } else {
            let _ = writeln!(out, "Missing raw files ({}):", self.missing_raw.len());
            for name in &self.missing_raw {
                let _ = writeln!(out, "  - {}.{}", name, RAW_EXTENSION);
            }
        }

        if self.missing_processed.is_empty() {
            let _ = writeln!(out, "✓ All processed files present");
        } else {
            let _ = writeln!(
                out,
                "Missing processed files ({}):",
                self.missing_processed.len()
            );
            for name in &self.missing_processed {
                let _ = writeln!(out, "  - {}.{}", name, PROCESSED_EXTENSION);
            }
        }

        if self.log_errors.is_empty() {
            let _ = writeln!(out, "✓ No extractor processing errors");
        } else {
            let _ = writeln!(out, "Extractor processing errors ({}):", self.log_errors.len());
            for line in &self.log_errors {
                let _ = writeln!(out, "  - {}", line);
            }
        }
        out
    }
}

pub struct ProcessingValidator {
    data_dir: PathBuf,
    processed_dir: String,
    log_file: String,
}

impl ProcessingValidator {
    pub fn new(data_dir: impl Into<PathBuf>, config: &ValidateConfig) -> Self {
        Self {
            data_dir: data_dir.into(),
            processed_dir: config.processed_dir.clone(),
            log_file: config.log_file.clone(),
        }
    }

    pub fn institution_dir(&self, institution: &str) -> PathBuf {
        self.data_dir.join(institution)
    }

    pub fn raw_path(&self, institution: &str, filename: &str) -> PathBuf {
        self.institution_dir(institution)
            .join("raw")
            .join(format!("{}.{}", filename, RAW_EXTENSION))
    }

    pub fn processed_path(&self, institution: &str, filename: &str) -> PathBuf {
        self.institution_dir(institution)
            .join("processed")
            .join(&self.processed_dir)
            .join(format!("{}.{}", filename, PROCESSED_EXTENSION))
    }

    pub fn log_path(&self, institution: &str) -> PathBuf {
        self.institution_dir(institution)
            .join("cache")
            .join(&self.log_file)
    }

    pub fn validate(&self, institution: &str, slides: &SlideTable) -> Result<InstitutionReport> {
        let missing = |path_of: &dyn Fn(&str) -> PathBuf| -> Vec<String> {
            slides
                .records
                .iter()
                .filter(|s| !path_of(&s.filename).exists())
                .map(|s| s.filename.clone())
                .collect()
        };

        let missing_raw = missing(&|f| self.raw_path(institution, f));
        let missing_processed = missing(&|f| self.processed_path(institution, f));
        let log_errors = scan_log(&self.log_path(institution))?;

        let report = InstitutionReport {
            institution: institution.to_string(),
            slides_checked: slides.len(),
            missing_raw,
            missing_processed,
            log_errors,
        };
        tracing::info!(
            institution,
            slides = report.slides_checked,
            missing_raw = report.missing_raw.len(),
            missing_processed = report.missing_processed.len(),
            log_errors = report.log_errors.len(),
            "Validated institution"
        );
        Ok(report)
    }
}

/// Lines of the extractor log that report an error; no log means no errors
fn scan_log(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes)
        .lines()
        .filter(|line| LOG_ERROR_MARKERS.iter().any(|marker| line.contains(marker)))
        .map(|line| line.trim().to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use argo_common::SlideRecord;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_validate_reports_missing_files_and_log_errors() {
        let dir = TempDir::new().unwrap();
        let validator = ProcessingValidator::new(dir.path(), &ValidateConfig::default());

        touch(&validator.raw_path("LUTH", "L-1"));
        touch(&validator.processed_path("LUTH", "L-1"));
        touch(&validator.raw_path("LUTH", "L-2"));
        let log = validator.log_path("LUTH");
        touch(&log);
        fs::write(
            &log,
            "INFO start\n\
             ERROR tile extraction failed for L-2\n\
             ValueError Exception raised\n\
             INFO done\n",
        )
        .unwrap();

        let slides = SlideTable::new(
            Vec::new(),
            vec![
                SlideRecord::new("luth_1", "L-1", Some("luth".to_string())),
                SlideRecord::new("luth_2", "L-2", Some("luth".to_string())),
            ],
        );
        let report = validator.validate("LUTH", &slides).unwrap();

        assert!(report.missing_raw.is_empty());
        assert_eq!(report.missing_processed, vec!["L-2"]);
        assert_eq!(report.log_errors.len(), 2);
        assert!(!report.is_clean());
        assert!(report.render().contains("  - L-2.h5"));
    }

    #[test]
    fn test_clean_institution_without_log() {
        let dir = TempDir::new().unwrap();
        let validator = ProcessingValidator::new(dir.path(), &ValidateConfig::default());
        let report = validator
            .validate("retrospective_msk", &SlideTable::default())
            .unwrap();
        assert!(report.is_clean());
        assert!(report.render().contains("✓ All raw files present"));
    }
}
