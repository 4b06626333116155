//! Patient and slide record models
//!
//! Records are rebuilt from source files on every run. The only identity that
//! survives between runs is the `patient_id` / `filename` string keys.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Microsatellite instability status of a patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MsiStatus {
    /// Microsatellite instability-high
    #[serde(rename = "MSI-H")]
    MsiHigh,
    /// Microsatellite stable
    #[serde(rename = "MSS")]
    Stable,
}

impl MsiStatus {
    pub const ALL: [MsiStatus; 2] = [MsiStatus::MsiHigh, MsiStatus::Stable];

    /// Canonical label written to clinical tables
    pub fn as_str(&self) -> &'static str {
        match self {
            MsiStatus::MsiHigh => "MSI-H",
            MsiStatus::Stable => "MSS",
        }
    }
}

impl fmt::Display for MsiStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MsiStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "MSI-H" => Ok(MsiStatus::MsiHigh),
            "MSS" => Ok(MsiStatus::Stable),
            other => Err(Error::InvalidInput(format!(
                "unknown MSI status label '{}'",
                other
            ))),
        }
    }
}

/// One patient row of a clinical table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub patient_id: String,
    pub msi_status: Option<MsiStatus>,
    /// Pass-through values, aligned with the owning table's `extra_columns`
    pub extra: Vec<Option<String>>,
}

impl PatientRecord {
    pub fn new(patient_id: impl Into<String>, msi_status: Option<MsiStatus>) -> Self {
        Self {
            patient_id: patient_id.into().trim().to_string(),
            msi_status,
            extra: Vec::new(),
        }
    }

    pub fn with_extra(mut self, extra: Vec<Option<String>>) -> Self {
        self.extra = extra;
        self
    }
}

/// One slide row of a slide table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideRecord {
    /// Foreign key into the clinical table; not required to resolve
    pub patient_id: String,
    /// Source-relative slide identifier or absolute slide path
    pub filename: String,
    /// Contributing site, absent for legacy data
    pub site: Option<String>,
    /// Cached feature artifact, filled in by the feature locator
    pub feature_path: Option<PathBuf>,
    /// Pass-through values, aligned with the owning table's `extra_columns`
    pub extra: Vec<Option<String>>,
}

impl SlideRecord {
    pub fn new(
        patient_id: impl Into<String>,
        filename: impl Into<String>,
        site: Option<String>,
    ) -> Self {
        Self {
            patient_id: patient_id.into().trim().to_string(),
            filename: filename.into().trim().to_string(),
            site: site
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            feature_path: None,
            extra: Vec::new(),
        }
    }

    pub fn with_extra(mut self, extra: Vec<Option<String>>) -> Self {
        self.extra = extra;
        self
    }

    /// Base name of the slide without directory or its last extension.
    ///
    /// `"/data/siteA/slideX.svs"` and `"slideX"` both yield `"slideX"`.
    pub fn base_name(&self) -> &str {
        slide_base_name(&self.filename)
    }
}

/// Strip directories and the last extension from a slide identifier
pub fn slide_base_name(filename: &str) -> &str {
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_labels_round_trip_through_display() {
        for status in MsiStatus::ALL {
            assert_eq!(status.to_string().parse::<MsiStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_rejects_unknown_label() {
        assert!("MSI-L".parse::<MsiStatus>().is_err());
        assert!("".parse::<MsiStatus>().is_err());
    }

    #[test]
    fn test_base_name_strips_path_and_extension() {
        assert_eq!(slide_base_name("slideX.svs"), "slideX");
        assert_eq!(slide_base_name("/lab/data/siteA/slideX.svs"), "slideX");
        assert_eq!(slide_base_name("slideX"), "slideX");
        // Only the last extension is removed
        assert_eq!(slide_base_name("case.12.svs"), "case.12");
    }

    #[test]
    fn test_records_trim_keys() {
        let slide = SlideRecord::new(" P1 ", " s1.svs", Some("  ".to_string()));
        assert_eq!(slide.patient_id, "P1");
        assert_eq!(slide.filename, "s1.svs");
        assert_eq!(slide.site, None);

        let patient = PatientRecord::new("P2\t", Some(MsiStatus::Stable));
        assert_eq!(patient.patient_id, "P2");
    }
}
