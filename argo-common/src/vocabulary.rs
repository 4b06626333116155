//! MSI status vocabularies
//!
//! Raw survey exports encode MSI status differently depending on the
//! collection protocol. A [`StatusVocabulary`] names the source field and the
//! raw-code table for each protocol, and is versioned so that a new export
//! format is a new vocabulary value rather than a code change.
//!
//! [`LabelSet`] goes the other way: it controls how canonical statuses are
//! written for downstream tools with their own vocabulary.

use crate::{Error, MsiStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Raw code table for one source field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Name of the raw record field holding the status code
    pub field: String,
    /// Raw code → canonical status
    pub codes: BTreeMap<String, MsiStatus>,
}

impl FieldMapping {
    pub fn new(field: &str, codes: &[(&str, MsiStatus)]) -> Self {
        Self {
            field: field.to_string(),
            codes: codes
                .iter()
                .map(|(code, status)| (code.to_string(), *status))
                .collect(),
        }
    }

    /// Map a raw code; unknown or missing codes have no status
    pub fn map(&self, raw: Option<&str>) -> Option<MsiStatus> {
        raw.map(str::trim)
            .and_then(|code| self.codes.get(code))
            .copied()
    }
}

/// Versioned mapping from raw survey codes to canonical MSI status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusVocabulary {
    pub version: String,
    /// Used for batch 1/2 (retrospective) records
    pub retrospective: FieldMapping,
    /// Used for every other batch (prospective) record
    pub prospective: FieldMapping,
}

impl StatusVocabulary {
    pub const DEFAULT_VERSION: &'static str = "v2";

    /// Legacy collection: retrospective status in `ismsih` as 1/0
    pub fn v1() -> Self {
        Self {
            version: "v1".to_string(),
            retrospective: FieldMapping::new(
                "ismsih",
                &[("1", MsiStatus::MsiHigh), ("0", MsiStatus::Stable)],
            ),
            prospective: prospective_cmo_mapping(),
        }
    }

    /// Current project export: retrospective status in `msi_status_mmr` as 1/2
    pub fn v2() -> Self {
        Self {
            version: "v2".to_string(),
            retrospective: FieldMapping::new(
                "msi_status_mmr",
                &[("1", MsiStatus::MsiHigh), ("2", MsiStatus::Stable)],
            ),
            prospective: prospective_cmo_mapping(),
        }
    }

    /// Look up a built-in vocabulary by version name
    pub fn builtin(version: &str) -> Option<Self> {
        match version {
            "v1" => Some(Self::v1()),
            "v2" => Some(Self::v2()),
            _ => None,
        }
    }

    /// Load a vocabulary from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            Error::Config(format!(
                "invalid status vocabulary {}: {}",
                path.display(),
                e
            ))
        })
    }
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self::v2()
    }
}

fn prospective_cmo_mapping() -> FieldMapping {
    FieldMapping::new(
        "cmo_msi_status",
        &[
            ("Instable", MsiStatus::MsiHigh),
            ("Stable", MsiStatus::Stable),
            ("Indeterminate", MsiStatus::Stable),
            ("Stable, Indeterminate", MsiStatus::Stable),
        ],
    )
}

/// Output labels for canonical statuses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSet {
    pub msi_high: String,
    pub stable: String,
}

impl LabelSet {
    /// `MSI-H` / `MSS`, the labels clinical tables are written with
    pub fn canonical() -> Self {
        Self {
            msi_high: MsiStatus::MsiHigh.as_str().to_string(),
            stable: MsiStatus::Stable.as_str().to_string(),
        }
    }

    /// `MSIH` / `nonMSIH`, the binary target vocabulary of the training tool
    pub fn binary_target() -> Self {
        Self {
            msi_high: "MSIH".to_string(),
            stable: "nonMSIH".to_string(),
        }
    }

    pub fn label(&self, status: MsiStatus) -> &str {
        match status {
            MsiStatus::MsiHigh => &self.msi_high,
            MsiStatus::Stable => &self.stable,
        }
    }
}

impl Default for LabelSet {
    fn default() -> Self {
        Self::canonical()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_maps_retrospective_codes() {
        let vocab = StatusVocabulary::v2();
        assert_eq!(vocab.retrospective.field, "msi_status_mmr");
        assert_eq!(vocab.retrospective.map(Some("1")), Some(MsiStatus::MsiHigh));
        assert_eq!(vocab.retrospective.map(Some("2")), Some(MsiStatus::Stable));
        assert_eq!(vocab.retrospective.map(Some("0")), None);
        assert_eq!(vocab.retrospective.map(None), None);
    }

    #[test]
    fn test_v1_uses_legacy_field() {
        let vocab = StatusVocabulary::v1();
        assert_eq!(vocab.retrospective.field, "ismsih");
        assert_eq!(vocab.retrospective.map(Some("0")), Some(MsiStatus::Stable));
    }

    #[test]
    fn test_prospective_indeterminate_is_stable() {
        let vocab = StatusVocabulary::default();
        let m = &vocab.prospective;
        assert_eq!(m.map(Some("Instable")), Some(MsiStatus::MsiHigh));
        assert_eq!(m.map(Some("Indeterminate")), Some(MsiStatus::Stable));
        assert_eq!(m.map(Some("Stable, Indeterminate")), Some(MsiStatus::Stable));
        assert_eq!(m.map(Some("Pending")), None);
    }

    #[test]
    fn test_builtin_lookup() {
        assert!(StatusVocabulary::builtin("v1").is_some());
        assert!(StatusVocabulary::builtin("v3").is_none());
    }

    #[test]
    fn test_vocabulary_parses_from_toml() {
        let text = r#"
            version = "site-x"

            [retrospective]
            field = "msi_call"
            codes = { "H" = "MSI-H", "S" = "MSS" }

            [prospective]
            field = "cmo_msi_status"
            codes = { "Instable" = "MSI-H" }
        "#;
        let vocab: StatusVocabulary = toml::from_str(text).unwrap();
        assert_eq!(vocab.version, "site-x");
        assert_eq!(vocab.retrospective.map(Some("H")), Some(MsiStatus::MsiHigh));
        assert_eq!(vocab.prospective.map(Some("Stable")), None);
    }

    #[test]
    fn test_binary_target_labels() {
        let labels = LabelSet::binary_target();
        assert_eq!(labels.label(MsiStatus::MsiHigh), "MSIH");
        assert_eq!(labels.label(MsiStatus::Stable), "nonMSIH");
    }
}
