//! Per-institution cohort tables
//!
//! The older collection layout keeps one clinical/slide table pair per
//! retrospective institution and one for the whole prospective cohort.
//! Patient ids are derived from institution-specific fields rather than the
//! REDCap record id.

use super::clinical_extractor::{field, ClinicalExtractor, Protocol, BATCH_FIELD, RECORD_ID_FIELD};
use super::redcap_client::RawRecord;
use argo_common::tables::SITE_COLUMN;
use argo_common::{ClinicalTable, Error, PatientRecord, Result, SlideRecord, SlideTable};
use std::path::Path;
use tracing::{info, warn};

pub const CRC_NUMBER_FIELD: &str = "crc_redcap_number";
pub const RETROSPECTIVE_FILENAME_FIELD: &str = "filename";
pub const PROSPECTIVE_DAG_FIELD: &str = "r01_redcap_data_access_group";
pub const PROSPECTIVE_RECORD_FIELD: &str = "r01_record_id";
pub const SLIDE_NAME_FIELD: &str = "slide_name";

/// Retrospective contributing institution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Institution {
    Msk,
    Oau,
}

impl Institution {
    pub const ALL: [Institution; 2] = [Institution::Msk, Institution::Oau];

    pub fn name(&self) -> &'static str {
        match self {
            Institution::Msk => "msk",
            Institution::Oau => "oau",
        }
    }

    pub fn batch(&self) -> &'static str {
        match self {
            Institution::Msk => "1",
            Institution::Oau => "2",
        }
    }
}

/// A clinical/slide table pair written under one file prefix
#[derive(Debug, Clone)]
pub struct Cohort {
    pub name: String,
    pub clinical: ClinicalTable,
    pub slides: SlideTable,
}

impl Cohort {
    /// Write `<name>_clinical_table.csv` and `<name>_slide_table.csv`
    pub fn write(&self, dir: &Path) -> Result<()> {
        self.clinical
            .write_csv(&dir.join(format!("{}_clinical_table.csv", self.name)))?;
        self.slides
            .write_csv(&dir.join(format!("{}_slide_table.csv", self.name)))?;
        info!(
            cohort = %self.name,
            patients = self.clinical.len(),
            slides = self.slides.len(),
            "Saved cohort tables"
        );
        Ok(())
    }
}

pub struct CohortExporter<'a> {
    extractor: &'a ClinicalExtractor,
}

impl<'a> CohortExporter<'a> {
    pub fn new(extractor: &'a ClinicalExtractor) -> Self {
        Self { extractor }
    }

    /// Cohort of one retrospective institution, `PATIENT = crc_<number>`
    pub fn retrospective(&self, records: &[RawRecord], institution: Institution) -> Result<Cohort> {
        let mapping = self.extractor.mapping(Protocol::Retrospective);
        let mut clinical = ClinicalTable::default();
        let mut slides = SlideTable::default();

        for record in records
            .iter()
            .filter(|r| field(r, BATCH_FIELD) == Some(institution.batch()))
        {
            let crc_number = field(record, CRC_NUMBER_FIELD).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "{} record {} has no {}",
                    institution.name(),
                    field(record, RECORD_ID_FIELD).unwrap_or("?"),
                    CRC_NUMBER_FIELD
                ))
            })?;
            let patient_id = format!("crc_{}", crc_number);

            let status = mapping.map(field(record, &mapping.field));
            clinical.records.push(PatientRecord::new(&patient_id, status));

            if let Some(filename) = field(record, RETROSPECTIVE_FILENAME_FIELD) {
                slides
                    .records
                    .push(SlideRecord::new(&patient_id, filename, None));
            }
        }

        Ok(Cohort {
            name: format!("retrospective_{}", institution.name()),
            clinical,
            slides,
        })
    }

    /// Prospective cohort, `PATIENT = <access group>_<r01 record id>`.
    ///
    /// `slide_name` lists several slides separated by `", "`; each becomes
    /// one slide row with a trailing `.svs` removed.
    pub fn prospective(&self, records: &[RawRecord]) -> Result<Cohort> {
        let mapping = self.extractor.mapping(Protocol::Prospective);
        let mut clinical = ClinicalTable::new(vec![SITE_COLUMN.to_string()], Vec::new());
        let mut slides = SlideTable::default();
        let mut without_slides = 0usize;

        for record in records
            .iter()
            .filter(|r| Protocol::of(r) == Protocol::Prospective)
        {
            let record_id = field(record, RECORD_ID_FIELD).unwrap_or("?");
            let site = field(record, PROSPECTIVE_DAG_FIELD).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "prospective record {} has no {}",
                    record_id, PROSPECTIVE_DAG_FIELD
                ))
            })?;
            let r01_id = field(record, PROSPECTIVE_RECORD_FIELD).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "prospective record {} has no {}",
                    record_id, PROSPECTIVE_RECORD_FIELD
                ))
            })?;
            let patient_id = format!("{}_{}", site, r01_id);

            let status = mapping.map(field(record, &mapping.field));
            clinical.records.push(
                PatientRecord::new(&patient_id, status).with_extra(vec![Some(site.to_string())]),
            );

            let names = field(record, SLIDE_NAME_FIELD)
                .map(split_slide_names)
                .unwrap_or_default();
            if names.is_empty() {
                without_slides += 1;
            }
            for name in names {
                slides
                    .records
                    .push(SlideRecord::new(&patient_id, name, Some(site.to_string())));
            }
        }

        if without_slides > 0 {
            warn!(
                patients = without_slides,
                "Prospective records without slide names"
            );
        }

        Ok(Cohort {
            name: "prospective".to_string(),
            clinical,
            slides,
        })
    }
}

/// Split a multi-slide field and drop the `.svs` suffix of each name
pub fn split_slide_names(value: &str) -> Vec<&str> {
    value
        .split(", ")
        .map(|name| {
            let name = name.trim();
            name.strip_suffix(".svs").unwrap_or(name)
        })
        .filter(|name| !name.is_empty())
        .collect()
}
