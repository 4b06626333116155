//! Clinical extractor
//!
//! Turns raw REDCap records into the project clinical table. The batch number
//! selects the collection protocol, and the protocol selects which field of
//! the [`StatusVocabulary`] carries the MSI status.

use super::redcap_client::RawRecord;
use argo_common::vocabulary::FieldMapping;
use argo_common::{ClinicalTable, Error, PatientRecord, Result, StatusVocabulary};
use tracing::{debug, info};

pub const RECORD_ID_FIELD: &str = "record_id";
pub const BATCH_FIELD: &str = "batch_number";
pub const DAG_FIELD: &str = "redcap_data_access_group";

/// Collection protocol of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Batches 1 and 2
    Retrospective,
    /// Every other batch, including records without a batch number
    Prospective,
}

impl Protocol {
    pub fn of(record: &RawRecord) -> Self {
        match field(record, BATCH_FIELD) {
            Some("1") | Some("2") => Protocol::Retrospective,
            _ => Protocol::Prospective,
        }
    }
}

/// Trimmed non-empty value of a record field
pub fn field<'a>(record: &'a RawRecord, name: &str) -> Option<&'a str> {
    record
        .get(name)
        .and_then(|value| value.as_deref())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

pub struct ClinicalExtractor {
    vocabulary: StatusVocabulary,
}

impl ClinicalExtractor {
    pub fn new(vocabulary: StatusVocabulary) -> Self {
        Self { vocabulary }
    }

    pub fn vocabulary(&self) -> &StatusVocabulary {
        &self.vocabulary
    }

    pub fn mapping(&self, protocol: Protocol) -> &FieldMapping {
        match protocol {
            Protocol::Retrospective => &self.vocabulary.retrospective,
            Protocol::Prospective => &self.vocabulary.prospective,
        }
    }

    /// Build the clinical table: prospective rows first, then retrospective.
    ///
    /// Codes missing from the vocabulary leave the status absent. A record
    /// without a record id is malformed and aborts extraction.
    pub fn extract(&self, records: &[RawRecord]) -> Result<ClinicalTable> {
        let mut table = ClinicalTable::new(
            vec![BATCH_FIELD.to_string(), DAG_FIELD.to_string()],
            Vec::with_capacity(records.len()),
        );

        for protocol in [Protocol::Prospective, Protocol::Retrospective] {
            let mapping = self.mapping(protocol);
            let mut extracted = 0usize;
            let mut unmapped = 0usize;

            for (index, record) in records.iter().enumerate() {
                if Protocol::of(record) != protocol {
                    continue;
                }
                let patient_id = field(record, RECORD_ID_FIELD).ok_or_else(|| {
                    Error::InvalidInput(format!(
                        "REDCap record {} has no {}",
                        index, RECORD_ID_FIELD
                    ))
                })?;

                let raw_status = field(record, &mapping.field);
                let msi_status = mapping.map(raw_status);
                if msi_status.is_none() {
                    unmapped += 1;
                    debug!(
                        patient = patient_id,
                        field = %mapping.field,
                        raw = raw_status.unwrap_or(""),
                        "No MSI status for record"
                    );
                }

                let extra = vec![
                    field(record, BATCH_FIELD).map(str::to_string),
                    field(record, DAG_FIELD).map(str::to_string),
                ];
                table
                    .records
                    .push(PatientRecord::new(patient_id, msi_status).with_extra(extra));
                extracted += 1;
            }

            info!(
                protocol = ?protocol,
                vocabulary = %self.vocabulary.version,
                records = extracted,
                without_status = unmapped,
                "Extracted clinical records"
            );
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argo_common::MsiStatus;

    fn record(fields: &[(&str, &str)]) -> RawRecord {
        fields
            .iter()
            .map(|(k, v)| {
                let value = if v.is_empty() { None } else { Some(v.to_string()) };
                (k.to_string(), value)
            })
            .collect()
    }

    #[test]
    fn test_protocol_from_batch_number() {
        assert_eq!(
            Protocol::of(&record(&[("batch_number", "1")])),
            Protocol::Retrospective
        );
        assert_eq!(
            Protocol::of(&record(&[("batch_number", " 2 ")])),
            Protocol::Retrospective
        );
        assert_eq!(
            Protocol::of(&record(&[("batch_number", "3")])),
            Protocol::Prospective
        );
        assert_eq!(Protocol::of(&record(&[])), Protocol::Prospective);
    }

    #[test]
    fn test_extract_orders_prospective_first() {
        let records = vec![
            record(&[("record_id", "1"), ("batch_number", "1"), ("msi_status_mmr", "1")]),
            record(&[
                ("record_id", "2"),
                ("batch_number", "4"),
                ("cmo_msi_status", "Stable, Indeterminate"),
                ("redcap_data_access_group", "luth"),
            ]),
            record(&[("record_id", "3"), ("batch_number", "2"), ("msi_status_mmr", "2")]),
        ];

        let table = ClinicalExtractor::new(StatusVocabulary::v2())
            .extract(&records)
            .unwrap();

        let ids: Vec<&str> = table.records.iter().map(|r| r.patient_id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(table.records[0].msi_status, Some(MsiStatus::Stable));
        assert_eq!(table.records[0].extra[1].as_deref(), Some("luth"));
        assert_eq!(table.records[1].msi_status, Some(MsiStatus::MsiHigh));
        assert_eq!(table.records[2].msi_status, Some(MsiStatus::Stable));
        assert_eq!(table.extra_columns, vec!["batch_number", "redcap_data_access_group"]);
    }

    #[test]
    fn test_unknown_code_leaves_status_absent() {
        let records = vec![record(&[
            ("record_id", "9"),
            ("batch_number", "1"),
            ("msi_status_mmr", "7"),
        ])];
        let table = ClinicalExtractor::new(StatusVocabulary::v2())
            .extract(&records)
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.records[0].msi_status, None);
    }

    #[test]
    fn test_legacy_vocabulary_reads_ismsih() {
        let records = vec![record(&[
            ("record_id", "5"),
            ("batch_number", "2"),
            ("ismsih", "0"),
            ("msi_status_mmr", "1"),
        ])];
        let table = ClinicalExtractor::new(StatusVocabulary::v1())
            .extract(&records)
            .unwrap();
        assert_eq!(table.records[0].msi_status, Some(MsiStatus::Stable));
    }

    #[test]
    fn test_missing_record_id_is_fatal() {
        let records = vec![record(&[("batch_number", "1"), ("msi_status_mmr", "1")])];
        let err = ClinicalExtractor::new(StatusVocabulary::v2())
            .extract(&records)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
