//! Clinical and slide tables
//!
//! CSV vocabulary shared with the training pipeline:
//! - clinical: `PATIENT`, `isMSIH`
//! - slide: `PATIENT`, `FILENAME`, `SITE`, optional `FEATURE_PATH`
//!
//! Any other column is carried through unchanged and written after the
//! canonical ones, in input order. Cells are whitespace-trimmed on read and an
//! empty cell is a missing value.

use crate::model::{MsiStatus, PatientRecord, SlideRecord};
use crate::vocabulary::LabelSet;
use crate::{Error, Result};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

pub const PATIENT_COLUMN: &str = "PATIENT";
pub const STATUS_COLUMN: &str = "isMSIH";
pub const FILENAME_COLUMN: &str = "FILENAME";
pub const SITE_COLUMN: &str = "SITE";
pub const FEATURE_PATH_COLUMN: &str = "FEATURE_PATH";

/// Share of one status within a clinical table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusShare {
    pub status: MsiStatus,
    pub count: usize,
    /// Percentage of all rows in the table
    pub percentage: f64,
}

/// Patient-level table: one row per patient
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClinicalTable {
    pub extra_columns: Vec<String>,
    pub records: Vec<PatientRecord>,
}

impl ClinicalTable {
    pub fn new(extra_columns: Vec<String>, records: Vec<PatientRecord>) -> Self {
        Self {
            extra_columns,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn patient_ids(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.patient_id.as_str()).collect()
    }

    /// Copy of this table keeping only rows matching `keep`
    pub fn filtered<F>(&self, keep: F) -> Self
    where
        F: Fn(&PatientRecord) -> bool,
    {
        Self {
            extra_columns: self.extra_columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
        }
    }

    /// Status counts, most frequent first. Rows without status are not listed
    /// but count towards the percentage denominator.
    pub fn status_distribution(&self) -> Vec<StatusShare> {
        let total = self.records.len();
        let mut shares: Vec<StatusShare> = MsiStatus::ALL
            .iter()
            .map(|&status| {
                let count = self
                    .records
                    .iter()
                    .filter(|r| r.msi_status == Some(status))
                    .count();
                StatusShare {
                    status,
                    count,
                    percentage: percentage(count, total),
                }
            })
            .filter(|share| share.count > 0)
            .collect();
        // Stable sort keeps enum order for ties
        shares.sort_by(|a, b| b.count.cmp(&a.count));
        shares
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = open_input(path)?;
        Self::from_reader(file, &path.display().to_string())
    }

    /// Parse a clinical table; `source` names the table in error messages
    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut csv_reader = csv_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let patient_idx = column_index(&headers, source, PATIENT_COLUMN)?;
        let status_idx = column_index(&headers, source, STATUS_COLUMN)?;
        let (extra_columns, extra_idx) = extra_columns(&headers, &[patient_idx, status_idx]);

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let patient_id = cell(&row, patient_idx).ok_or_else(|| {
                Error::InvalidInput(format!(
                    "{}: row {} has no {}",
                    source,
                    row_number(&row),
                    PATIENT_COLUMN
                ))
            })?;
            let msi_status = cell(&row, status_idx)
                .map(|label| label.parse::<MsiStatus>())
                .transpose()
                .map_err(|e| {
                    Error::InvalidInput(format!("{}: row {}: {}", source, row_number(&row), e))
                })?;
            let extra = extra_idx.iter().map(|&i| cell(&row, i)).collect();
            records.push(PatientRecord::new(patient_id, msi_status).with_extra(extra));
        }

        Ok(Self {
            extra_columns,
            records,
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        self.write_csv_with_labels(path, &LabelSet::canonical())
    }

    /// Write with a non-canonical status vocabulary
    pub fn write_csv_with_labels(&self, path: &Path, labels: &LabelSet) -> Result<()> {
        write_atomic(path, |w| self.to_writer(w, labels))
    }

    pub fn to_writer<W: Write>(&self, writer: W, labels: &LabelSet) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![PATIENT_COLUMN, STATUS_COLUMN];
        header.extend(self.extra_columns.iter().map(String::as_str));
        csv_writer.write_record(&header)?;

        for record in &self.records {
            let mut row = vec![
                record.patient_id.as_str(),
                record.msi_status.map(|s| labels.label(s)).unwrap_or(""),
            ];
            row.extend(extra_cells(&record.extra, self.extra_columns.len()));
            csv_writer.write_record(&row)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Slide-level table: one row per slide image
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlideTable {
    pub extra_columns: Vec<String>,
    pub records: Vec<SlideRecord>,
    /// Whether the `FEATURE_PATH` column is part of the schema
    pub annotated: bool,
}

impl SlideTable {
    pub fn new(extra_columns: Vec<String>, records: Vec<SlideRecord>) -> Self {
        Self {
            extra_columns,
            records,
            annotated: false,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn patient_ids(&self) -> HashSet<&str> {
        self.records.iter().map(|r| r.patient_id.as_str()).collect()
    }

    /// Distinct sites in order of first appearance
    pub fn sites(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter_map(|r| r.site.as_deref())
            .filter(|site| seen.insert(*site))
            .collect()
    }

    /// Copy of this table keeping only rows matching `keep`
    pub fn filtered<F>(&self, keep: F) -> Self
    where
        F: Fn(&SlideRecord) -> bool,
    {
        Self {
            extra_columns: self.extra_columns.clone(),
            records: self.records.iter().filter(|r| keep(r)).cloned().collect(),
            annotated: self.annotated,
        }
    }

    /// Training-ready view: slides without a feature artifact are dropped and
    /// `FILENAME` is replaced by the artifact path.
    pub fn with_feature_paths_as_filenames(&self) -> Self {
        let records = self
            .records
            .iter()
            .filter_map(|r| {
                r.feature_path.as_ref().map(|path| SlideRecord {
                    filename: path.to_string_lossy().into_owned(),
                    feature_path: None,
                    ..r.clone()
                })
            })
            .collect();
        Self {
            extra_columns: self.extra_columns.clone(),
            records,
            annotated: false,
        }
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        let file = open_input(path)?;
        Self::from_reader(file, &path.display().to_string())
    }

    /// Parse a slide table; `source` names the table in error messages
    pub fn from_reader<R: Read>(reader: R, source: &str) -> Result<Self> {
        let mut csv_reader = csv_reader(reader);
        let headers = csv_reader.headers()?.clone();

        let patient_idx = column_index(&headers, source, PATIENT_COLUMN)?;
        let filename_idx = column_index(&headers, source, FILENAME_COLUMN)?;
        let site_idx = headers.iter().position(|h| h == SITE_COLUMN);
        let feature_idx = headers.iter().position(|h| h == FEATURE_PATH_COLUMN);

        let mut canonical = vec![patient_idx, filename_idx];
        canonical.extend(site_idx);
        canonical.extend(feature_idx);
        let (extra_columns, extra_idx) = extra_columns(&headers, &canonical);

        let mut records = Vec::new();
        for row in csv_reader.records() {
            let row = row?;
            let missing = |column: &str| {
                Error::InvalidInput(format!(
                    "{}: row {} has no {}",
                    source,
                    row_number(&row),
                    column
                ))
            };
            let patient_id = cell(&row, patient_idx).ok_or_else(|| missing(PATIENT_COLUMN))?;
            let filename = cell(&row, filename_idx).ok_or_else(|| missing(FILENAME_COLUMN))?;
            let site = site_idx.and_then(|i| cell(&row, i));
            let extra = extra_idx.iter().map(|&i| cell(&row, i)).collect();

            let mut record = SlideRecord::new(patient_id, filename, site).with_extra(extra);
            record.feature_path = feature_idx.and_then(|i| cell(&row, i)).map(PathBuf::from);
            records.push(record);
        }

        Ok(Self {
            extra_columns,
            records,
            annotated: feature_idx.is_some(),
        })
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        write_atomic(path, |w| self.to_writer(w))
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![PATIENT_COLUMN, FILENAME_COLUMN, SITE_COLUMN];
        header.extend(self.extra_columns.iter().map(String::as_str));
        if self.annotated {
            header.push(FEATURE_PATH_COLUMN);
        }
        csv_writer.write_record(&header)?;

        for record in &self.records {
            let feature_path = record
                .feature_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut row = vec![
                record.patient_id.as_str(),
                record.filename.as_str(),
                record.site.as_deref().unwrap_or(""),
            ];
            row.extend(extra_cells(&record.extra, self.extra_columns.len()));
            if self.annotated {
                row.push(feature_path.as_str());
            }
            csv_writer.write_record(&row)?;
        }

        csv_writer.flush()?;
        Ok(())
    }
}

/// Write a file through a sibling `.tmp` file and rename it into place, so a
/// failed write never leaves a truncated output behind.
pub fn write_atomic<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    if let Err(e) = write_temp(&tmp_path, write) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn write_temp<F>(tmp_path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    let mut writer = BufWriter::new(File::create(tmp_path)?);
    write(&mut writer)?;
    writer.flush()?;
    Ok(())
}

/// `count / total * 100`, zero for an empty total
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

fn open_input(path: &Path) -> Result<File> {
    if !path.exists() {
        return Err(Error::MissingInput(path.to_path_buf()));
    }
    Ok(File::open(path)?)
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader)
}

fn column_index(headers: &csv::StringRecord, table: &str, column: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| Error::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

fn extra_columns(headers: &csv::StringRecord, canonical: &[usize]) -> (Vec<String>, Vec<usize>) {
    headers
        .iter()
        .enumerate()
        .filter(|(i, _)| !canonical.contains(i))
        .map(|(i, name)| (name.to_string(), i))
        .unzip()
}

fn cell(row: &csv::StringRecord, idx: usize) -> Option<String> {
    row.get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn extra_cells(extra: &[Option<String>], width: usize) -> impl Iterator<Item = &str> {
    (0..width).map(move |i| extra.get(i).and_then(|v| v.as_deref()).unwrap_or(""))
}

fn row_number(row: &csv::StringRecord) -> u64 {
    row.position().map(|p| p.line()).unwrap_or(0)
}
