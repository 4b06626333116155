//! Halo Link slide inventory
//!
//! Each site exports its image catalogue as `halo_link_<site>_export.csv`.
//! Exports are loaded with their headers standardized, then reduced to the
//! canonical slide table (patient, filename, site).

use argo_common::{Result, SlideRecord, SlideTable};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const EXPORT_PREFIX: &str = "halo_link_";
pub const EXPORT_SUFFIX: &str = "_export";

pub const PATIENT_ID_COLUMN: &str = "redcap_id";
pub const SLIDE_NAME_COLUMN: &str = "filename";

/// Export header → standardized column name
const COLUMN_ALIASES: [(&str, &str); 5] = [
    ("Slide ID", "slide_id"),
    ("Study Image ID", "image_id"),
    ("Name", SLIDE_NAME_COLUMN),
    ("Image Location", "image_location"),
    ("Pathology REDCap ID", PATIENT_ID_COLUMN),
];

/// One site's export with standardized headers
#[derive(Debug, Clone)]
pub struct HaloExport {
    pub site: String,
    pub path: PathBuf,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl HaloExport {
    pub fn read(path: &Path, site: String) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)?;
        let headers = reader
            .headers()?
            .iter()
            .map(standard_column_name)
            .collect();
        let rows = reader
            .records()
            .map(|row| row.map(|r| r.iter().map(str::to_string).collect()))
            .collect::<std::result::Result<Vec<Vec<String>>, csv::Error>>()?;

        Ok(Self {
            site,
            path: path.to_path_buf(),
            headers,
            rows,
        })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

/// All exports found in the data directory
#[derive(Debug, Clone, Default)]
pub struct HaloInventory {
    pub exports: Vec<HaloExport>,
}

impl HaloInventory {
    /// Load every `halo_link_*.csv` in `data_dir`, in file name order.
    ///
    /// No exports is a warning and an empty inventory; an export that cannot
    /// be parsed aborts loading.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = match fs::read_dir(data_dir) {
            Ok(entries) => entries
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && is_export_file(path))
                .collect(),
            Err(e) => {
                warn!("Cannot read data directory {}: {}", data_dir.display(), e);
                Vec::new()
            }
        };
        paths.sort();

        if paths.is_empty() {
            warn!(
                "No Halo Link files found in data directory {}",
                data_dir.display()
            );
            return Ok(Self::default());
        }

        let mut exports = Vec::with_capacity(paths.len());
        for path in paths {
            let site = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(site_from_file_name)
                .unwrap_or_default();
            let export = HaloExport::read(&path, site)?;
            info!(
                site = %export.site,
                records = export.rows.len(),
                "Loaded halo data"
            );
            exports.push(export);
        }

        Ok(Self { exports })
    }

    pub fn row_count(&self) -> usize {
        self.exports.iter().map(|e| e.rows.len()).sum()
    }

    /// Standardized column names across all exports, first appearance order
    pub fn columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::new();
        for header in self.exports.iter().flat_map(|e| e.headers.iter()) {
            if !columns.contains(&header.as_str()) {
                columns.push(header);
            }
        }
        columns
    }

    /// Canonical slide table. Rows missing a patient id or file name are
    /// dropped.
    pub fn build_slide_table(&self) -> SlideTable {
        let Some((patient_column, filename_column)) = self.slide_columns() else {
            return SlideTable::default();
        };

        let mut records = Vec::new();
        for export in &self.exports {
            let (Some(patient_idx), Some(filename_idx)) =
                (export.column(&patient_column), export.column(&filename_column))
            else {
                continue;
            };
            for row in &export.rows {
                let patient = row.get(patient_idx).filter(|v| !v.is_empty());
                let filename = row.get(filename_idx).filter(|v| !v.is_empty());
                if let (Some(patient), Some(filename)) = (patient, filename) {
                    let site = Some(export.site.clone()).filter(|s| !s.is_empty());
                    records.push(SlideRecord::new(patient.as_str(), filename.as_str(), site));
                }
            }
        }

        let dropped = self.row_count() - records.len();
        if dropped > 0 {
            info!(rows = dropped, "Dropped halo rows without patient id or file name");
        }
        SlideTable::new(Vec::new(), records)
    }

    /// Patient and file name columns, falling back to loosely matching names
    fn slide_columns(&self) -> Option<(String, String)> {
        let columns = self.columns();
        let has_patient = columns.contains(&PATIENT_ID_COLUMN);
        let has_filename = columns.contains(&SLIDE_NAME_COLUMN);
        if has_patient && has_filename {
            return Some((PATIENT_ID_COLUMN.to_string(), SLIDE_NAME_COLUMN.to_string()));
        }

        if !self.exports.is_empty() {
            warn!(
                missing_patient_column = !has_patient,
                missing_filename_column = !has_filename,
                "Missing required columns in Halo data for slide table"
            );
        }

        let patient = columns.iter().find(|c| {
            let lower = c.to_lowercase();
            lower.contains("id") && lower.contains("redcap")
        });
        let filename = columns.iter().find(|c| {
            let lower = c.to_lowercase();
            lower.contains("name") || lower.contains("file")
        });

        match (patient, filename) {
            (Some(patient), Some(filename)) => {
                warn!("Using alternative columns: {} and {}", patient, filename);
                Some((patient.to_string(), filename.to_string()))
            }
            _ => None,
        }
    }
}

/// Site of an export file: `halo_link_<site>_export.csv` → `<site>`
pub fn site_from_file_name(file_name: &str) -> Option<String> {
    let stem = file_name.strip_suffix(".csv")?;
    let site = stem.strip_prefix(EXPORT_PREFIX)?;
    Some(site.strip_suffix(EXPORT_SUFFIX).unwrap_or(site).to_string())
}

fn is_export_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with(EXPORT_PREFIX) && n.ends_with(".csv"))
}

fn standard_column_name(header: &str) -> String {
    COLUMN_ALIASES
        .iter()
        .find(|(alias, _)| *alias == header)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| header.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_site_from_file_name() {
        assert_eq!(
            site_from_file_name("halo_link_luth_export.csv").as_deref(),
            Some("luth")
        );
        assert_eq!(site_from_file_name("halo_link_uith.csv").as_deref(), Some("uith"));
        assert_eq!(site_from_file_name("other.csv"), None);
    }

    #[test]
    fn test_standard_column_names() {
        assert_eq!(standard_column_name("Pathology REDCap ID"), "redcap_id");
        assert_eq!(standard_column_name("Name"), "filename");
        assert_eq!(standard_column_name("Stain"), "Stain");
    }

    #[test]
    fn test_load_and_build_slide_table() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("halo_link_luth_export.csv"),
            "Slide ID,Name,Pathology REDCap ID\n1,L-1.svs,P1\n2,L-2.svs,\n3,,P3\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("halo_link_uith_export.csv"),
            "Slide ID,Name,Pathology REDCap ID\n9,U-9.svs,P9\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.csv"), "a,b\n1,2\n").unwrap();

        let inventory = HaloInventory::load(dir.path()).unwrap();
        assert_eq!(inventory.exports.len(), 2);
        assert_eq!(inventory.row_count(), 4);

        let slides = inventory.build_slide_table();
        assert_eq!(slides.len(), 2);
        assert_eq!(slides.records[0].patient_id, "P1");
        assert_eq!(slides.records[0].site.as_deref(), Some("luth"));
        assert_eq!(slides.records[1].filename, "U-9.svs");
        assert_eq!(slides.records[1].site.as_deref(), Some("uith"));
    }

    #[test]
    fn test_fallback_columns() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("halo_link_oau_export.csv"),
            "REDCap Record ID,File Path\nP1,a.svs\n",
        )
        .unwrap();

        let slides = HaloInventory::load(dir.path()).unwrap().build_slide_table();
        assert_eq!(slides.len(), 1);
        assert_eq!(slides.records[0].patient_id, "P1");
        assert_eq!(slides.records[0].filename, "a.svs");
    }

    #[test]
    fn test_no_usable_columns_yields_empty_table() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("halo_link_x_export.csv"), "Stain\nHE\n").unwrap();
        let slides = HaloInventory::load(dir.path()).unwrap().build_slide_table();
        assert!(slides.is_empty());
    }

    #[test]
    fn test_missing_data_dir_is_empty_inventory() {
        let dir = TempDir::new().unwrap();
        let inventory = HaloInventory::load(&dir.path().join("absent")).unwrap();
        assert!(inventory.exports.is_empty());
        assert!(inventory.build_slide_table().is_empty());
    }

    #[test]
    fn test_malformed_export_aborts() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("halo_link_bad_export.csv"),
            "Name,Pathology REDCap ID\na.svs,P1,extra\n",
        )
        .unwrap();
        assert!(HaloInventory::load(dir.path()).is_err());
    }
}
