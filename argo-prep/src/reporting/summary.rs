//! Summary statistics
//!
//! Read-only aggregations over a clinical/slide pair. Slides are joined to
//! their patient's status; slides without a site or whose patient has no
//! status are not counted.

use argo_common::tables::{percentage, write_atomic, StatusShare};
use argo_common::{ClinicalTable, MsiStatus, Result, SlideTable};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// One slide joined with its patient's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSlide {
    pub patient_id: String,
    pub site: String,
    pub filename: String,
    pub status: MsiStatus,
    pub processed: bool,
}

/// Inner join of slides and patients on the patient id
pub fn merge_status(clinical: &ClinicalTable, slides: &SlideTable) -> Vec<MergedSlide> {
    let mut statuses: HashMap<&str, MsiStatus> = HashMap::new();
    for record in &clinical.records {
        if let Some(status) = record.msi_status {
            statuses.entry(record.patient_id.as_str()).or_insert(status);
        }
    }

    slides
        .records
        .iter()
        .filter_map(|slide| {
            let status = *statuses.get(slide.patient_id.as_str())?;
            let site = slide.site.clone()?;
            Some(MergedSlide {
                patient_id: slide.patient_id.clone(),
                site,
                filename: slide.filename.clone(),
                status,
                processed: slide.feature_path.is_some(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Stage 0: cohort composition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteStatusCount {
    pub site: String,
    pub status: MsiStatus,
    pub patients: usize,
    pub slides: usize,
}

/// Unique patients and slides per (site, status), sorted by site then status
pub fn site_status_counts(merged: &[MergedSlide]) -> Vec<SiteStatusCount> {
    let mut groups: BTreeMap<(&str, MsiStatus), (BTreeSet<&str>, usize)> = BTreeMap::new();
    for slide in merged {
        let entry = groups
            .entry((slide.site.as_str(), slide.status))
            .or_default();
        entry.0.insert(slide.patient_id.as_str());
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|((site, status), (patients, slides))| SiteStatusCount {
            site: site.to_string(),
            status,
            patients: patients.len(),
            slides,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientSlideCount {
    pub patient_id: String,
    pub status: MsiStatus,
    pub slides: usize,
}

/// Slides per patient, sorted by patient id
pub fn slides_per_patient(merged: &[MergedSlide]) -> Vec<PatientSlideCount> {
    let mut counts: BTreeMap<(&str, MsiStatus), usize> = BTreeMap::new();
    for slide in merged {
        *counts
            .entry((slide.patient_id.as_str(), slide.status))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((patient_id, status), slides)| PatientSlideCount {
            patient_id: patient_id.to_string(),
            status,
            slides,
        })
        .collect()
}

/// Five-number summary with Tukey whiskers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub n: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    /// Smallest value within 1.5 IQR of `q1`
    pub lower_whisker: f64,
    /// Largest value within 1.5 IQR of `q3`
    pub upper_whisker: f64,
}

impl BoxStats {
    /// `None` for an empty sample
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile(&sorted, 0.25);
        let median = quantile(&sorted, 0.5);
        let q3 = quantile(&sorted, 0.75);
        let reach = 1.5 * (q3 - q1);
        let lower_whisker = sorted
            .iter()
            .copied()
            .find(|v| *v >= q1 - reach)
            .unwrap_or(q1);
        let upper_whisker = sorted
            .iter()
            .rev()
            .copied()
            .find(|v| *v <= q3 + reach)
            .unwrap_or(q3);

        Some(Self {
            n: sorted.len(),
            q1,
            median,
            q3,
            lower_whisker,
            upper_whisker,
        })
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower_whisker || value > self.upper_whisker
    }
}

/// Linear-interpolated quantile of sorted values
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let fraction = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusShareRow {
    pub status: MsiStatus,
    pub count: usize,
    pub percentage: f64,
}

impl From<&StatusShare> for StatusShareRow {
    fn from(share: &StatusShare) -> Self {
        Self {
            status: share.status,
            count: share.count,
            percentage: round1(share.percentage),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 2: feature extraction progress
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteProcessing {
    pub site: String,
    pub total: usize,
    pub processed: usize,
    pub percentage: f64,
}

/// Slides and processed slides per site, most slides first
pub fn site_processing(merged: &[MergedSlide]) -> Vec<SiteProcessing> {
    let mut groups: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for slide in merged {
        let entry = groups.entry(slide.site.as_str()).or_default();
        entry.0 += 1;
        entry.1 += usize::from(slide.processed);
    }

    let mut rows: Vec<SiteProcessing> = groups
        .into_iter()
        .map(|(site, (total, processed))| SiteProcessing {
            site: site.to_string(),
            total,
            processed,
            percentage: round1(percentage(processed, total)),
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

/// Processing counts of one (site, status) cell
#[derive(Debug, Clone, PartialEq)]
pub struct SiteStatusProcessing {
    pub site: String,
    pub status: MsiStatus,
    pub slides: usize,
    pub processed_slides: usize,
    pub patients: usize,
    pub processed_patients: usize,
}

impl SiteStatusProcessing {
    pub fn slide_percentage(&self) -> f64 {
        percentage(self.processed_slides, self.slides)
    }

    pub fn patient_percentage(&self) -> f64 {
        percentage(self.processed_patients, self.patients)
    }
}

/// Per (site, status) processing counts, sorted by site then status
pub fn site_status_processing(merged: &[MergedSlide]) -> Vec<SiteStatusProcessing> {
    #[derive(Default)]
    struct Cell<'a> {
        slides: usize,
        processed_slides: usize,
        patients: BTreeSet<&'a str>,
        processed_patients: BTreeSet<&'a str>,
    }

    let mut cells: BTreeMap<(&str, MsiStatus), Cell> = BTreeMap::new();
    for slide in merged {
        let cell = cells
            .entry((slide.site.as_str(), slide.status))
            .or_default();
        cell.slides += 1;
        cell.patients.insert(slide.patient_id.as_str());
        if slide.processed {
            cell.processed_slides += 1;
            cell.processed_patients.insert(slide.patient_id.as_str());
        }
    }

    cells
        .into_iter()
        .map(|((site, status), cell)| SiteStatusProcessing {
            site: site.to_string(),
            status,
            slides: cell.slides,
            processed_slides: cell.processed_slides,
            patients: cell.patients.len(),
            processed_patients: cell.processed_patients.len(),
        })
        .collect()
}

/// Sites with at least `min_slides` slides, highest MSI-H slide processing
/// percentage first
pub fn heatmap_sites(
    sites: &[SiteProcessing],
    cells: &[SiteStatusProcessing],
    min_slides: usize,
) -> Vec<String> {
    let msi_high_percentage = |site: &str| {
        cells
            .iter()
            .find(|c| c.site == site && c.status == MsiStatus::MsiHigh)
            .map_or(0.0, |c| c.slide_percentage())
    };

    let mut selected: Vec<(String, f64)> = sites
        .iter()
        .filter(|s| s.total >= min_slides)
        .map(|s| (s.site.clone(), msi_high_percentage(&s.site)))
        .collect();
    selected.sort_by(|a, b| b.1.total_cmp(&a.1));
    selected.into_iter().map(|(site, _)| site).collect()
}

/// Processing status of one patient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientProcessing {
    pub patient_id: String,
    pub status: MsiStatus,
    /// Site of the patient's first slide
    pub site: String,
    pub total_slides: usize,
    pub processed_slides: usize,
}

impl PatientProcessing {
    pub fn any_processed(&self) -> bool {
        self.processed_slides > 0
    }
}

/// Per-patient processing, sorted by patient id
pub fn patient_processing(merged: &[MergedSlide]) -> Vec<PatientProcessing> {
    let mut patients: BTreeMap<(&str, MsiStatus), PatientProcessing> = BTreeMap::new();
    for slide in merged {
        let entry = patients
            .entry((slide.patient_id.as_str(), slide.status))
            .or_insert_with(|| PatientProcessing {
                patient_id: slide.patient_id.clone(),
                status: slide.status,
                site: slide.site.clone(),
                total_slides: 0,
                processed_slides: 0,
            });
        entry.total_slides += 1;
        entry.processed_slides += usize::from(slide.processed);
    }
    patients.into_values().collect()
}

/// Patients with at least one processed slide, per status
#[derive(Debug, Clone, PartialEq)]
pub struct StatusProcessing {
    pub status: MsiStatus,
    pub patients: usize,
    pub with_processed: usize,
}

impl StatusProcessing {
    pub fn percentage(&self) -> f64 {
        percentage(self.with_processed, self.patients)
    }
}

pub fn status_processing(patients: &[PatientProcessing]) -> Vec<StatusProcessing> {
    MsiStatus::ALL
        .iter()
        .map(|&status| {
            let of_status = patients.iter().filter(|p| p.status == status);
            StatusProcessing {
                status,
                patients: of_status.clone().count(),
                with_processed: of_status.filter(|p| p.any_processed()).count(),
            }
        })
        .filter(|row| row.patients > 0)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingSlide {
    pub patient_id: String,
    pub site: String,
    pub filename: String,
    pub status: MsiStatus,
}

pub fn missing_slides(merged: &[MergedSlide]) -> Vec<MissingSlide> {
    merged
        .iter()
        .filter(|slide| !slide.processed)
        .map(|slide| MissingSlide {
            patient_id: slide.patient_id.clone(),
            site: slide.site.clone(),
            filename: slide.filename.clone(),
            status: slide.status,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingPatient {
    pub patient_id: String,
    pub status: MsiStatus,
    pub site: String,
    pub slides: usize,
}

/// Patients none of whose slides are processed
pub fn missing_patients(patients: &[PatientProcessing]) -> Vec<MissingPatient> {
    patients
        .iter()
        .filter(|p| !p.any_processed())
        .map(|p| MissingPatient {
            patient_id: p.patient_id.clone(),
            status: p.status,
            site: p.site.clone(),
            slides: p.total_slides,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingBySite {
    pub site: String,
    pub status: MsiStatus,
    pub count: usize,
}

pub fn missing_by_site(missing: &[MissingPatient]) -> Vec<MissingBySite> {
    let mut counts: BTreeMap<(&str, MsiStatus), usize> = BTreeMap::new();
    for patient in missing {
        *counts
            .entry((patient.site.as_str(), patient.status))
            .or_default() += 1;
    }
    counts
        .into_iter()
        .map(|((site, status), count)| MissingBySite {
            site: site.to_string(),
            status,
            count,
        })
        .collect()
}

/// Fixed-width console table of processed slides per site and status
pub fn format_processing_table(merged: &[MergedSlide]) -> String {
    let mut output = String::new();
    let rule = "-".repeat(72);

    output.push_str("\nProcessing Status Summary by Site:\n");
    output.push_str(&rule);
    output.push('\n');
    output.push_str(&format!(
        "{:<15} {:<20} {:<20} {:<15}\n",
        "Site", "MSI-H", "MSS", "Total"
    ));
    output.push_str(&rule);
    output.push('\n');

    let sites: BTreeSet<&str> = merged.iter().map(|s| s.site.as_str()).collect();
    for site in sites {
        let of_site: Vec<&MergedSlide> = merged.iter().filter(|s| s.site == site).collect();
        output.push_str(&format!(
            "{:<15} {:<20} {:<20} {:<15}\n",
            site,
            site_cell(&of_site, Some(MsiStatus::MsiHigh)),
            site_cell(&of_site, Some(MsiStatus::Stable)),
            site_cell(&of_site, None)
        ));
    }

    output.push_str(&rule);
    output.push('\n');
    let processed = merged.iter().filter(|s| s.processed).count();
    output.push_str(&format!(
        "Overall: {}\n",
        format_fraction(processed, merged.len())
    ));
    output.push_str(&rule);
    output.push('\n');
    output
}

fn site_cell(slides: &[&MergedSlide], status: Option<MsiStatus>) -> String {
    let selected = slides
        .iter()
        .filter(|s| status.map_or(true, |status| s.status == status));
    let total = selected.clone().count();
    let processed = selected.filter(|s| s.processed).count();
    format_fraction(processed, total)
}

/// `processed/total (pct%)`
pub fn format_fraction(processed: usize, total: usize) -> String {
    format!(
        "{}/{} ({:.1}%)",
        processed,
        total,
        percentage(processed, total)
    )
}

/// Write `header`, then one CSV record per row in field order.
///
/// The header is explicit so an empty table still gets one, and tuple rows
/// can be written.
pub fn write_rows<T: Serialize>(path: &Path, rows: &[T], header: &[&str]) -> Result<()> {
    write_atomic(path, |w| {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(w);
        writer.write_record(header)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
