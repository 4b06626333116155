//! Per-site table partitions
//!
//! A patient with slides at several sites appears in each of those sites'
//! clinical tables.

use argo_common::{ClinicalTable, SlideTable};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

/// Clinical/slide pair of one site
#[derive(Debug, Clone, PartialEq)]
pub struct SitePartition {
    pub site: String,
    pub clinical: ClinicalTable,
    pub slides: SlideTable,
}

impl SitePartition {
    /// Write `<site>_clinical_table.csv` and `<site>_slide_table.csv`
    pub fn write(&self, dir: &Path) -> argo_common::Result<()> {
        self.clinical
            .write_csv(&dir.join(format!("{}_clinical_table.csv", self.site)))?;
        self.slides
            .write_csv(&dir.join(format!("{}_slide_table.csv", self.site)))?;
        info!(
            site = %self.site,
            patients = self.clinical.len(),
            slides = self.slides.len(),
            "Saved site tables"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SitePartitions {
    /// One partition per site, in order of first appearance in the slide table
    pub partitions: Vec<SitePartition>,
    /// Slides with no site; part of no partition
    pub unsited: SlideTable,
}

impl SitePartitions {
    pub fn sites(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.site.as_str()).collect()
    }

    pub fn get(&self, site: &str) -> Option<&SitePartition> {
        self.partitions.iter().find(|p| p.site == site)
    }

    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }
}

/// Split reconciled tables by the slides' site
pub fn partition_by_site(clinical: &ClinicalTable, slides: &SlideTable) -> SitePartitions {
    let sites: Vec<String> = slides.sites().into_iter().map(str::to_string).collect();
    info!("Found {} unique sites: {}", sites.len(), sites.join(", "));

    let partitions = sites
        .into_iter()
        .map(|site| {
            let site_slides = slides.filtered(|s| s.site.as_deref() == Some(site.as_str()));
            let site_patients: HashSet<&str> = site_slides
                .records
                .iter()
                .map(|s| s.patient_id.as_str())
                .collect();
            let site_clinical =
                clinical.filtered(|r| site_patients.contains(r.patient_id.as_str()));

            info!(
                site = %site,
                patients = site_clinical.len(),
                slides = site_slides.len(),
                "Site partition"
            );
            for share in site_clinical.status_distribution() {
                info!(
                    "  - {}: {} patients ({:.1}%)",
                    share.status, share.count, share.percentage
                );
            }

            SitePartition {
                site,
                clinical: site_clinical,
                slides: site_slides,
            }
        })
        .collect();

    let unsited = slides.filtered(|s| s.site.is_none());
    if !unsited.is_empty() {
        warn!(
            slides = unsited.len(),
            "Slides without a site are not part of any site partition"
        );
    }

    SitePartitions {
        partitions,
        unsited,
    }
}
