//! Table reconciler
//!
//! Makes a clinical table and a slide table mutually consistent by removing
//! rows in a fixed sequence of named stages:
//!
//! 1. `missing_status`: patients without MSI status
//! 2. `orphan_slide`: slides whose patient did not survive stage 1
//! 3. `no_slides`: patients with no slide left after stage 2
//!
//! Each stage only sees the output of the previous one, so the order is part
//! of the contract. Rows are never modified, only removed.

use argo_common::tables::StatusShare;
use argo_common::{ClinicalTable, SlideTable};
use std::collections::HashSet;
use tracing::info;

/// Which table a stage removes rows from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Patients,
    Slides,
}

/// One reconciliation filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStage {
    DropMissingStatus,
    DropOrphanSlides,
    DropPatientsWithoutSlides,
}

impl ReconcileStage {
    /// Execution order
    pub const ORDER: [ReconcileStage; 3] = [
        ReconcileStage::DropMissingStatus,
        ReconcileStage::DropOrphanSlides,
        ReconcileStage::DropPatientsWithoutSlides,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReconcileStage::DropMissingStatus => "missing_status",
            ReconcileStage::DropOrphanSlides => "orphan_slide",
            ReconcileStage::DropPatientsWithoutSlides => "no_slides",
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ReconcileStage::DropMissingStatus => "patients with missing MSI status",
            ReconcileStage::DropOrphanSlides => "slides for patients without MSI status",
            ReconcileStage::DropPatientsWithoutSlides => "patients without slides",
        }
    }

    pub fn table(&self) -> TableKind {
        match self {
            ReconcileStage::DropOrphanSlides => TableKind::Slides,
            _ => TableKind::Patients,
        }
    }

    /// Apply this stage in place, returning the number of rows removed
    pub fn apply(&self, clinical: &mut ClinicalTable, slides: &mut SlideTable) -> usize {
        match self {
            ReconcileStage::DropMissingStatus => {
                let before = clinical.records.len();
                clinical.records.retain(|r| r.msi_status.is_some());
                before - clinical.records.len()
            }
            ReconcileStage::DropOrphanSlides => {
                let valid: HashSet<String> = clinical
                    .records
                    .iter()
                    .map(|r| r.patient_id.clone())
                    .collect();
                let before = slides.records.len();
                slides.records.retain(|s| valid.contains(&s.patient_id));
                before - slides.records.len()
            }
            ReconcileStage::DropPatientsWithoutSlides => {
                let with_slides: HashSet<String> = slides
                    .records
                    .iter()
                    .map(|s| s.patient_id.clone())
                    .collect();
                let before = clinical.records.len();
                clinical
                    .records
                    .retain(|r| with_slides.contains(&r.patient_id));
                before - clinical.records.len()
            }
        }
    }
}

/// Rows removed by one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: ReconcileStage,
    pub removed: usize,
    /// Rows left in the stage's table afterwards
    pub remaining: usize,
}

/// Removal audit of one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileAudit {
    pub initial_patients: usize,
    pub initial_slides: usize,
    pub stages: Vec<StageOutcome>,
    pub final_patients: usize,
    pub final_slides: usize,
    /// Status distribution of the surviving patients; empty when none survive
    pub distribution: Vec<StatusShare>,
}

impl ReconcileAudit {
    pub fn removed(&self, stage: ReconcileStage) -> usize {
        self.stages
            .iter()
            .filter(|outcome| outcome.stage == stage)
            .map(|outcome| outcome.removed)
            .sum()
    }

    pub fn patients_missing_status(&self) -> usize {
        self.removed(ReconcileStage::DropMissingStatus)
    }

    pub fn orphan_slides(&self) -> usize {
        self.removed(ReconcileStage::DropOrphanSlides)
    }

    pub fn patients_without_slides(&self) -> usize {
        self.removed(ReconcileStage::DropPatientsWithoutSlides)
    }

    pub fn total_removed(&self) -> usize {
        self.stages.iter().map(|outcome| outcome.removed).sum()
    }

    pub fn log_summary(&self) {
        info!(
            "Initial counts: {} patients, {} slides",
            self.initial_patients, self.initial_slides
        );
        for outcome in self.stages.iter().filter(|o| o.removed > 0) {
            info!(
                stage = outcome.stage.name(),
                "Removed {} {}",
                outcome.removed,
                outcome.stage.reason()
            );
        }
        info!(
            "Final counts: {} patients, {} slides ({} rows removed)",
            self.final_patients,
            self.final_slides,
            self.total_removed()
        );
        for share in &self.distribution {
            info!(
                "  - {}: {} patients ({:.1}%)",
                share.status, share.count, share.percentage
            );
        }
    }
}

/// Reconciled tables and their audit
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub clinical: ClinicalTable,
    pub slides: SlideTable,
    pub audit: ReconcileAudit,
}

/// Run every stage in [`ReconcileStage::ORDER`] on copies of the inputs
pub fn reconcile(clinical: &ClinicalTable, slides: &SlideTable) -> Reconciled {
    let mut clinical = clinical.clone();
    let mut slides = slides.clone();
    let initial_patients = clinical.len();
    let initial_slides = slides.len();

    let stages = ReconcileStage::ORDER
        .iter()
        .map(|stage| {
            let removed = stage.apply(&mut clinical, &mut slides);
            let remaining = match stage.table() {
                TableKind::Patients => clinical.len(),
                TableKind::Slides => slides.len(),
            };
            StageOutcome {
                stage: *stage,
                removed,
                remaining,
            }
        })
        .collect();

    let distribution = if clinical.is_empty() {
        Vec::new()
    } else {
        clinical.status_distribution()
    };

    let audit = ReconcileAudit {
        initial_patients,
        initial_slides,
        stages,
        final_patients: clinical.len(),
        final_slides: slides.len(),
        distribution,
    };

    Reconciled {
        clinical,
        slides,
        audit,
    }
}
