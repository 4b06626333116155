//! Machine-readable record of a reconciliation run

use super::summary::StatusShareRow;
use crate::services::ReconcileAudit;
use argo_common::tables::write_atomic;
use argo_common::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Run timestamp (RFC 3339)
    pub timestamp: String,
    pub version: String,
    pub initial_patients: usize,
    pub initial_slides: usize,
    pub stages: Vec<StageRow>,
    pub final_patients: usize,
    pub final_slides: usize,
    pub distribution: Vec<DistributionRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageRow {
    pub stage: String,
    pub reason: String,
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionRow {
    pub status: String,
    pub count: usize,
    pub percentage: f64,
}

impl RunReport {
    pub fn from_audit(audit: &ReconcileAudit) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            initial_patients: audit.initial_patients,
            initial_slides: audit.initial_slides,
            stages: audit
                .stages
                .iter()
                .map(|outcome| StageRow {
                    stage: outcome.stage.name().to_string(),
                    reason: outcome.stage.reason().to_string(),
                    removed: outcome.removed,
                    remaining: outcome.remaining,
                })
                .collect(),
            final_patients: audit.final_patients,
            final_slides: audit.final_slides,
            distribution: audit
                .distribution
                .iter()
                .map(|share| {
                    let row = StatusShareRow::from(share);
                    DistributionRow {
                        status: row.status.to_string(),
                        count: row.count,
                        percentage: row.percentage,
                    }
                })
                .collect(),
        }
    }

    pub fn export_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| argo_common::Error::InvalidInput(e.to_string()))?;
        write_atomic(path, |w| {
            w.write_all(json.as_bytes())?;
            Ok(())
        })
    }
}
