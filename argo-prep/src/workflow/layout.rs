//! Output directory layout
//!
//! ```text
//! <tables_dir>/0/   reconciled tables and per-site splits
//! <tables_dir>/2/   training tables with feature paths
//! <charts_dir>/0/   cohort composition charts and side tables
//! <charts_dir>/2/   processing status charts and side tables
//! ```

use argo_common::config::PathsConfig;
use argo_common::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline stage owning an output directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `process`: ingestion and reconciliation
    Process,
    /// `evaluate`: feature extraction progress
    Evaluate,
}

impl Stage {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Stage::Process => "0",
            Stage::Evaluate => "2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    tables_dir: PathBuf,
    charts_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(tables_dir: impl Into<PathBuf>, charts_dir: impl Into<PathBuf>) -> Self {
        Self {
            tables_dir: tables_dir.into(),
            charts_dir: charts_dir.into(),
        }
    }

    pub fn from_config(paths: &PathsConfig) -> Self {
        Self::new(&paths.tables_dir, &paths.charts_dir)
    }

    /// Root of the table outputs; legacy cohort tables live here directly
    pub fn tables_root(&self) -> &Path {
        &self.tables_dir
    }

    pub fn tables(&self, stage: Stage) -> PathBuf {
        self.tables_dir.join(stage.dir_name())
    }

    pub fn charts(&self, stage: Stage) -> PathBuf {
        self.charts_dir.join(stage.dir_name())
    }

    /// Create the stage's table and chart directories
    pub fn prepare(&self, stage: Stage) -> Result<()> {
        fs::create_dir_all(self.tables(stage))?;
        fs::create_dir_all(self.charts(stage))?;
        Ok(())
    }
}
