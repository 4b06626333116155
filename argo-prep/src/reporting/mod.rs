//! Cohort statistics, side tables and charts
//!
//! `summary` computes everything from table data alone; `charts` only draws.

pub mod charts;
pub mod run_report;
pub mod summary;

pub use charts::{ChartError, CountKind};
pub use run_report::RunReport;
pub use summary::{merge_status, MergedSlide};
