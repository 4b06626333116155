//! Pipeline services
//!
//! Leaves first: record sources (REDCap, Halo Link), per-record lookups
//! (slides on disk, feature artifacts), then table-level steps
//! (reconciliation, site partitioning, validation).

pub mod clinical_extractor;
pub mod cohort_export;
pub mod feature_locator;
pub mod halo_inventory;
pub mod processing_validator;
pub mod reconciler;
pub mod redcap_client;
pub mod site_partitioner;
pub mod slide_locator;

pub use clinical_extractor::{ClinicalExtractor, Protocol};
pub use cohort_export::{Cohort, CohortExporter, Institution};
pub use feature_locator::{
    AnnotationSummary, ExtractorLayout, FeatureLayout, FeatureLocator, FeatureMatch,
};
pub use halo_inventory::{HaloExport, HaloInventory};
pub use processing_validator::{InstitutionReport, ProcessingValidator};
pub use reconciler::{reconcile, ReconcileAudit, ReconcileStage, Reconciled, StageOutcome};
pub use redcap_client::{RawRecord, RedcapClient, RedcapCredentials, RedcapError};
pub use site_partitioner::{partition_by_site, SitePartition, SitePartitions};
pub use slide_locator::{SlideIndex, SlideScanner, VerificationSummary};
