//! # ARGO Common Library
//!
//! Shared code for the ARGO-DeepMSI data preparation tools including:
//! - Patient and slide record models
//! - Clinical/slide CSV table I/O
//! - MSI status vocabularies and output label sets
//! - Configuration loading

pub mod config;
pub mod error;
pub mod model;
pub mod tables;
pub mod vocabulary;

pub use error::{Error, Result};
pub use model::{MsiStatus, PatientRecord, SlideRecord};
pub use tables::{ClinicalTable, SlideTable};
pub use vocabulary::{LabelSet, StatusVocabulary};
