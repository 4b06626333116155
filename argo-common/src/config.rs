//! Configuration loading
//!
//! Settings are layered, highest priority first:
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! This module owns tier 3 and 4: [`TomlConfig`] deserializes with defaults
//! for every key, so a partial or missing file still yields a full config.

use crate::vocabulary::{LabelSet, StatusVocabulary};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "ARGO_CONFIG";

/// Complete configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub redcap: RedcapConfig,
    pub paths: PathsConfig,
    pub features: FeaturesConfig,
    pub clinical: ClinicalConfig,
    pub relabel: RelabelConfig,
    pub validate: ValidateConfig,
    pub logging: LoggingConfig,
}

/// REDCap API access
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedcapConfig {
    pub api_url: Option<String>,
    pub api_token: Option<String>,
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directory holding the `halo_link_*.csv` exports
    pub data_dir: PathBuf,
    /// Root of the staged table outputs (`<tables_dir>/0`, `<tables_dir>/2`)
    pub tables_dir: PathBuf,
    /// Root of the chart and side-table outputs
    pub charts_dir: PathBuf,
    /// Root of the feature cache; `data_dir` when unset
    pub features_base_dir: Option<PathBuf>,
    /// Directories searched recursively for raw slide files
    pub slide_dirs: Vec<PathBuf>,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tables_dir: PathBuf::from("tables"),
            charts_dir: PathBuf::from("visualizations"),
            features_base_dir: None,
            slide_dirs: vec![PathBuf::from("data"), PathBuf::from("slides")],
        }
    }
}

impl PathsConfig {
    pub fn features_base_dir(&self) -> &Path {
        self.features_base_dir.as_deref().unwrap_or(&self.data_dir)
    }
}

/// Feature cache layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    /// Sub-directory name fragments identifying a feature extractor's output
    pub extractors: Vec<String>,
    /// Artifact file extension, without the dot
    pub extension: String,
    /// Only consider directories of this extractor
    pub preferred_extractor: Option<String>,
}

impl Default for FeaturesConfig {
    fn default() -> Self {
        Self {
            extractors: vec!["ctranspath".to_string(), "xiyuewang".to_string()],
            extension: "h5".to_string(),
            preferred_extractor: None,
        }
    }
}

/// Clinical extraction settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalConfig {
    /// Built-in vocabulary version
    pub vocabulary: String,
    /// Custom vocabulary file; takes precedence over `vocabulary`
    pub vocabulary_file: Option<PathBuf>,
}

impl Default for ClinicalConfig {
    fn default() -> Self {
        Self {
            vocabulary: StatusVocabulary::DEFAULT_VERSION.to_string(),
            vocabulary_file: None,
        }
    }
}

impl ClinicalConfig {
    pub fn resolve_vocabulary(&self) -> Result<StatusVocabulary> {
        if let Some(path) = &self.vocabulary_file {
            let vocabulary = StatusVocabulary::load(path)?;
            info!(
                "Status vocabulary '{}' loaded from {}",
                vocabulary.version,
                path.display()
            );
            return Ok(vocabulary);
        }
        StatusVocabulary::builtin(&self.vocabulary).ok_or_else(|| {
            Error::Config(format!(
                "unknown status vocabulary '{}' (built-in: v1, v2)",
                self.vocabulary
            ))
        })
    }
}

/// Labels for the downstream training tool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelabelConfig {
    pub msi_high: String,
    pub stable: String,
    /// Default output is `<input stem>_<output_suffix>.csv`
    pub output_suffix: String,
}

impl Default for RelabelConfig {
    fn default() -> Self {
        let labels = LabelSet::binary_target();
        Self {
            msi_high: labels.msi_high,
            stable: labels.stable,
            output_suffix: "histobistro".to_string(),
        }
    }
}

impl RelabelConfig {
    pub fn label_set(&self) -> LabelSet {
        LabelSet {
            msi_high: self.msi_high.clone(),
            stable: self.stable.clone(),
        }
    }
}

/// Per-institution processing checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidateConfig {
    pub prospective_sites: Vec<String>,
    pub retrospective_cohorts: Vec<String>,
    /// Name of the processed-output directory under `<inst>/processed/`
    pub processed_dir: String,
    /// Extractor log under `<inst>/cache/`
    pub log_file: String,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            prospective_sites: ["oauthc", "luth", "uith", "lasuth"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            retrospective_cohorts: vec!["msk".to_string(), "oau".to_string()],
            processed_dir: "STAMP_macenko_xiyuewang-ctranspath-7c998680".to_string(),
            log_file: "stamp.log".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("parse {} failed: {}", path.display(), e)))
    }

    /// Resolve and load the config file, returning where it came from.
    ///
    /// An explicitly named file (argument or `ARGO_CONFIG`) must exist. When
    /// nothing is named, the per-user default location is used if present,
    /// otherwise compiled defaults. Nothing is logged here; see
    /// [`ConfigSource::log`].
    pub fn resolve(cli_path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let path = explicit_config_path(cli_path)
            .or_else(|| default_config_path().filter(|p| p.exists()));
        match path {
            Some(path) => Ok((Self::load(&path)?, ConfigSource::File(path))),
            None => Ok((Self::default(), ConfigSource::Defaults)),
        }
    }
}

/// Where the active configuration was loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!("Loaded configuration from {}", path.display()),
            ConfigSource::Defaults => info!("No configuration file found, using defaults"),
        }
    }
}

/// Explicitly requested config file: argument, then environment
pub fn explicit_config_path(cli_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_path {
        return Some(path.to_path_buf());
    }
    std::env::var(CONFIG_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Per-user config location, e.g. `~/.config/argo-prep/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("argo-prep").join("config.toml"))
}
