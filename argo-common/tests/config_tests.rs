//! Configuration loading and resolution tests
//!
//! Tests that manipulate ARGO_CONFIG are marked with #[serial] so they never
//! run in parallel with each other.

use argo_common::config::{ConfigSource, TomlConfig, CONFIG_ENV_VAR};
use argo_common::{Error, StatusVocabulary};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_defaults_match_study_layout() {
    let config = TomlConfig::default();

    assert_eq!(config.paths.data_dir, PathBuf::from("data"));
    assert_eq!(config.paths.features_base_dir(), Path::new("data"));
    assert_eq!(config.features.extractors, vec!["ctranspath", "xiyuewang"]);
    assert_eq!(config.features.extension, "h5");
    assert_eq!(config.clinical.vocabulary, "v2");
    assert_eq!(config.relabel.msi_high, "MSIH");
    assert_eq!(config.relabel.stable, "nonMSIH");
    assert_eq!(config.relabel.output_suffix, "histobistro");
    assert_eq!(config.validate.prospective_sites.len(), 4);
    assert_eq!(config.logging.level, "info");
}

#[test]
fn test_partial_file_keeps_defaults_for_missing_keys() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
[paths]
features_base_dir = "/lab/features"

[features]
extractors = ["uni"]
"#,
    )
    .unwrap();

    let config = TomlConfig::load(&path).unwrap();
    assert_eq!(config.paths.features_base_dir(), Path::new("/lab/features"));
    assert_eq!(config.paths.tables_dir, PathBuf::from("tables"));
    assert_eq!(config.features.extractors, vec!["uni"]);
    assert_eq!(config.features.extension, "h5");
}

#[test]
fn test_malformed_file_is_configuration_error() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.toml");
    fs::write(&path, "[paths\ndata_dir = ").unwrap();

    let err = TomlConfig::load(&path).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.is_configuration());
}

#[test]
#[serial]
fn test_explicit_path_must_exist() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.toml");

    let err = TomlConfig::resolve(Some(&missing)).unwrap_err();
    assert!(matches!(err, Error::MissingInput(_)));
}

#[test]
#[serial]
fn test_env_var_names_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("env.toml");
    fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &path);
    let (config, source) = TomlConfig::resolve(None).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.logging.level, "debug");
    assert_eq!(source, ConfigSource::File(path));
}

#[test]
#[serial]
fn test_cli_path_beats_env_var() {
    let temp_dir = TempDir::new().unwrap();
    let env_path = temp_dir.path().join("env.toml");
    let cli_path = temp_dir.path().join("cli.toml");
    fs::write(&env_path, "[logging]\nlevel = \"debug\"\n").unwrap();
    fs::write(&cli_path, "[logging]\nlevel = \"warn\"\n").unwrap();

    env::set_var(CONFIG_ENV_VAR, &env_path);
    let (config, source) = TomlConfig::resolve(Some(&cli_path)).unwrap();
    env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(source, ConfigSource::File(cli_path));
    assert_eq!(config.logging.level, "warn");
}

#[test]
#[serial]
fn test_no_config_file_falls_back_to_defaults() {
    env::remove_var(CONFIG_ENV_VAR);
    let temp_dir = TempDir::new().unwrap();
    let saved = env::var_os("XDG_CONFIG_HOME");
    env::set_var("XDG_CONFIG_HOME", temp_dir.path());

    let result = TomlConfig::resolve(None);
    match saved {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    let (config, source) = result.unwrap();
    assert_eq!(source, ConfigSource::Defaults);
    assert_eq!(config, TomlConfig::default());
}

#[test]
fn test_vocabulary_resolution() {
    let mut config = TomlConfig::default();
    assert_eq!(
        config.clinical.resolve_vocabulary().unwrap(),
        StatusVocabulary::v2()
    );

    config.clinical.vocabulary = "v1".to_string();
    assert_eq!(
        config.clinical.resolve_vocabulary().unwrap(),
        StatusVocabulary::v1()
    );

    config.clinical.vocabulary = "v9".to_string();
    assert!(config.clinical.resolve_vocabulary().is_err());
}

#[test]
fn test_vocabulary_file_takes_precedence() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("vocab.toml");
    fs::write(
        &path,
        r#"
version = "custom"

[retrospective]
field = "msi"
codes = { "pos" = "MSI-H", "neg" = "MSS" }

[prospective]
field = "cmo_msi_status"
codes = { "Instable" = "MSI-H", "Stable" = "MSS" }
"#,
    )
    .unwrap();

    let mut config = TomlConfig::default();
    config.clinical.vocabulary_file = Some(path);
    let vocabulary = config.clinical.resolve_vocabulary().unwrap();
    assert_eq!(vocabulary.version, "custom");
    assert_eq!(vocabulary.retrospective.field, "msi");
}
