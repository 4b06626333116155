//! REDCap credential resolution
//!
//! Priority: command line → environment → TOML config. Each value resolves
//! independently; a value set in more than one place is logged with a
//! warning naming every source.

use crate::services::redcap_client::RedcapCredentials;
use argo_common::config::RedcapConfig;
use argo_common::{Error, Result};
use tracing::{info, warn};

pub const API_URL_ENV: &str = "REDCAP_API_URL";
pub const API_TOKEN_ENV: &str = "REDCAP_API_TOKEN";

/// Where a setting was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingSource {
    CommandLine,
    Environment,
    TomlConfig,
}

impl SettingSource {
    pub fn describe(&self) -> &'static str {
        match self {
            SettingSource::CommandLine => "command line",
            SettingSource::Environment => "environment variable",
            SettingSource::TomlConfig => "TOML config",
        }
    }
}

/// Resolve one setting from its three tiers
pub fn resolve_setting(
    name: &str,
    cli: Option<&str>,
    env_var: &str,
    toml: Option<&str>,
) -> Option<(String, SettingSource)> {
    let env_value = std::env::var(env_var).ok();
    let tiers = [
        (cli, SettingSource::CommandLine),
        (env_value.as_deref(), SettingSource::Environment),
        (toml, SettingSource::TomlConfig),
    ];

    let present: Vec<(&str, SettingSource)> = tiers
        .iter()
        .filter_map(|(value, source)| {
            value
                .filter(|v| is_valid_value(v))
                .map(|v| (v.trim(), *source))
        })
        .collect();

    if present.len() > 1 {
        let sources: Vec<&str> = present.iter().map(|(_, s)| s.describe()).collect();
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            name,
            sources.join(", "),
            present[0].1.describe()
        );
    }

    present.first().map(|(value, source)| {
        info!("{} loaded from {}", name, source.describe());
        (value.to_string(), *source)
    })
}

/// REDCap endpoint and token, or a configuration error naming every place
/// they can be set
pub fn resolve_redcap_credentials(
    cli_url: Option<&str>,
    cli_token: Option<&str>,
    toml: &RedcapConfig,
) -> Result<RedcapCredentials> {
    let api_url = resolve_setting(
        "REDCap API URL",
        cli_url,
        API_URL_ENV,
        toml.api_url.as_deref(),
    );
    let api_token = resolve_setting(
        "REDCap API token",
        cli_token,
        API_TOKEN_ENV,
        toml.api_token.as_deref(),
    );

    match (api_url, api_token) {
        (Some((api_url, _)), Some((api_token, _))) => Ok(RedcapCredentials { api_url, api_token }),
        (url, _) => {
            let missing = if url.is_none() { "API URL" } else { "API token" };
            Err(Error::Config(format!(
                "REDCap {} not configured. Set it using one of:\n\
                 1. Command line: --redcap-url / --redcap-token\n\
                 2. Environment: {} / {}\n\
                 3. TOML config: [redcap] api_url / api_token",
                missing, API_URL_ENV, API_TOKEN_ENV
            )))
        }
    }
}

/// Non-empty, non-whitespace
pub fn is_valid_value(value: &str) -> bool {
    !value.trim().is_empty()
}
