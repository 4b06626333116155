//! REDCap API client
//!
//! Exports every survey record as flat JSON, raw codes, with data access
//! groups. Each record becomes a field → value map where empty strings are
//! missing values.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

const USER_AGENT: &str = concat!("argo-prep/", env!("CARGO_PKG_VERSION"));

/// One exported survey record
pub type RawRecord = BTreeMap<String, Option<String>>;

/// REDCap client errors
#[derive(Debug, Error)]
pub enum RedcapError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Error accessing REDCap API ({0}): {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// API endpoint and project token
#[derive(Clone)]
pub struct RedcapCredentials {
    pub api_url: String,
    pub api_token: String,
}

impl fmt::Debug for RedcapCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedcapCredentials")
            .field("api_url", &self.api_url)
            .field("api_token", &"<redacted>")
            .finish()
    }
}

/// REDCap record export client
pub struct RedcapClient {
    http_client: reqwest::Client,
    credentials: RedcapCredentials,
}

impl RedcapClient {
    pub fn new(credentials: RedcapCredentials) -> Result<Self, RedcapError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RedcapError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            credentials,
        })
    }

    /// Export all records of the project
    pub async fn export_records(&self) -> Result<Vec<RawRecord>, RedcapError> {
        tracing::debug!(url = %self.credentials.api_url, "Requesting REDCap record export");

        let response = self
            .http_client
            .post(&self.credentials.api_url)
            .form(&export_payload(&self.credentials.api_token))
            .send()
            .await
            .map_err(|e| RedcapError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RedcapError::ApiError(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| RedcapError::NetworkError(e.to_string()))?;
        let records = parse_records(&body)?;

        tracing::info!(records = records.len(), "Fetched records from REDCap");
        Ok(records)
    }
}

/// Form fields of a flat raw record export
pub fn export_payload(token: &str) -> [(&'static str, &str); 7] {
    [
        ("token", token),
        ("content", "record"),
        ("format", "json"),
        ("type", "flat"),
        ("rawOrLabel", "raw"),
        ("rawOrLabelHeaders", "raw"),
        ("exportDataAccessGroups", "true"),
    ]
}

/// Parse a record export body (a JSON array of flat objects)
pub fn parse_records(json: &str) -> Result<Vec<RawRecord>, RedcapError> {
    let value: Value =
        serde_json::from_str(json).map_err(|e| RedcapError::ParseError(e.to_string()))?;

    let Value::Array(items) = value else {
        return Err(RedcapError::ParseError(
            "expected a JSON array of records".to_string(),
        ));
    };

    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(fields) => Ok(fields
                .into_iter()
                .map(|(name, value)| (name, field_value(value)))
                .collect()),
            other => Err(RedcapError::ParseError(format!(
                "record {} is not an object: {}",
                i, other
            ))),
        })
        .collect()
}

/// Read a previously saved record export
pub fn load_records(path: &Path) -> Result<Vec<RawRecord>, RedcapError> {
    let body = std::fs::read_to_string(path)?;
    let records = parse_records(&body)?;
    tracing::info!(
        records = records.len(),
        path = %path.display(),
        "Loaded REDCap records from file"
    );
    Ok(records)
}

fn field_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_maps_empty_strings_to_none() {
        let json = r#"[
            {"record_id": "17", "batch_number": "1", "msi_status_mmr": ""},
            {"record_id": "18", "batch_number": "3", "cmo_msi_status": "Stable"}
        ]"#;
        let records = parse_records(json).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["record_id"], Some("17".to_string()));
        assert_eq!(records[0]["msi_status_mmr"], None);
        assert_eq!(records[1]["cmo_msi_status"], Some("Stable".to_string()));
    }

    #[test]
    fn test_parse_records_stringifies_non_string_values() {
        let records = parse_records(r#"[{"record_id": 5, "flag": null}]"#).unwrap();
        assert_eq!(records[0]["record_id"], Some("5".to_string()));
        assert_eq!(records[0]["flag"], None);
    }

    #[test]
    fn test_parse_records_rejects_error_object() {
        let err = parse_records(r#"{"error": "You do not have permissions"}"#).unwrap_err();
        assert!(matches!(err, RedcapError::ParseError(_)));
    }

    #[test]
    fn test_export_payload_requests_flat_raw_json() {
        let payload = export_payload("secret");
        assert!(payload.contains(&("token", "secret")));
        assert!(payload.contains(&("format", "json")));
        assert!(payload.contains(&("exportDataAccessGroups", "true")));
    }

    #[test]
    fn test_credentials_debug_redacts_token() {
        let credentials = RedcapCredentials {
            api_url: "https://redcap.example.org/api/".to_string(),
            api_token: "ABC123".to_string(),
        };
        let text = format!("{:?}", credentials);
        assert!(!text.contains("ABC123"));
        assert!(text.contains("redcap.example.org"));
    }

    #[test]
    fn test_client_creation() {
        let client = RedcapClient::new(RedcapCredentials {
            api_url: "http://localhost:9/api/".to_string(),
            api_token: "t".to_string(),
        });
        assert!(client.is_ok());
    }
}
