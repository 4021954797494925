//! Timetable search HTTP client.
//!
//! Sends one authenticated GET per call and decodes the body as untyped JSON.
//! Interpretation of the document is left to the store.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::coordinator::TimetableSource;

use super::error::FetchError;
use super::query::QueryParameters;

/// Default base URL for the Yandex Raspisanie search API.
pub const DEFAULT_BASE_URL: &str = "https://api.rasp.yandex-net.ru/v3.0/search/";

/// How much of an undecodable body to keep for diagnostics.
const BODY_PREVIEW_CHARS: usize = 500;

/// Configuration for the search client.
#[derive(Debug, Clone)]
pub struct RaspConfig {
    /// API key, sent verbatim in the `Authorization` header
    pub api_key: String,
    /// Base URL for the API (defaults to production)
    pub base_url: String,
    /// Transport-level timeout in seconds
    pub timeout_secs: u64,
}

impl RaspConfig {
    /// Create a new config with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set a custom base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the transport timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Client for the timetable search endpoint.
#[derive(Debug, Clone)]
pub struct RaspClient {
    http: reqwest::Client,
    base_url: String,
}

impl RaspClient {
    /// Create a new client with the given configuration.
    pub fn new(config: RaspConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();

        let mut api_key =
            HeaderValue::from_str(&config.api_key).map_err(|_| FetchError::InvalidCredential)?;
        api_key.set_sensitive(true);
        headers.insert(AUTHORIZATION, api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Run one search and return the decoded document.
    pub async fn search(&self, query: &QueryParameters) -> Result<Value, FetchError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&query.to_query_pairs())
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_status(status.as_u16(), body));
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "received timetable response");

        decode_body(&body)
    }
}

impl TimetableSource for RaspClient {
    async fn fetch(&self, query: &QueryParameters) -> Result<Value, FetchError> {
        self.search(query).await
    }
}

/// Decode a response body, treating blank and `null` bodies as empty.
pub fn decode_body(body: &str) -> Result<Value, FetchError> {
    if body.trim().is_empty() {
        return Err(FetchError::EmptyBody);
    }

    let value: Value = serde_json::from_str(body).map_err(|e| FetchError::Json {
        message: e.to_string(),
        body: Some(body.chars().take(BODY_PREVIEW_CHARS).collect()),
    })?;

    if value.is_null() {
        return Err(FetchError::EmptyBody);
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_builder() {
        let config = RaspConfig::new("test-key")
            .with_base_url("http://localhost:8080/search/")
            .with_timeout(60);

        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.base_url, "http://localhost:8080/search/");
        assert_eq!(config.timeout_secs, 60);
    }

    #[test]
    fn config_defaults() {
        let config = RaspConfig::new("test-key");

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout_secs, 30);
    }

    #[test]
    fn client_creation() {
        let client = RaspClient::new(RaspConfig::new("test-key")).unwrap();
        assert_eq!(client.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn rejects_unsendable_credential() {
        let result = RaspClient::new(RaspConfig::new("bad\nkey"));
        assert!(matches!(result, Err(FetchError::InvalidCredential)));
    }

    #[test]
    fn decode_valid_body() {
        let value = decode_body(r#"{"segments": []}"#).unwrap();
        assert_eq!(value, json!({"segments": []}));
    }

    #[test]
    fn decode_empty_body() {
        assert!(matches!(decode_body(""), Err(FetchError::EmptyBody)));
        assert!(matches!(decode_body("  \n"), Err(FetchError::EmptyBody)));
        assert!(matches!(decode_body("null"), Err(FetchError::EmptyBody)));
    }

    #[test]
    fn decode_malformed_body_keeps_preview() {
        let body = "<html>".repeat(200);
        match decode_body(&body) {
            Err(FetchError::Json { body: Some(preview), .. }) => {
                assert_eq!(preview.chars().count(), BODY_PREVIEW_CHARS);
            }
            other => panic!("expected JSON error, got {other:?}"),
        }
    }

    // Requests against the live endpoint need a real API key; exercise the
    // HTTP path through the coordinator with the mock source instead.
}
