//! Timetable fetch error types.

use std::time::Duration;

/// Reasons a refresh produced no payload.
///
/// None of these are fatal to the monitor: the coordinator logs them and the
/// previously stored payload stays authoritative.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// HTTP request failed (connection error, TLS, body read, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The request did not complete within the refresh timeout
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Invalid API key or unauthorized
    #[error("unauthorized (check RASP_API_KEY)")]
    Unauthorized,

    /// Rate limited by the API
    #[error("rate limited by the timetable API")]
    RateLimited,

    /// API returned an error status code
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered 2xx with nothing in the body
    #[error("empty response body")]
    EmptyBody,

    /// JSON deserialization failed
    #[error("JSON parse error: {message}")]
    Json {
        message: String,
        body: Option<String>,
    },

    /// The credential cannot be sent as a header value
    #[error("invalid API key format")]
    InvalidCredential,
}

impl FetchError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            401 | 403 => FetchError::Unauthorized,
            429 => FetchError::RateLimited,
            _ => FetchError::Api { status, message },
        }
    }

    /// Whether the failure was the refresh timeout rather than an answer.
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Timeout(_) => true,
            FetchError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = FetchError::Api {
            status: 500,
            message: "Internal Server Error".into(),
        };
        assert_eq!(err.to_string(), "API error 500: Internal Server Error");

        let err = FetchError::Timeout(Duration::from_secs(15));
        assert_eq!(err.to_string(), "request timed out after 15s");

        let err = FetchError::Json {
            message: "expected value".into(),
            body: Some("<html>".into()),
        };
        assert!(err.to_string().contains("JSON parse error"));
        assert!(err.to_string().contains("expected value"));

        assert_eq!(FetchError::EmptyBody.to_string(), "empty response body");
    }

    #[test]
    fn status_classification() {
        assert!(matches!(
            FetchError::from_status(401, String::new()),
            FetchError::Unauthorized
        ));
        assert!(matches!(
            FetchError::from_status(403, String::new()),
            FetchError::Unauthorized
        ));
        assert!(matches!(
            FetchError::from_status(429, String::new()),
            FetchError::RateLimited
        ));
        assert!(matches!(
            FetchError::from_status(502, "bad gateway".into()),
            FetchError::Api { status: 502, .. }
        ));
    }

    #[test]
    fn timeout_detection() {
        assert!(FetchError::Timeout(Duration::from_secs(15)).is_timeout());
        assert!(!FetchError::EmptyBody.is_timeout());
        assert!(!FetchError::RateLimited.is_timeout());
    }
}
