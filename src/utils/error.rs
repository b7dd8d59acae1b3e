//! Error types for the hotsift crawler
//!
//! These are produced where the failure originates (HTTP client, DOM/JSON
//! parsing, orchestrator) so that callers can classify them by variant
//! instead of by message text.

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error not covered by a more specific variant
    #[error("HTTP request failed: {0}")]
    Http(#[source] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Connection refused, DNS failure, TLS handshake failure
    #[error("Connection failed: {0}")]
    Connection(String),

    /// Non-2xx response status
    #[error("HTTP status {0}")]
    Status(u16),

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Proxy could not be configured or reached
    #[error("Proxy error: {0}")]
    Proxy(String),
}

impl FetchError {
    /// Classify a reqwest error at the point it is produced
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connection(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() || err.is_body() {
            Self::Decode(err.to_string())
        } else if err.is_builder() {
            Self::InvalidUrl(err.to_string())
        } else {
            Self::Http(err)
        }
    }

    /// Whether a retry has a reasonable chance of succeeding
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) | Self::Http(_) | Self::Proxy(_) => true,
            Self::Status(code) => matches!(code, 408 | 429 | 500 | 502 | 503 | 504),
            Self::Decode(_) | Self::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_reqwest(err)
    }
}

/// Errors that can occur during parsing operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// A configured CSS selector could not be parsed
    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),

    /// A configured field regex could not be compiled
    #[error("Invalid regex: {0}")]
    InvalidRegex(String),

    /// Response body was not usable HTML
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Response body was not the expected JSON shape
    #[error("JSON parse error: {0}")]
    Json(String),
}

/// General crawler errors
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Source produced no items
    #[error("No items found")]
    NoItems,

    /// Source definition is unusable
    #[error("Invalid source configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transience() {
        assert!(FetchError::Status(503).is_transient());
        assert!(FetchError::Status(429).is_transient());
        assert!(!FetchError::Status(404).is_transient());
        assert!(!FetchError::Status(403).is_transient());
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(FetchError::Timeout.is_transient());
        assert!(!FetchError::InvalidUrl("x".into()).is_transient());
    }

    #[test]
    fn test_crawler_error_wraps_fetch() {
        let err: CrawlerError = FetchError::Timeout.into();
        assert!(matches!(err, CrawlerError::Fetch(FetchError::Timeout)));
        assert_eq!(err.to_string(), "Fetch error: Request timeout");
    }
}
