//! Unified error handling for the hotsift crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`HotsiftErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for operator-facing reports
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! Categories only drive reporting. Retry decisions are made by the
//! orchestrator independently of the category.

use std::io;
use thiserror::Error;

pub use crate::utils::error::{CrawlerError, FetchError, ParseError};

/// Common trait for all hotsift error types
pub trait HotsiftErrorTrait: std::error::Error {
    /// Check if this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Human-readable description for operator-facing reports
    fn localized_desc(&self) -> String;

    /// Get the error category for reporting
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection refused, DNS, TLS, proxy
    Network,
    /// HTML / JSON parsing and data extraction errors
    Parse,
    /// Server answered with a non-2xx status
    HttpStatus,
    /// Request exceeded its time budget
    Timeout,
    /// Storage and I/O errors
    Storage,
    /// Configuration and validation errors
    Config,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    /// Operator-facing description of the category
    pub fn localized_desc(&self) -> &'static str {
        match self {
            Self::Network => "网络连接错误",
            Self::Parse => "数据解析错误",
            Self::HttpStatus => "HTTP状态错误",
            Self::Timeout => "请求超时",
            Self::Storage => "存储错误",
            Self::Config => "配置错误",
            Self::Other => "未知错误",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.localized_desc())
    }
}

impl HotsiftErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        self.is_transient()
    }

    fn localized_desc(&self) -> String {
        match self {
            Self::Timeout => "请求超时".to_string(),
            Self::Status(code) => format!("HTTP {code}"),
            other => format!("{}: {other}", self.category().localized_desc()),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Timeout => ErrorCategory::Timeout,
            Self::Status(_) => ErrorCategory::HttpStatus,
            Self::Decode(_) => ErrorCategory::Parse,
            Self::InvalidUrl(_) => ErrorCategory::Config,
            Self::Http(_) | Self::Connection(_) | Self::Proxy(_) => ErrorCategory::Network,
        }
    }
}

impl HotsiftErrorTrait for ParseError {
    fn is_recoverable(&self) -> bool {
        false
    }

    fn localized_desc(&self) -> String {
        format!("{}: {self}", self.category().localized_desc())
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSelector(_) | Self::InvalidRegex(_) => ErrorCategory::Config,
            Self::MalformedInput(_) | Self::Json(_) => ErrorCategory::Parse,
        }
    }
}

impl HotsiftErrorTrait for CrawlerError {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::NoItems | Self::InvalidConfig(_) => false,
        }
    }

    fn localized_desc(&self) -> String {
        match self {
            Self::Fetch(e) => e.localized_desc(),
            Self::Parse(e) => e.localized_desc(),
            Self::NoItems => "未获取到数据".to_string(),
            Self::InvalidConfig(msg) => format!("配置错误: {msg}"),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::NoItems => ErrorCategory::Other,
            Self::InvalidConfig(_) => ErrorCategory::Config,
        }
    }
}

/// Unified error type for the hotsift crate
#[derive(Error, Debug)]
pub enum Error {
    /// Crawler-related errors (fetch, parse, crawl)
    #[error("Crawler error: {0}")]
    Crawler(#[from] CrawlerError),

    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse-specific errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl HotsiftErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Crawler(e) => e.is_recoverable(),
            Self::Fetch(e) => e.is_recoverable(),
            Self::Parse(e) => e.is_recoverable(),
            Self::Database(_) => false,
            Self::Io(_) => true,
            Self::Json(_) | Self::Toml(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn localized_desc(&self) -> String {
        match self {
            Self::Crawler(e) => e.localized_desc(),
            Self::Fetch(e) => e.localized_desc(),
            Self::Parse(e) => e.localized_desc(),
            Self::Database(e) => format!("数据库错误: {e}"),
            Self::Io(e) => format!("I/O错误: {e}"),
            Self::Json(e) => format!("JSON解析错误: {e}"),
            Self::Toml(e) => format!("配置文件解析错误: {e}"),
            Self::Config(msg) => format!("配置错误: {msg}"),
            Self::Other { context, .. } => context.clone(),
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Crawler(e) => e.category(),
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
            Self::Database(_) | Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Parse,
            Self::Toml(_) | Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
