//! hotsift - Resilient news-list extraction and keyword matching
//!
//! Turns operator-described HTML listings and JSON hot lists into clean,
//! content-verified news items and matches them against keyword groups.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and operator source files
//! - [`crawler`] - Fetching, list extraction, content verification and crawl runs
//! - [`parser`] - Selector resolution, candidate extraction, filtering and page analysis
//! - [`matcher`] - Keyword group matching and weight calculation
//! - [`models`] - Core data structures and types
//! - [`storage`] - Persistence boundary (SQLite and in-memory)
//! - [`metrics`] - Prometheus metrics
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use hotsift::config::Config;
//! use hotsift::crawler::{ConfigurableHtmlCrawler, HttpFetcher, PageFetcher};
//! use hotsift::models::SourceConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let fetcher: Arc<dyn PageFetcher> =
//!         Arc::new(HttpFetcher::with_settings(config.fetcher_settings())?);
//!     let crawler = ConfigurableHtmlCrawler::new(
//!         fetcher,
//!         config.extraction_settings(),
//!         config.checker_settings(),
//!     );
//!     let source: SourceConfig = serde_json::from_str(r#"{"list": {"url": "https://example.com"}}"#)?;
//!     let items = crawler.extract(&source).await;
//!     println!("{} items", items.len());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crawler;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, PlatformSource, SourcesFile};
    pub use crate::crawler::{ConfigurableHtmlCrawler, CrawlerService, PlatformCrawler};
    pub use crate::error::{Error, ErrorCategory, HotsiftErrorTrait, Result};
    pub use crate::matcher::KeywordMatcher;
    pub use crate::models::{BatchResult, CrawlReport, NewsItem, SourceConfig};
    pub use crate::storage::{KeywordStore, NewsSink, SqliteStore};
}

// Direct re-exports for convenience
pub use models::{NewsItem, SourceConfig};
