//! Fetching, extraction and orchestration of configured sources
//!
//! - [`fetcher`] - rate-limited HTTP fetching with proxy fallback
//! - [`headers`] - browser-like request headers
//! - [`content`] - article page verification
//! - [`configurable`] - list extraction driven by a [`SourceConfig`](crate::models::SourceConfig)
//! - [`platform`] - HTML and JSON platforms behind one trait
//! - [`service`] - sequential crawl runs with retries and real-time matching

pub mod configurable;
pub mod content;
pub mod fetcher;
pub mod headers;
pub mod platform;
pub mod service;

pub use configurable::{ConfigurableHtmlCrawler, ExtractionOutcome, ExtractionSettings};
pub use content::{CheckerSettings, ContentCache, ContentChecker};
pub use fetcher::{FetchRequest, FetcherSettings, HttpFetcher, PageFetcher};
pub use platform::{build_platform, HtmlPlatform, JsonApiPlatform, PlatformCrawler};
pub use service::{CrawlerService, PlatformEntry};
