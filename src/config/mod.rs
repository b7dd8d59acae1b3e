//! Configuration management for hotsift
//!
//! This module handles loading and validating configuration from environment variables,
//! files, and command-line arguments. Operator source definitions live in their own
//! file, see [`sources`].

pub mod sources;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::crawler::{CheckerSettings, ExtractionSettings, FetcherSettings};
use crate::parser::{ContentRules, FilterRules};
use crate::utils::retry::RetryConfig;

pub use sources::{PlatformSource, SourceKind, SourcesFile};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Crawler configuration
    pub crawler: CrawlerConfig,

    /// Article page verification
    pub content_check: ContentCheckConfig,

    /// Navigational heuristics of the article filter
    pub filter: FilterRules,

    /// Keyword matcher configuration
    pub matcher: MatcherConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Crawler-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// List page request timeout in seconds
    pub list_timeout_secs: u64,

    /// Retries per source after the first attempt
    pub max_retries: u32,

    /// Base delay of the per-source exponential backoff
    pub retry_base_delay_ms: u64,

    /// Pause between two sources
    pub inter_source_delay_ms: u64,

    /// Rate limit (requests per second)
    pub requests_per_second: u32,

    /// Fixed user agent; a browser pool is rotated when unset
    pub user_agent: Option<String>,

    /// Proxy tried after a direct request fails
    pub proxy_url: Option<String>,

    /// Match every fetched item against keyword groups as it arrives
    pub realtime_matching: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            list_timeout_secs: 15,
            max_retries: 2,
            retry_base_delay_ms: 2000,
            inter_source_delay_ms: 1000,
            requests_per_second: 10,
            user_agent: None,
            proxy_url: None,
            realtime_matching: false,
        }
    }
}

/// Article page verification
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentCheckConfig {
    pub enabled: bool,
    pub timeout_secs: u64,
    /// Pages checked concurrently
    pub batch_size: usize,
    pub min_text_chars: usize,
    pub link_density_threshold: f64,
    pub nav_list_ratio: f64,
    pub retries: u32,
}

impl Default for ContentCheckConfig {
    fn default() -> Self {
        let rules = ContentRules::default();
        Self {
            enabled: true,
            timeout_secs: 5,
            batch_size: 5,
            min_text_chars: rules.min_text_chars,
            link_density_threshold: rules.link_density_threshold,
            nav_list_ratio: rules.nav_list_ratio,
            retries: 1,
        }
    }
}

/// Keyword matcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherConfig {
    /// Lifetime of the cached keyword groups
    pub cache_ttl_secs: u64,

    /// Rank at or above which an appearance counts as hot
    pub rank_threshold: u32,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 60,
            rank_threshold: crate::matcher::DEFAULT_RANK_THRESHOLD,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database path
    pub sqlite_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqlite_path: PathBuf::from("data/hotsift.db"),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Unset or unparsable variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `HOTSIFT_*` environment variables
    pub fn apply_env(&mut self) {
        let crawler = &mut self.crawler;
        if let Some(v) = env_parse("HOTSIFT_LIST_TIMEOUT") {
            crawler.list_timeout_secs = v;
        }
        if let Some(v) = env_parse("HOTSIFT_MAX_RETRIES") {
            crawler.max_retries = v;
        }
        if let Some(v) = env_parse("HOTSIFT_RETRY_BASE_DELAY_MS") {
            crawler.retry_base_delay_ms = v;
        }
        if let Some(v) = env_parse("HOTSIFT_INTER_SOURCE_DELAY_MS") {
            crawler.inter_source_delay_ms = v;
        }
        if let Some(v) = env_parse("HOTSIFT_RATE_LIMIT") {
            crawler.requests_per_second = v;
        }
        if let Ok(v) = std::env::var("HOTSIFT_USER_AGENT") {
            crawler.user_agent = Some(v);
        }
        if let Ok(v) = std::env::var("HOTSIFT_PROXY_URL") {
            crawler.proxy_url = Some(v);
        }
        if let Some(v) = env_parse("HOTSIFT_REALTIME_MATCHING") {
            crawler.realtime_matching = v;
        }

        if let Some(v) = env_parse("HOTSIFT_CONTENT_CHECK") {
            self.content_check.enabled = v;
        }
        if let Some(v) = env_parse("HOTSIFT_CONTENT_TIMEOUT") {
            self.content_check.timeout_secs = v;
        }
        if let Some(v) = env_parse("HOTSIFT_BATCH_SIZE") {
            self.content_check.batch_size = v;
        }

        if let Some(v) = env_parse("HOTSIFT_MATCHER_CACHE_TTL") {
            self.matcher.cache_ttl_secs = v;
        }
        if let Ok(v) = std::env::var("HOTSIFT_SQLITE_PATH") {
            self.storage.sqlite_path = v.into();
        }
        if let Ok(v) = std::env::var("HOTSIFT_LOG_LEVEL") {
            self.logging.level = v;
        }
        if let Ok(v) = std::env::var("HOTSIFT_LOG_FORMAT") {
            self.logging.format = v;
        }
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.crawler.requests_per_second == 0 {
            anyhow::bail!("requests_per_second must be greater than 0");
        }

        if self.crawler.list_timeout_secs == 0 || self.content_check.timeout_secs == 0 {
            anyhow::bail!("timeouts must be greater than 0");
        }

        if self.content_check.batch_size == 0 {
            anyhow::bail!("content_check.batch_size must be greater than 0");
        }

        if !(0.0..=1.0).contains(&self.content_check.link_density_threshold) {
            anyhow::bail!("content_check.link_density_threshold must be within 0..=1");
        }

        if self.content_check.nav_list_ratio <= 0.0 {
            anyhow::bail!("content_check.nav_list_ratio must be positive");
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            anyhow::bail!("logging.format must be 'text' or 'json'");
        }

        Ok(())
    }

    /// Per-source retry policy
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(
            self.crawler.max_retries,
            self.crawler.retry_base_delay_ms,
            RetryConfig::default().max_delay_ms,
        )
    }

    #[must_use]
    pub fn inter_source_delay(&self) -> Duration {
        Duration::from_millis(self.crawler.inter_source_delay_ms)
    }

    #[must_use]
    pub fn list_timeout(&self) -> Duration {
        Duration::from_secs(self.crawler.list_timeout_secs)
    }

    #[must_use]
    pub fn matcher_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.matcher.cache_ttl_secs)
    }

    #[must_use]
    pub fn fetcher_settings(&self) -> FetcherSettings {
        FetcherSettings {
            requests_per_second: self.crawler.requests_per_second,
            default_timeout: self.list_timeout(),
            user_agent: self.crawler.user_agent.clone(),
            proxy_url: self.crawler.proxy_url.clone(),
            ..FetcherSettings::default()
        }
    }

    #[must_use]
    pub fn extraction_settings(&self) -> ExtractionSettings {
        ExtractionSettings {
            list_timeout: self.list_timeout(),
            content_check: self.content_check.enabled,
            batch_size: self.content_check.batch_size,
            filter_rules: self.filter.clone(),
        }
    }

    #[must_use]
    pub fn checker_settings(&self) -> CheckerSettings {
        CheckerSettings {
            timeout: Duration::from_secs(self.content_check.timeout_secs),
            retries: self.content_check.retries,
            rules: ContentRules {
                min_text_chars: self.content_check.min_text_chars,
                link_density_threshold: self.content_check.link_density_threshold,
                nav_list_ratio: self.content_check.nav_list_ratio,
                ..ContentRules::default()
            },
        }
    }
}
