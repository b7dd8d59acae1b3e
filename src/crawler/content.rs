//! Content verification of candidate article pages
//!
//! Fetches a candidate's target page and hands it to
//! [`analyze_page`](crate::parser::content::analyze_page). Results are
//! memoized per extraction run in a [`ContentCache`] owned by the caller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, instrument};

use super::fetcher::{FetchRequest, PageFetcher};
use super::headers::referer_for;
use crate::metrics;
use crate::models::ContentCheckResult;
use crate::parser::content::{analyze_page, ContentRules};
use crate::utils::error::FetchError;

/// Per-run memo of content checks keyed by URL
///
/// Owned by whoever drives one extraction so nothing leaks between runs.
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: Mutex<HashMap<String, ContentCheckResult>>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<ContentCheckResult> {
        self.entries.lock().ok()?.get(url).cloned()
    }

    pub fn insert(&self, url: &str, result: ContentCheckResult) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(url.to_string(), result);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Settings of [`ContentChecker`]
#[derive(Debug, Clone)]
pub struct CheckerSettings {
    pub timeout: Duration,
    pub retries: u32,
    pub rules: ContentRules,
}

impl Default for CheckerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retries: 1,
            rules: ContentRules::default(),
        }
    }
}

/// Verifies that a candidate URL leads to a page with real content
#[derive(Clone)]
pub struct ContentChecker {
    fetcher: Arc<dyn PageFetcher>,
    settings: CheckerSettings,
}

impl ContentChecker {
    pub fn new(fetcher: Arc<dyn PageFetcher>, settings: CheckerSettings) -> Self {
        Self { fetcher, settings }
    }

    /// Check `url`, never failing
    ///
    /// Fetch failures become a negative result whose reason is the
    /// localized timeout message or the error text. `base_url` only feeds
    /// the Referer when the URL itself has no usable origin.
    #[instrument(skip(self, cache), fields(url = %url))]
    pub async fn has_content(
        &self,
        url: &str,
        base_url: Option<&str>,
        cache: &ContentCache,
    ) -> ContentCheckResult {
        if let Some(hit) = cache.get(url) {
            debug!("Content check cache hit");
            return hit;
        }

        let request = FetchRequest::get(url, self.settings.timeout)
            .with_referer(referer_for(url, base_url))
            .with_retries(self.settings.retries);

        let result = match self.fetcher.fetch(&request).await {
            Ok(html) => analyze_page(&html, &self.settings.rules),
            Err(FetchError::Timeout) => ContentCheckResult::rejected("请求超时"),
            Err(e) => ContentCheckResult::rejected(e.to_string()),
        };

        debug!(
            has_content = result.has_content,
            has_text = result.has_text,
            has_video = result.has_video,
            reason = result.reason.as_deref().unwrap_or(""),
            "Content check finished"
        );
        metrics::record_content_check(result.has_content);

        cache.insert(url, result.clone());
        result
    }
}
