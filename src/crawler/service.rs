//! Crawl service: runs every configured platform once
//!
//! Platforms are crawled strictly one after another with a pause between
//! them. Each platform gets the shared retry policy; failures are classified
//! for the report but never stop the run. Successful batches are persisted
//! and, when real-time matching is on, every item goes through the matcher
//! and the weight calculator before the next one.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::platform::PlatformCrawler;
use crate::error::HotsiftErrorTrait;
use crate::matcher::{calculate_weight, KeywordMatcher, DEFAULT_RANK_THRESHOLD};
use crate::metrics;
use crate::models::{
    BatchResult, CrawlProgress, CrawlReport, NewsItem, NewsMatchData, PlatformFailure,
};
use crate::storage::NewsSink;
use crate::utils::retry::{with_retry, RetryConfig};

/// A platform plus the keywords that put it in search mode
pub struct PlatformEntry {
    pub crawler: Arc<dyn PlatformCrawler>,
    pub keywords: Vec<String>,
}

/// Orchestrates one crawl run over all platforms
pub struct CrawlerService {
    platforms: Vec<PlatformEntry>,
    retry: RetryConfig,
    inter_source_delay: Duration,
    sink: Option<Arc<dyn NewsSink>>,
    matcher: Option<Arc<KeywordMatcher>>,
    rank_threshold: u32,
    progress: Arc<Mutex<CrawlProgress>>,
}

impl CrawlerService {
    pub fn new(retry: RetryConfig, inter_source_delay: Duration) -> Self {
        Self {
            platforms: Vec::new(),
            retry,
            inter_source_delay,
            sink: None,
            matcher: None,
            rank_threshold: DEFAULT_RANK_THRESHOLD,
            progress: Arc::new(Mutex::new(CrawlProgress::default())),
        }
    }

    /// Persist successful batches to `sink`
    pub fn with_sink(mut self, sink: Arc<dyn NewsSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Enable real-time matching of every fetched item
    pub fn with_matcher(mut self, matcher: Arc<KeywordMatcher>, rank_threshold: u32) -> Self {
        self.matcher = Some(matcher);
        self.rank_threshold = rank_threshold;
        self
    }

    pub fn add_platform(&mut self, crawler: Arc<dyn PlatformCrawler>, keywords: Vec<String>) {
        self.platforms.push(PlatformEntry { crawler, keywords });
    }

    pub fn platform_count(&self) -> usize {
        self.platforms.len()
    }

    /// Shared handle to the live progress counters
    pub fn progress_handle(&self) -> Arc<Mutex<CrawlProgress>> {
        Arc::clone(&self.progress)
    }

    /// Snapshot of the progress counters
    pub fn progress(&self) -> CrawlProgress {
        self.progress.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn update_progress(&self, update: impl FnOnce(&mut CrawlProgress)) {
        if let Ok(mut progress) = self.progress.lock() {
            update(&mut progress);
        }
    }

    /// Crawl every platform once
    pub async fn crawl_all(&self) -> CrawlReport {
        self.update_progress(|p| {
            *p = CrawlProgress {
                total: self.platforms.len(),
                ..Default::default()
            }
        });

        let mut report = CrawlReport::default();

        for (index, entry) in self.platforms.iter().enumerate() {
            if index > 0 && !self.inter_source_delay.is_zero() {
                tokio::time::sleep(self.inter_source_delay).await;
            }

            let platform_id = entry.crawler.id().to_string();
            self.update_progress(|p| p.current = Some(platform_id.clone()));

            let result = self.crawl_platform(entry).await;
            if result.success {
                self.process_items(&platform_id, &result.data).await;
                report.success_count += 1;
            } else {
                report.failed_count += 1;
            }

            self.update_progress(|p| {
                p.completed += 1;
                if result.success {
                    p.succeeded += 1;
                } else {
                    p.failed += 1;
                    p.failures.push(PlatformFailure {
                        platform_id: platform_id.clone(),
                        error: result
                            .error
                            .clone()
                            .unwrap_or_else(|| "未获取到数据".to_string()),
                    });
                }
            });
            report.results.push(result);
        }

        self.update_progress(|p| p.current = None);
        info!(
            succeeded = report.success_count,
            failed = report.failed_count,
            "Crawl run finished"
        );
        report
    }

    /// Crawl one platform with retries, never failing
    #[instrument(skip_all, fields(platform = %entry.crawler.id()))]
    pub async fn crawl_platform(&self, entry: &PlatformEntry) -> BatchResult {
        let platform_id = entry.crawler.id();
        let _timer = metrics::start_source_timer(platform_id);

        let outcome = with_retry(&self.retry, |_attempt| {
            let crawler = Arc::clone(&entry.crawler);
            let keywords = entry.keywords.clone();
            async move { crawler.fetch(&keywords).await }
        })
        .await;

        match outcome {
            Ok(items) => {
                let result = BatchResult::from_items(platform_id, items);
                let outcome = if result.success { "success" } else { "empty" };
                metrics::record_source_run(platform_id, outcome);
                metrics::record_items_accepted(platform_id, result.data.len());
                info!(items = result.data.len(), "Platform crawled");
                result
            }
            Err(e) => {
                let category = e.category();
                warn!(
                    category = ?category,
                    error = %e,
                    "Platform failed after retries"
                );
                metrics::record_source_run(platform_id, &format!("{category:?}").to_lowercase());
                BatchResult::failure(platform_id, e.localized_desc(), category)
            }
        }
    }

    /// Persist a batch and run real-time matching over it
    ///
    /// Storage and matching failures are logged per item and never abort
    /// the batch.
    async fn process_items(&self, platform_id: &str, items: &[NewsItem]) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.save_items(platform_id, items).await {
                warn!(platform = platform_id, error = %e, "Failed to save items");
            }
        }

        let Some(matcher) = &self.matcher else {
            return;
        };
        for item in items {
            if let Err(e) = self.match_item(matcher, platform_id, item).await {
                warn!(platform = platform_id, title = %item.title, error = %e, "Real-time matching failed");
            }
        }
    }

    /// Match one item and store its new weight; returns the weight when matched
    pub async fn match_item(
        &self,
        matcher: &KeywordMatcher,
        platform_id: &str,
        item: &NewsItem,
    ) -> anyhow::Result<Option<f64>> {
        let result = matcher.match_title(&item.title).await?;
        let Some(group) = result.keyword_group.filter(|_| result.matched) else {
            return Ok(None);
        };
        metrics::record_keyword_match(&group.name);

        let weight = match &self.sink {
            Some(sink) => {
                let history = sink.record_match(platform_id, item, group.id).await?;
                let weight = calculate_weight(&history, self.rank_threshold);
                sink.update_weight(platform_id, &item.title, group.id, weight)
                    .await?;
                weight
            }
            None => {
                let single = NewsMatchData {
                    ranks: vec![item.rank],
                    match_count: 1,
                };
                calculate_weight(&single, self.rank_threshold)
            }
        };

        info!(
            platform = platform_id,
            title = %item.title,
            group = %group.name,
            words = ?result.matched_words,
            weight,
            "Title matched keyword group"
        );
        Ok(Some(weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::utils::error::{CrawlerError, FetchError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Flaky {
        id: String,
        failures_before_success: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl PlatformCrawler for Flaky {
        fn id(&self) -> &str {
            &self.id
        }

        async fn fetch(&self, _keywords: &[String]) -> Result<Vec<NewsItem>, CrawlerError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures_before_success {
                return Err(FetchError::Timeout.into());
            }
            Ok(vec![NewsItem {
                title: "Chip prices fall".to_string(),
                rank: 1,
                ..Default::default()
            }])
        }
    }

    fn flaky(id: &str, failures: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            id: id.to_string(),
            failures_before_success: failures,
            calls: AtomicU32::new(0),
        })
    }

    fn service() -> CrawlerService {
        CrawlerService::new(RetryConfig::with_delays(2, 1, 5), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let platform = flaky("a", 2);
        let mut svc = service();
        svc.add_platform(platform.clone(), Vec::new());

        let report = svc.crawl_all().await;
        assert_eq!(report.success_count, 1);
        assert_eq!(platform.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_are_classified() {
        let platform = flaky("a", 10);
        let mut svc = service();
        svc.add_platform(platform.clone(), Vec::new());

        let report = svc.crawl_all().await;
        assert_eq!(report.failed_count, 1);
        let result = &report.results[0];
        assert!(!result.success);
        assert_eq!(result.error_category, Some(ErrorCategory::Timeout));
        assert_eq!(result.error.as_deref(), Some("请求超时"));
        assert_eq!(platform.calls.load(Ordering::SeqCst), 3);

        let progress = svc.progress();
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.failures[0].platform_id, "a");
        assert!(progress.current.is_none());
    }
}
