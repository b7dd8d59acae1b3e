//! Configurable HTML crawler
//!
//! Drives one extraction of an HTML source: fetch the listing, resolve the
//! item selector, extract and filter candidates, then verify the survivors'
//! article pages in small concurrent batches until the result limit is
//! reached.
//!
//! The listing document is parsed and fully consumed in
//! [`collect_candidates`] before anything is awaited, so no DOM handle ever
//! lives across a suspension point.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, instrument, warn};

use super::content::{CheckerSettings, ContentCache, ContentChecker};
use super::fetcher::{FetchRequest, PageFetcher};
use super::headers::referer_for;
use crate::metrics;
use crate::models::{NewsItem, RequestConfig, SourceConfig};
use crate::parser::{
    ArticleFilter, CandidateExtractor, Document, FilterRules, ResolvedSelector, SelectorResolver,
};
use crate::utils::error::CrawlerError;

/// Settings shared by every extraction
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub list_timeout: Duration,
    /// Verify article pages before accepting candidates
    pub content_check: bool,
    /// Content checks issued concurrently per batch
    pub batch_size: usize,
    pub filter_rules: FilterRules,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            list_timeout: Duration::from_secs(15),
            content_check: true,
            batch_size: 5,
            filter_rules: FilterRules::default(),
        }
    }
}

/// What one extraction produced, with the bookkeeping behind it
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    pub items: Vec<NewsItem>,
    /// Selector actually used; the source config is never rewritten
    pub resolved: ResolvedSelector,
    /// Elements that yielded a candidate
    pub candidates: usize,
    /// Candidates rejected by the synchronous filter
    pub rejected: usize,
    /// Article pages checked (cache hits included)
    pub checked: usize,
}

/// Owned survivor of the synchronous stages
#[derive(Debug, Clone)]
struct PendingItem {
    title: String,
    url: Option<String>,
    mobile_url: Option<String>,
    published_at: Option<String>,
    summary: Option<String>,
}

impl PendingItem {
    fn into_item(self, rank: u32, snippet: Option<String>) -> NewsItem {
        NewsItem {
            title: self.title,
            url: self.url,
            mobile_url: self.mobile_url,
            rank,
            content: snippet.or(self.summary),
            published_at: self.published_at,
        }
    }
}

struct Collected {
    resolved: ResolvedSelector,
    pending: Vec<PendingItem>,
    candidates: usize,
    rejected: usize,
}

/// Extraction orchestrator for configured HTML sources
pub struct ConfigurableHtmlCrawler {
    fetcher: Arc<dyn PageFetcher>,
    checker: ContentChecker,
    resolver: SelectorResolver,
    settings: ExtractionSettings,
}

impl ConfigurableHtmlCrawler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        settings: ExtractionSettings,
        checker_settings: CheckerSettings,
    ) -> Self {
        Self {
            checker: ContentChecker::new(Arc::clone(&fetcher), checker_settings),
            fetcher,
            resolver: SelectorResolver::default(),
            settings,
        }
    }

    /// Extract the source's listing, never failing
    ///
    /// Fetch and parse failures are logged and produce an empty list.
    pub async fn extract(&self, source: &SourceConfig) -> Vec<NewsItem> {
        match self.try_extract(source).await {
            Ok(outcome) => outcome.items,
            Err(e) => {
                warn!(url = %source.list.url, error = %e, "Extraction failed");
                Vec::new()
            }
        }
    }

    /// Extract in search mode when keywords and a search descriptor are
    /// present, otherwise in listing mode. Never fails.
    pub async fn extract_with_keywords(
        &self,
        source: &SourceConfig,
        keywords: &[String],
    ) -> Vec<NewsItem> {
        match self.try_extract_with_keywords(source, keywords).await {
            Ok(items) => items,
            Err(e) => {
                warn!(url = %source.list.url, error = %e, "Extraction failed");
                Vec::new()
            }
        }
    }

    /// Fallible listing extraction, used where failures must be classified
    pub async fn try_extract(&self, source: &SourceConfig) -> Result<ExtractionOutcome, CrawlerError> {
        let cache = ContentCache::new();
        self.run(source, &source.list, &cache).await
    }

    /// Fallible extraction honoring keywords
    ///
    /// Each keyword is substituted into the search descriptor and run on
    /// its own; results are merged by URL (or title), cut to the
    /// descriptor's limit and re-ranked from 1. Fails only when every
    /// keyword failed.
    pub async fn try_extract_with_keywords(
        &self,
        source: &SourceConfig,
        keywords: &[String],
    ) -> Result<Vec<NewsItem>, CrawlerError> {
        let template = match &source.search {
            Some(search) if !keywords.is_empty() => search,
            _ => return Ok(self.try_extract(source).await?.items),
        };

        let cache = ContentCache::new();
        let mut merged: Vec<NewsItem> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut last_error = None;
        let mut any_succeeded = false;

        for keyword in keywords {
            let request = template.with_keyword(keyword);
            match self.run(source, &request, &cache).await {
                Ok(outcome) => {
                    any_succeeded = true;
                    for item in outcome.items {
                        if seen.insert(item.dedup_key()) {
                            merged.push(item);
                        }
                    }
                }
                Err(e) => {
                    warn!(keyword = %keyword, error = %e, "Keyword search failed");
                    last_error = Some(e);
                }
            }
        }

        if !any_succeeded {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        if let Some(limit) = template.limit {
            merged.truncate(limit);
        }
        for (i, item) in merged.iter_mut().enumerate() {
            item.rank = i as u32 + 1;
        }
        Ok(merged)
    }

    #[instrument(skip_all, fields(url = %request.url))]
    async fn run(
        &self,
        source: &SourceConfig,
        request: &RequestConfig,
        cache: &ContentCache,
    ) -> Result<ExtractionOutcome, CrawlerError> {
        let base = source
            .base_url
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| request.url.clone());

        let fetch = FetchRequest::from_config(request, self.settings.list_timeout)
            .with_referer(referer_for(&request.url, Some(&base)));
        let html = self.fetcher.fetch(&fetch).await?;

        let collected = collect_candidates(
            &html,
            &base,
            request,
            &self.resolver,
            &self.settings.filter_rules,
        )?;

        let limit = request.limit.unwrap_or(usize::MAX);
        let (items, checked) = self.verify(collected.pending, limit, &base, cache).await;

        info!(
            selector = %collected.resolved.selector,
            origin = %collected.resolved.origin,
            candidates = collected.candidates,
            rejected = collected.rejected,
            checked,
            accepted = items.len(),
            "Extraction finished"
        );

        Ok(ExtractionOutcome {
            items,
            resolved: collected.resolved,
            candidates: collected.candidates,
            rejected: collected.rejected,
            checked,
        })
    }

    /// Accept pending items in batch order until `limit` is reached
    async fn verify(
        &self,
        pending: Vec<PendingItem>,
        limit: usize,
        base: &str,
        cache: &ContentCache,
    ) -> (Vec<NewsItem>, usize) {
        let mut accepted: Vec<NewsItem> = Vec::new();

        if !self.settings.content_check {
            for item in pending.into_iter().take(limit) {
                let rank = accepted.len() as u32 + 1;
                accepted.push(item.into_item(rank, None));
            }
            return (accepted, 0);
        }

        let mut checked = 0;
        let batch_size = self.settings.batch_size.max(1);
        let mut queue = pending.into_iter().peekable();

        while accepted.len() < limit && queue.peek().is_some() {
            let batch: Vec<PendingItem> = queue.by_ref().take(batch_size).collect();
            let results = join_all(batch.iter().map(|item| async move {
                match &item.url {
                    Some(url) => Some(self.checker.has_content(url, Some(base), cache).await),
                    None => None,
                }
            }))
            .await;

            for (item, result) in batch.into_iter().zip(results) {
                if result.is_some() {
                    checked += 1;
                }
                if accepted.len() >= limit {
                    continue;
                }
                match result {
                    // Nothing to verify without a URL; the listing text is all there is
                    None => {
                        let rank = accepted.len() as u32 + 1;
                        accepted.push(item.into_item(rank, None));
                    }
                    Some(check) if check.has_content => {
                        let rank = accepted.len() as u32 + 1;
                        accepted.push(item.into_item(rank, check.text_snippet));
                    }
                    Some(check) => {
                        debug!(
                            title = %item.title,
                            reason = check.reason.as_deref().unwrap_or(""),
                            "Candidate failed content check"
                        );
                    }
                }
            }
        }

        (accepted, checked)
    }
}

/// Parse the listing and run the synchronous stages
///
/// Survivors are deduplicated by URL so no article page is checked twice
/// in one run.
fn collect_candidates(
    html: &str,
    base: &str,
    request: &RequestConfig,
    resolver: &SelectorResolver,
    rules: &FilterRules,
) -> Result<Collected, CrawlerError> {
    let doc = Document::parse(html)?;
    let resolution = resolver.resolve(&doc, &request.item_selector);

    let extractor = CandidateExtractor::new(&request.fields, Some(base));
    let filter = ArticleFilter::new(&request.filter, rules);

    let candidates = extractor.extract_all(&resolution.elements);
    let candidate_count = candidates.len();
    let mut rejected = 0;
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut pending = Vec::new();

    for candidate in candidates {
        let verdict =
            filter.is_valid_article(&candidate.title, candidate.url.as_deref(), Some(candidate.element));
        if let Some(reason) = verdict.reason {
            debug!(title = %candidate.title, reason = %reason, "Candidate rejected");
            metrics::record_rejection(reason.label());
            rejected += 1;
            continue;
        }
        if let Some(url) = &candidate.url {
            if !seen_urls.insert(url.clone()) {
                continue;
            }
        }
        pending.push(PendingItem {
            title: candidate.title,
            url: candidate.url,
            mobile_url: candidate.mobile_url,
            published_at: candidate.published_at,
            summary: candidate.summary,
        });
    }

    Ok(Collected {
        resolved: resolution.resolved,
        pending,
        candidates: candidate_count,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FieldMap;
    use crate::parser::SelectorOrigin;

    fn request(selector: &str) -> RequestConfig {
        RequestConfig {
            url: "https://news.example.com/list".to_string(),
            item_selector: selector.to_string(),
            fields: FieldMap::default(),
            ..Default::default()
        }
    }

    const LISTING: &str = r#"<html><body>
        <nav><ul>
            <li><a href="/">首页</a></li>
            <li><a href="/tech">技术</a></li>
        </ul></nav>
        <ul class="news">
            <li class="row"><a href="/a/1.html">Chip prices fall for the third month</a></li>
            <li class="row"><a href="/a/2.html">New phone launches with in-house modem</a></li>
            <li class="row"><a href="/a/1.html">Chip prices fall for the third month</a></li>
            <li class="row"><a href="javascript:void(0)">Load more stories about phones</a></li>
        </ul>
    </body></html>"#;

    #[test]
    fn test_collect_candidates_filters_and_dedups() {
        let collected = collect_candidates(
            LISTING,
            "https://news.example.com/",
            &request("li.row"),
            &SelectorResolver::default(),
            &FilterRules::default(),
        )
        .unwrap();

        assert_eq!(collected.resolved.origin, SelectorOrigin::Configured);
        assert_eq!(collected.candidates, 4);
        assert_eq!(collected.rejected, 1);
        let urls: Vec<_> = collected.pending.iter().filter_map(|p| p.url.as_deref()).collect();
        assert_eq!(
            urls,
            vec![
                "https://news.example.com/a/1.html",
                "https://news.example.com/a/2.html"
            ]
        );
    }

    #[test]
    fn test_collect_candidates_empty_document() {
        let result = collect_candidates(
            "   ",
            "https://news.example.com/",
            &request("li.row"),
            &SelectorResolver::default(),
            &FilterRules::default(),
        );
        assert!(matches!(result, Err(CrawlerError::Parse(_))));
    }

    #[test]
    fn test_pending_item_prefers_snippet() {
        let item = PendingItem {
            title: "t".into(),
            url: None,
            mobile_url: None,
            published_at: None,
            summary: Some("summary".into()),
        };
        assert_eq!(item.clone().into_item(1, Some("snippet".into())).content.as_deref(), Some("snippet"));
        assert_eq!(item.into_item(2, None).content.as_deref(), Some("summary"));
    }
}
