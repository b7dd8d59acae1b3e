//! Platform crawlers driven by the crawl service
//!
//! A platform is anything that yields a ranked list of [`NewsItem`]s: a
//! configured HTML source or a JSON hot-list API.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use super::configurable::ConfigurableHtmlCrawler;
use super::fetcher::{FetchRequest, PageFetcher};
use super::headers::referer_for;
use crate::config::{PlatformSource, SourceKind};
use crate::models::{JsonApiConfig, NewsItem, SourceConfig};
use crate::parser::normalize_published_at;
use crate::parser::sanitize::sanitize_inline;
use crate::utils::error::{CrawlerError, ParseError};
use crate::utils::resolve_url;

/// One crawlable platform
#[async_trait]
pub trait PlatformCrawler: Send + Sync {
    /// Stable identifier used in results and storage
    fn id(&self) -> &str;

    /// Fetch the platform's items, in search mode when `keywords` is non-empty
    /// and the platform supports it
    async fn fetch(&self, keywords: &[String]) -> Result<Vec<NewsItem>, CrawlerError>;
}

/// HTML source handled by the [`ConfigurableHtmlCrawler`]
pub struct HtmlPlatform {
    id: String,
    source: SourceConfig,
    crawler: Arc<ConfigurableHtmlCrawler>,
}

impl HtmlPlatform {
    pub fn new(id: impl Into<String>, source: SourceConfig, crawler: Arc<ConfigurableHtmlCrawler>) -> Self {
        Self {
            id: id.into(),
            source,
            crawler,
        }
    }
}

#[async_trait]
impl PlatformCrawler for HtmlPlatform {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, keywords: &[String]) -> Result<Vec<NewsItem>, CrawlerError> {
        self.crawler
            .try_extract_with_keywords(&self.source, keywords)
            .await
    }
}

/// JSON hot-list API
pub struct JsonApiPlatform {
    id: String,
    api: JsonApiConfig,
    fetcher: Arc<dyn PageFetcher>,
    timeout: Duration,
}

impl JsonApiPlatform {
    pub fn new(
        id: impl Into<String>,
        api: JsonApiConfig,
        fetcher: Arc<dyn PageFetcher>,
        timeout: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            api,
            fetcher,
            timeout,
        }
    }

    fn request(&self, url: String) -> FetchRequest {
        let referer = referer_for(&url, None);
        FetchRequest {
            url,
            method: self.api.method,
            headers: self.api.headers.clone(),
            params: self.api.params.clone(),
            body: self.api.body.clone(),
            referer,
            timeout: self.timeout,
            retries: 0,
        }
    }

    async fn fetch_url(&self, url: String) -> Result<Vec<NewsItem>, CrawlerError> {
        let body = self.fetcher.fetch(&self.request(url)).await?;
        Ok(parse_json_items(&body, &self.api)?)
    }
}

#[async_trait]
impl PlatformCrawler for JsonApiPlatform {
    fn id(&self) -> &str {
        &self.id
    }

    async fn fetch(&self, keywords: &[String]) -> Result<Vec<NewsItem>, CrawlerError> {
        let search_url = match &self.api.search_url {
            Some(template) if !keywords.is_empty() => template,
            _ => return self.fetch_url(self.api.url.clone()).await,
        };

        let mut merged = Vec::new();
        let mut seen = HashSet::new();
        let mut last_error = None;
        let mut any_succeeded = false;

        for keyword in keywords {
            let encoded: String =
                url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();
            match self.fetch_url(search_url.replace("{keyword}", &encoded)).await {
                Ok(items) => {
                    any_succeeded = true;
                    merged.extend(items.into_iter().filter(|i| seen.insert(i.dedup_key())));
                }
                Err(e) => {
                    warn!(platform = %self.id, keyword = %keyword, error = %e, "Keyword search failed");
                    last_error = Some(e);
                }
            }
        }

        if !any_succeeded {
            if let Some(e) = last_error {
                return Err(e);
            }
        }
        if let Some(limit) = self.api.limit {
            merged.truncate(limit);
        }
        for (i, item) in merged.iter_mut().enumerate() {
            item.rank = i as u32 + 1;
        }
        Ok(merged)
    }
}

/// Build the crawler for one operator source
///
/// HTML sources share `html`; JSON sources fetch through `fetcher` with
/// `timeout`.
pub fn build_platform(
    source: &PlatformSource,
    html: &Arc<ConfigurableHtmlCrawler>,
    fetcher: &Arc<dyn PageFetcher>,
    timeout: Duration,
) -> Arc<dyn PlatformCrawler> {
    match &source.kind {
        SourceKind::Html { config } => Arc::new(HtmlPlatform::new(
            source.id.clone(),
            config.clone(),
            Arc::clone(html),
        )),
        SourceKind::JsonApi { api } => Arc::new(JsonApiPlatform::new(
            source.id.clone(),
            api.clone(),
            Arc::clone(fetcher),
            timeout,
        )),
    }
}

/// Read ranked items out of a JSON response
///
/// # Errors
///
/// Returns `ParseError::Json` when the body is not JSON or the items
/// pointer does not lead to an array.
pub fn parse_json_items(body: &str, api: &JsonApiConfig) -> Result<Vec<NewsItem>, ParseError> {
    let root: Value = serde_json::from_str(body).map_err(|e| ParseError::Json(e.to_string()))?;

    let entries = if api.items_pointer.is_empty() {
        Some(&root)
    } else {
        root.pointer(&api.items_pointer)
    }
    .and_then(Value::as_array)
    .ok_or_else(|| ParseError::Json(format!("no item array at '{}'", api.items_pointer)))?;

    let limit = api.limit.unwrap_or(usize::MAX);
    let mut items = Vec::new();

    for entry in entries {
        if items.len() >= limit {
            break;
        }
        let Some(title) = pointer_text(entry, Some(&api.title_pointer))
            .map(|t| sanitize_inline(&t))
            .filter(|t| !t.is_empty())
        else {
            continue;
        };

        let url = pointer_text(entry, api.url_pointer.as_ref()).and_then(|value| {
            let raw = match &api.url_template {
                Some(template) => template.replace("{value}", &value),
                None => value,
            };
            resolve_url(Some(&api.url), &raw)
        });

        items.push(NewsItem {
            title,
            url,
            mobile_url: pointer_text(entry, api.mobile_url_pointer.as_ref())
                .and_then(|v| resolve_url(Some(&api.url), &v)),
            rank: items.len() as u32 + 1,
            content: pointer_text(entry, api.summary_pointer.as_ref())
                .map(|s| sanitize_inline(&s))
                .filter(|s| !s.is_empty()),
            published_at: pointer_text(entry, api.published_at_pointer.as_ref())
                .map(|v| normalize_published_at(&v)),
        });
    }

    Ok(items)
}

fn pointer_text(entry: &Value, pointer: Option<&String>) -> Option<String> {
    match entry.pointer(pointer?)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> JsonApiConfig {
        serde_json::from_value(serde_json::json!({
            "url": "https://api.example.com/hot",
            "itemsPointer": "/data/list",
            "titlePointer": "/word",
            "urlPointer": "/id",
            "urlTemplate": "https://example.com/topic/{value}",
            "publishedAtPointer": "/ts",
            "limit": 2
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_json_items() {
        let body = r#"{"data":{"list":[
            {"word":"<em>手机</em>芯片降价","id":101,"ts":1700000000},
            {"word":"","id":102},
            {"word":"新款手机发布","id":"103"},
            {"word":"third","id":104}
        ]}}"#;
        let items = parse_json_items(body, &api()).unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "手机芯片降价");
        assert_eq!(items[0].url.as_deref(), Some("https://example.com/topic/101"));
        assert_eq!(items[0].published_at.as_deref(), Some("2023-11-14T22:13:20+00:00"));
        assert_eq!(items[1].title, "新款手机发布");
        assert_eq!(items[1].rank, 2);
    }

    #[test]
    fn test_parse_json_items_errors() {
        assert!(matches!(parse_json_items("not json", &api()), Err(ParseError::Json(_))));
        assert!(matches!(
            parse_json_items(r#"{"data":{"list":{}}}"#, &api()),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn test_root_array() {
        let mut config = api();
        config.items_pointer = String::new();
        config.limit = None;
        let items = parse_json_items(r#"[{"word":"a headline","id":1}]"#, &config).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].rank, 1);
    }
}
