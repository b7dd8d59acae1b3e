//! Common test utilities

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hotsift::crawler::{
    CheckerSettings, ConfigurableHtmlCrawler, ExtractionSettings, FetchRequest, PageFetcher,
};
use hotsift::models::{FieldMap, RequestConfig, SourceConfig};
use hotsift::utils::error::FetchError;

/// Paragraph long enough to pass the content check on its own
pub const ARTICLE_TEXT: &str = "Semiconductor makers reported another month of falling \
    memory prices on Tuesday, as inventories built up during the last quarter kept pressure \
    on suppliers and buyers delayed new orders until the outlook improves.";

/// Article page with substantive body text
pub fn article_page(marker: &str) -> String {
    format!(
        "<html><body><nav><a href=\"/\">首页</a></nav>\
         <article><h1>{marker}</h1><p>{marker}: {ARTICLE_TEXT}</p></article>\
         <footer>© example</footer></body></html>"
    )
}

/// Article page with too little body text
pub fn thin_page() -> String {
    "<html><body><article><p>Page not found.</p></article></body></html>".to_string()
}

/// Listing of `<li>` entries, one per `(href, title)`
pub fn list_page(entries: &[(String, String)]) -> String {
    let items: String = entries
        .iter()
        .map(|(href, title)| format!("<li><a href=\"{href}\">{title}</a></li>"))
        .collect();
    format!("<html><body><div class=\"main\"><ul>{items}</ul></div></body></html>")
}

/// Listing of `<article>` entries, one per `(href, title)`
pub fn article_list_page(entries: &[(String, String)]) -> String {
    let items: String = entries
        .iter()
        .map(|(href, title)| format!("<article><a href=\"{href}\">{title}</a></article>"))
        .collect();
    format!("<html><body><section>{items}</section></body></html>")
}

/// `n` entries linking to `/news/{i}.html`
pub fn numbered_entries(n: usize) -> Vec<(String, String)> {
    (1..=n)
        .map(|i| {
            (
                format!("/news/{i}.html"),
                format!("Market headline number {i} for today"),
            )
        })
        .collect()
}

/// HTML source descriptor with default field rules
pub fn html_source(base_url: &str, list_path: &str, item_selector: &str) -> SourceConfig {
    SourceConfig {
        base_url: Some(base_url.to_string()),
        list: RequestConfig {
            url: format!("{base_url}{list_path}"),
            item_selector: item_selector.to_string(),
            fields: FieldMap::default(),
            ..Default::default()
        },
        search: None,
    }
}

/// Extraction settings with short timeouts
pub fn fast_settings() -> (ExtractionSettings, CheckerSettings) {
    let extraction = ExtractionSettings {
        list_timeout: Duration::from_secs(5),
        ..Default::default()
    };
    let checker = CheckerSettings {
        timeout: Duration::from_secs(2),
        retries: 0,
        ..Default::default()
    };
    (extraction, checker)
}

pub fn crawler_with(fetcher: Arc<dyn PageFetcher>) -> ConfigurableHtmlCrawler {
    let (extraction, checker) = fast_settings();
    ConfigurableHtmlCrawler::new(fetcher, extraction, checker)
}

/// In-process fetcher serving canned bodies and counting requests
///
/// Unknown URLs fail with a 404 status. Every request sleeps briefly so
/// concurrent requests overlap and the in-flight peak is observable.
#[derive(Default)]
pub struct CountingFetcher {
    pages: Mutex<HashMap<String, String>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, url: impl Into<String>, body: impl Into<String>) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert(url.into(), body.into());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for CountingFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        self.calls.lock().unwrap().push(request.url.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(5)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.pages
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}
