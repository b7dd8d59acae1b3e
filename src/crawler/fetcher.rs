//! HTTP fetcher with rate limiting, proxy fallback and charset detection
//!
//! Every page the pipeline reads goes through a [`PageFetcher`]. The HTTP
//! implementation adds:
//! - User-Agent rotation and browser headers with a derived Referer/Origin
//! - Rate limiting with governor
//! - Retry of transient failures with exponential backoff
//! - An optional proxy client tried when the direct request fails
//! - Charset detection (header, meta tag, UTF-8, then GB18030)

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use encoding_rs::{Encoding, GB18030, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{Client, Proxy, RequestBuilder, Response};
use tracing::{debug, warn};

use super::headers::{apply_custom_headers, build_browser_headers, random_user_agent};
use crate::models::{HttpMethod, RequestBody, RequestConfig};
use crate::utils::error::FetchError;

/// Everything needed to issue one page request
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: BTreeMap<String, String>,
    pub params: BTreeMap<String, String>,
    pub body: Option<RequestBody>,
    pub referer: Option<String>,
    pub timeout: Duration,
    /// Extra attempts after the first, for transient failures only
    pub retries: u32,
}

impl FetchRequest {
    /// Plain GET with a timeout
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            body: None,
            referer: None,
            timeout,
            retries: 0,
        }
    }

    /// Request described by a list/search descriptor
    pub fn from_config(config: &RequestConfig, timeout: Duration) -> Self {
        Self {
            url: config.url.clone(),
            method: config.method,
            headers: config.headers.clone(),
            params: config.params.clone(),
            body: config.body.clone(),
            referer: None,
            timeout,
            retries: 0,
        }
    }

    pub fn with_referer(mut self, referer: Option<String>) -> Self {
        self.referer = referer;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }
}

/// Source of page bodies
///
/// The pipeline only depends on this trait so tests can count and script
/// requests without a network.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch and decode one page
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError>;
}

/// Settings of [`HttpFetcher`]
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub requests_per_second: u32,
    pub default_timeout: Duration,
    /// Fixed user agent; rotates through the built-in pool when `None`
    pub user_agent: Option<String>,
    pub proxy_url: Option<String>,
    pub retry_base_delay_ms: u64,
}

impl Default for FetcherSettings {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            default_timeout: Duration::from_secs(15),
            user_agent: None,
            proxy_url: None,
            retry_base_delay_ms: 500,
        }
    }
}

/// reqwest-backed [`PageFetcher`]
pub struct HttpFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Client routed through the configured proxy, tried after a direct failure
    proxy_client: Option<Client>,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    user_agent: Option<String>,

    /// Base delay in milliseconds for exponential backoff
    base_delay_ms: u64,
}

impl HttpFetcher {
    /// Create a fetcher with default settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(requests_per_second: u32) -> Result<Self, FetchError> {
        Self::with_settings(FetcherSettings {
            requests_per_second,
            ..Default::default()
        })
    }

    /// Create a fetcher with custom settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if a client cannot be created, or
    /// `FetchError::Proxy` for an unusable proxy URL
    pub fn with_settings(settings: FetcherSettings) -> Result<Self, FetchError> {
        let client = Self::client_builder(settings.default_timeout).build()?;

        let proxy_client = match settings.proxy_url.as_deref().filter(|p| !p.is_empty()) {
            Some(proxy_url) => {
                let proxy = Proxy::all(proxy_url)
                    .map_err(|e| FetchError::Proxy(format!("{proxy_url}: {e}")))?;
                Some(
                    Self::client_builder(settings.default_timeout)
                        .proxy(proxy)
                        .build()?,
                )
            }
            None => None,
        };

        let rate = NonZeroU32::new(settings.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            proxy_client,
            rate_limiter,
            user_agent: settings.user_agent,
            base_delay_ms: settings.retry_base_delay_ms,
        })
    }

    fn client_builder(timeout: Duration) -> reqwest::ClientBuilder {
        Client::builder()
            .timeout(timeout)
            .gzip(true)
            .deflate(true)
            .cookie_store(true)
    }

    fn build_request(&self, client: &Client, request: &FetchRequest) -> RequestBuilder {
        let user_agent = self.user_agent.as_deref().unwrap_or_else(|| random_user_agent());
        let mut headers = build_browser_headers(user_agent, request.referer.as_deref());
        apply_custom_headers(&mut headers, &request.headers);

        let mut builder = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
        };
        builder = builder.headers(headers).timeout(request.timeout);
        if !request.params.is_empty() {
            builder = builder.query(&request.params);
        }
        match &request.body {
            Some(RequestBody::Json(value)) => builder.json(value),
            Some(RequestBody::Form(form)) => builder.form(form),
            Some(RequestBody::Raw(raw)) => builder.body(raw.clone()),
            None => builder,
        }
    }

    async fn send_once(&self, client: &Client, request: &FetchRequest) -> Result<String, FetchError> {
        let response = self.build_request(client, request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        decode_response(response).await
    }

    /// Direct attempt, then the proxy client when one is configured
    async fn attempt(&self, request: &FetchRequest) -> Result<String, FetchError> {
        match self.send_once(&self.client, request).await {
            Ok(body) => Ok(body),
            Err(direct_err) => match &self.proxy_client {
                Some(proxy) if direct_err.is_transient() || matches!(direct_err, FetchError::Status(403)) => {
                    debug!(url = %request.url, error = %direct_err, "Direct request failed, retrying through proxy");
                    self.send_once(proxy, request).await
                }
                _ => Err(direct_err),
            },
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<String, FetchError> {
        if url::Url::parse(&request.url).is_err() {
            return Err(FetchError::InvalidUrl(request.url.clone()));
        }

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.base_delay_ms * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            // Wait for rate limiter
            self.rate_limiter.until_ready().await;

            match self.attempt(request).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < request.retries => {
                    warn!(url = %request.url, attempt, error = %e, "Fetch failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Decode response body using the declared or sniffed charset
async fn decode_response(response: Response) -> Result<String, FetchError> {
    // Get Content-Type header and convert to owned String before consuming response
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_default();

    let bytes = response.bytes().await?;
    Ok(decode_bytes(&bytes, &content_type))
}

/// Decode bytes to a string with charset detection
///
/// Strategies are tried strictly in this order, skipping repeats:
/// 1. `charset=` in the Content-Type header
/// 2. `<meta charset>` / `http-equiv` in the first 2 KiB
/// 3. UTF-8
/// 4. GB18030 (covers GBK and GB2312 pages that declare nothing)
///
/// When none decodes cleanly the first strategy is applied lossily, so a
/// single stray byte never costs the whole page.
pub fn decode_bytes(bytes: &[u8], content_type: &str) -> String {
    let head = &bytes[..bytes.len().min(2048)];
    let mut candidates: Vec<&'static Encoding> = Vec::with_capacity(4);
    for encoding in [
        charset_from_content_type(content_type),
        charset_from_meta(&String::from_utf8_lossy(head)),
        Some(UTF_8),
        Some(GB18030),
    ]
    .into_iter()
    .flatten()
    {
        if !candidates.contains(&encoding) {
            candidates.push(encoding);
        }
    }

    for encoding in &candidates {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            return text.into_owned();
        }
    }

    let fallback = candidates.first().copied().unwrap_or(UTF_8);
    let (text, _, _) = fallback.decode(bytes);
    warn!(encoding = fallback.name(), "Page has invalid byte sequences, decoded lossily");
    text.into_owned()
}

fn charset_from_content_type(content_type: &str) -> Option<&'static Encoding> {
    let lower = content_type.to_ascii_lowercase();
    let label = lower.split("charset=").nth(1)?;
    let label = label.split(';').next()?.trim().trim_matches('"');
    Encoding::for_label(label.as_bytes())
}

fn charset_from_meta(head: &str) -> Option<&'static Encoding> {
    let lower = head.to_ascii_lowercase();
    let idx = lower.find("charset=")?;
    let label: String = lower[idx + "charset=".len()..]
        .trim_start_matches(['"', '\''])
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    Encoding::for_label(label.as_bytes())
}
