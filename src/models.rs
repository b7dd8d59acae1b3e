// Core data structures for the hotsift pipeline

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ErrorCategory;

/// HTTP method for a request descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Static request body attached to a descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(BTreeMap<String, String>),
    Raw(String),
}

/// Extraction rule for one field of a list item
///
/// With no selector the rule reads the item element itself. With no
/// attribute it reads trimmed text. A regex is applied to the raw value and
/// yields capture group 1, or the whole match when the pattern has no group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldRule {
    pub selector: Option<String>,
    pub attribute: Option<String>,
    pub regex: Option<String>,
}

impl FieldRule {
    /// Rule matching text of the first element matched by `selector`
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Default::default()
        }
    }

    /// Rule reading `attribute` from the first element matched by `selector`
    pub fn attr(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            attribute: Some(attribute.into()),
            regex: None,
        }
    }

    /// Whether the rule has nothing configured at all
    pub fn is_empty(&self) -> bool {
        self.selector.is_none() && self.attribute.is_none() && self.regex.is_none()
    }
}

/// Field map of a list descriptor. `title` is mandatory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMap {
    #[serde(default)]
    pub title: FieldRule,
    #[serde(default)]
    pub url: Option<FieldRule>,
    #[serde(default)]
    pub mobile_url: Option<FieldRule>,
    #[serde(default)]
    pub published_at: Option<FieldRule>,
    #[serde(default)]
    pub summary: Option<FieldRule>,
}

/// Synchronous filter policy of a list descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterPolicy {
    pub min_title_length: usize,
    pub max_title_length: usize,
    pub require_url: bool,
    pub exclude_title_patterns: Vec<String>,
    pub exclude_url_patterns: Vec<String>,
    pub exclude_ancestors: Vec<String>,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            min_title_length: 3,
            max_title_length: 200,
            require_url: true,
            exclude_title_patterns: Vec::new(),
            exclude_url_patterns: Vec::new(),
            exclude_ancestors: Vec::new(),
        }
    }
}

/// One request descriptor: where to fetch and how to read items from it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<RequestBody>,
    #[serde(default)]
    pub item_selector: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default)]
    pub filter: FilterPolicy,
}

impl RequestConfig {
    /// Copy of this descriptor with `{keyword}` substituted
    ///
    /// The keyword is percent-encoded in the URL and kept raw in params,
    /// headers and body (those are encoded by the HTTP client).
    pub fn with_keyword(&self, keyword: &str) -> Self {
        const PLACEHOLDER: &str = "{keyword}";
        let encoded: String = url::form_urlencoded::byte_serialize(keyword.as_bytes()).collect();

        let mut out = self.clone();
        out.url = self.url.replace(PLACEHOLDER, &encoded);
        for value in out.params.values_mut() {
            *value = value.replace(PLACEHOLDER, keyword);
        }
        for value in out.headers.values_mut() {
            *value = value.replace(PLACEHOLDER, keyword);
        }
        out.body = self.body.as_ref().map(|body| match body {
            RequestBody::Raw(raw) => RequestBody::Raw(raw.replace(PLACEHOLDER, keyword)),
            RequestBody::Form(form) => RequestBody::Form(
                form.iter()
                    .map(|(k, v)| (k.clone(), v.replace(PLACEHOLDER, keyword)))
                    .collect(),
            ),
            RequestBody::Json(value) => RequestBody::Json(substitute_json(value, keyword)),
        });
        out
    }
}

fn substitute_json(value: &serde_json::Value, keyword: &str) -> serde_json::Value {
    use serde_json::Value;
    match value {
        Value::String(s) => Value::String(s.replace("{keyword}", keyword)),
        Value::Array(items) => Value::Array(items.iter().map(|v| substitute_json(v, keyword)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_json(v, keyword)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Immutable description of one scrapeable HTML source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    pub list: RequestConfig,
    #[serde(default)]
    pub search: Option<RequestConfig>,
}

/// Description of a JSON hot-list endpoint
///
/// Item fields are JSON pointers (RFC 6901) relative to each entry of the
/// array found at `items_pointer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonApiConfig {
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub params: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<RequestBody>,
    /// Pointer to the item array; empty means the document root
    #[serde(default)]
    pub items_pointer: String,
    #[serde(default = "default_title_pointer")]
    pub title_pointer: String,
    #[serde(default)]
    pub url_pointer: Option<String>,
    #[serde(default)]
    pub mobile_url_pointer: Option<String>,
    #[serde(default)]
    pub published_at_pointer: Option<String>,
    #[serde(default)]
    pub summary_pointer: Option<String>,
    /// Template for item URLs, `{value}` is replaced by the `url_pointer` value
    #[serde(default)]
    pub url_template: Option<String>,
    /// Search endpoint; `{keyword}` is substituted like in HTML descriptors
    #[serde(default)]
    pub search_url: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

fn default_title_pointer() -> String {
    "/title".to_string()
}

/// Externally visible unit produced by a source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_url: Option<String>,
    /// 1-based position among accepted items
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
}

impl NewsItem {
    /// Key used to merge items from several requests of one source
    pub fn dedup_key(&self) -> String {
        self.url.clone().unwrap_or_else(|| self.title.clone())
    }
}

/// Outcome of checking whether a candidate's target page has real content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentCheckResult {
    pub has_content: bool,
    pub has_text: bool,
    pub has_video: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_snippet: Option<String>,
}

impl ContentCheckResult {
    /// Negative result carrying a reason
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }
}

/// Named rule-set of normal, required and excluded words
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGroup {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub words: Vec<String>,
    #[serde(default)]
    pub required_words: Vec<String>,
    #[serde(default)]
    pub excluded_words: Vec<String>,
    /// Lower number = higher precedence
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl KeywordGroup {
    /// Build a group from a mixed word list (`+word` required, `!word` excluded)
    pub fn from_rule_lines<I, S>(id: i64, name: impl Into<String>, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut group = Self {
            id,
            name: name.into(),
            enabled: true,
            ..Default::default()
        };

        for line in lines {
            let word = line.as_ref().trim();
            if let Some(required) = word.strip_prefix('+') {
                group.required_words.push(required.trim().to_string());
            } else if let Some(excluded) = word.strip_prefix('!') {
                group.excluded_words.push(excluded.trim().to_string());
            } else if !word.is_empty() {
                group.words.push(word.to_string());
            }
        }

        group
    }
}

/// Result of matching one title against the keyword groups
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub matched: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_group: Option<KeywordGroup>,
    #[serde(default)]
    pub matched_words: Vec<String>,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self::default()
    }
}

/// Appearance history of one matched item, input to the weight calculator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsMatchData {
    /// Rank recorded at every appearance
    pub ranks: Vec<u32>,
    /// Number of times the item matched a keyword group
    pub match_count: u32,
}

/// Result of one source in a crawl run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    pub success: bool,
    pub platform_id: String,
    #[serde(default)]
    pub data: Vec<NewsItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,
}

impl BatchResult {
    /// `success` is true iff at least one item was produced
    pub fn from_items(platform_id: impl Into<String>, data: Vec<NewsItem>) -> Self {
        Self {
            success: !data.is_empty(),
            platform_id: platform_id.into(),
            data,
            error: None,
            error_category: None,
        }
    }

    pub fn failure(
        platform_id: impl Into<String>,
        error: impl Into<String>,
        category: ErrorCategory,
    ) -> Self {
        Self {
            success: false,
            platform_id: platform_id.into(),
            data: Vec::new(),
            error: Some(error.into()),
            error_category: Some(category),
        }
    }
}

/// Failure entry for progress reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFailure {
    pub platform_id: String,
    pub error: String,
}

/// Running counters of a crawl, readable while the crawl is in progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlProgress {
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<String>,
    #[serde(default)]
    pub failures: Vec<PlatformFailure>,
}

/// Aggregate outcome of a crawl run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlReport {
    pub success_count: usize,
    pub failed_count: usize,
    pub results: Vec<BatchResult>,
}
