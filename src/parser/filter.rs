//! Synchronous article filter
//!
//! Rejects candidates that are obviously not articles before any network
//! call is made: titles outside bounds, navigation links, excluded URLs and
//! items sitting inside page chrome.

use std::fmt;

use regex::Regex;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use super::dom::{parse_selector_list, Node};
use super::selectors::EXCLUDED_ANCESTOR_SELECTORS;
use crate::models::FilterPolicy;
use crate::utils::char_len;

/// URL patterns that never point at an article
pub const DEFAULT_EXCLUDED_URL_PATTERNS: &[&str] = &[
    r"^#",
    r"#[^/]*$",
    r"(?i)^(javascript|mailto|tel):",
    r"(?i)^https?://[^/?#]+/?$",
    r"(?i)/index\.(html?|php|aspx?|jsp)$",
    r"(?i)/(about|about-us|aboutus|contact|contact-us|contactus|login|signin|sign-in|logout|register|signup|sign-up|search|category|categories|tag|tags|archive|archives|feed|rss|sitemap)(\.(html?|php|xml))?/?(\?.*)?$",
    r"(?i)/(tag|tags|category|categories|archive|archives|search)/",
    r"(?i)sitemap[^/]*\.xml",
];

/// Navigational words that disqualify a short title when it is the whole title
pub const DEFAULT_NAV_KEYWORDS: &[&str] = &[
    "home", "about", "contact", "login", "log in", "sign in", "sign up", "register", "more",
    "back", "next", "prev", "search", "category", "tag", "tags", "archive", "links", "sitemap",
    "rss", "help", "privacy", "terms", "ads", "jobs", "首页", "主页", "关于", "关于我们",
    "联系", "联系我们", "登录", "注册", "更多", "查看更多", "返回", "搜索", "分类", "标签",
    "归档", "友情链接", "网站地图", "帮助", "隐私", "广告", "招聘", "新闻", "技术", "学术",
    "上一页", "下一页",
];

/// Global filter tuning shared by all sources
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterRules {
    /// Titles up to this many characters are checked against `nav_keywords`
    pub short_title_max_chars: usize,
    pub nav_keywords: Vec<String>,
    /// Appended to [`DEFAULT_EXCLUDED_URL_PATTERNS`]
    pub extra_excluded_url_patterns: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            short_title_max_chars: 5,
            nav_keywords: DEFAULT_NAV_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            extra_excluded_url_patterns: Vec::new(),
        }
    }
}

/// Why a candidate was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    TitleTooShort(usize),
    TitleTooLong(usize),
    TitleExcluded(String),
    NavigationTitle,
    MissingUrl,
    UrlExcluded(String),
    UnsupportedScheme(String),
    ExcludedAncestor,
}

impl RejectReason {
    /// Stable label for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::TitleTooShort(_) => "title_too_short",
            Self::TitleTooLong(_) => "title_too_long",
            Self::TitleExcluded(_) => "title_excluded",
            Self::NavigationTitle => "navigation_title",
            Self::MissingUrl => "missing_url",
            Self::UrlExcluded(_) => "url_excluded",
            Self::UnsupportedScheme(_) => "unsupported_scheme",
            Self::ExcludedAncestor => "excluded_ancestor",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TitleTooShort(n) => write!(f, "title too short ({n} chars)"),
            Self::TitleTooLong(n) => write!(f, "title too long ({n} chars)"),
            Self::TitleExcluded(p) => write!(f, "title matches excluded pattern {p}"),
            Self::NavigationTitle => write!(f, "navigation title"),
            Self::MissingUrl => write!(f, "missing url"),
            Self::UrlExcluded(p) => write!(f, "url matches excluded pattern {p}"),
            Self::UnsupportedScheme(s) => write!(f, "unsupported url scheme {s}"),
            Self::ExcludedAncestor => write!(f, "inside excluded ancestor"),
        }
    }
}

/// Result of [`ArticleFilter::is_valid_article`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    pub valid: bool,
    pub reason: Option<RejectReason>,
}

impl FilterVerdict {
    fn accept() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn reject(reason: RejectReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }
}

/// Compiled filter for one list descriptor
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    min_title: usize,
    max_title: usize,
    require_url: bool,
    short_title_max: usize,
    nav_title: Option<Regex>,
    title_excludes: Vec<Regex>,
    url_excludes: Vec<Regex>,
    ancestor_excludes: Vec<Selector>,
}

impl ArticleFilter {
    /// Compile `policy` together with the global `rules`
    ///
    /// Invalid patterns and selectors are logged and skipped.
    pub fn new(policy: &FilterPolicy, rules: &FilterRules) -> Self {
        let url_patterns = DEFAULT_EXCLUDED_URL_PATTERNS
            .iter()
            .map(|s| s.to_string())
            .chain(rules.extra_excluded_url_patterns.iter().cloned())
            .chain(policy.exclude_url_patterns.iter().cloned());

        let keywords: Vec<String> = rules
            .nav_keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        let nav_title = if keywords.is_empty() {
            None
        } else {
            Regex::new(&format!("(?i)^(?:{})$", keywords.join("|"))).ok()
        };

        let mut ancestor_excludes = EXCLUDED_ANCESTOR_SELECTORS.clone();
        ancestor_excludes.extend(parse_selector_list(&policy.exclude_ancestors));

        Self {
            min_title: policy.min_title_length,
            max_title: policy.max_title_length,
            require_url: policy.require_url,
            short_title_max: rules.short_title_max_chars,
            nav_title,
            title_excludes: compile_patterns(policy.exclude_title_patterns.iter().cloned()),
            url_excludes: compile_patterns(url_patterns),
            ancestor_excludes,
        }
    }

    /// Decide whether a candidate is worth verifying
    ///
    /// `element` is optional so callers without a DOM (JSON sources) can
    /// reuse the text and URL checks.
    pub fn is_valid_article(
        &self,
        title: &str,
        url: Option<&str>,
        element: Option<Node<'_>>,
    ) -> FilterVerdict {
        let title = title.trim();
        let len = char_len(title);
        if len < self.min_title {
            return FilterVerdict::reject(RejectReason::TitleTooShort(len));
        }
        if len > self.max_title {
            return FilterVerdict::reject(RejectReason::TitleTooLong(len));
        }
        if let Some(re) = self.title_excludes.iter().find(|re| re.is_match(title)) {
            return FilterVerdict::reject(RejectReason::TitleExcluded(re.as_str().to_string()));
        }
        if len <= self.short_title_max && self.nav_title.as_ref().is_some_and(|re| re.is_match(title)) {
            return FilterVerdict::reject(RejectReason::NavigationTitle);
        }

        match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(url) => {
                if let Some(re) = self.url_excludes.iter().find(|re| re.is_match(url)) {
                    return FilterVerdict::reject(RejectReason::UrlExcluded(re.as_str().to_string()));
                }
                match Url::parse(url) {
                    Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                    Ok(parsed) => {
                        return FilterVerdict::reject(RejectReason::UnsupportedScheme(
                            parsed.scheme().to_string(),
                        ))
                    }
                    Err(_) => {
                        return FilterVerdict::reject(RejectReason::UnsupportedScheme(
                            "relative".to_string(),
                        ))
                    }
                }
            }
            None if self.require_url => return FilterVerdict::reject(RejectReason::MissingUrl),
            None => {}
        }

        if let Some(el) = element {
            if el.ancestors().any(|a| self.ancestor_excludes.iter().any(|s| a.is(s))) {
                return FilterVerdict::reject(RejectReason::ExcludedAncestor);
            }
        }

        FilterVerdict::accept()
    }
}

fn compile_patterns(patterns: impl Iterator<Item = String>) -> Vec<Regex> {
    patterns
        .filter(|p| !p.is_empty())
        .filter_map(|p| match Regex::new(&p) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = %p, error = %e, "Ignoring invalid filter pattern");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::Document;

    fn filter() -> ArticleFilter {
        ArticleFilter::new(&FilterPolicy::default(), &FilterRules::default())
    }

    fn check(title: &str, url: Option<&str>) -> FilterVerdict {
        filter().is_valid_article(title, url, None)
    }

    const ARTICLE: &str = "https://news.example.com/2024/03/01/chip-prices.html";

    #[test]
    fn test_accepts_regular_article() {
        assert!(check("Phone chip prices fall again", Some(ARTICLE)).valid);
        assert!(check("手机芯片降价", Some(ARTICLE)).valid);
    }

    #[test]
    fn test_title_bounds() {
        assert_eq!(
            check("ab", Some(ARTICLE)).reason,
            Some(RejectReason::TitleTooShort(2))
        );
        let long = "x".repeat(201);
        assert_eq!(
            check(&long, Some(ARTICLE)).reason,
            Some(RejectReason::TitleTooLong(201))
        );
    }

    #[test]
    fn test_short_navigation_titles() {
        for title in ["首页", "More", "HOME", "新闻", "技术", "学术", "about"] {
            assert_eq!(
                check(title, Some(ARTICLE)).reason,
                Some(RejectReason::NavigationTitle),
                "{title}"
            );
        }
        // Whole-title match only
        assert!(check("新闻联播", Some(ARTICLE)).valid);
        // Longer than the short-title threshold
        assert!(check("More chips", Some(ARTICLE)).valid);
    }

    #[test]
    fn test_url_exclusions() {
        for url in [
            "https://news.example.com/",
            "https://news.example.com/index.html",
            "https://news.example.com/about",
            "https://news.example.com/tag/chips/",
            "https://news.example.com/list.html#top",
            "https://news.example.com/sitemap.xml",
            "javascript:void(0)",
            "mailto:editor@example.com",
        ] {
            let verdict = check("A perfectly normal headline", Some(url));
            assert!(!verdict.valid, "{url} should be excluded");
        }
    }

    #[test]
    fn test_query_string_articles_are_kept() {
        for url in [
            "https://www.example.cn/index.php?m=content&c=index&a=show&catid=2&id=1234",
            "https://blog.example.com/?p=4821",
            "https://news.example.com/index.html?id=998877",
        ] {
            let verdict = check("Chip prices fall for the third month", Some(url));
            assert!(verdict.valid, "{url} rejected: {:?}", verdict.reason);
        }
        // The bare site root and index page are still navigation
        assert!(!check("Chip prices fall for the third month", Some("https://blog.example.com")).valid);
        assert!(!check("Chip prices fall for the third month", Some("https://blog.example.com/index.php")).valid);
    }

    #[test]
    fn test_missing_url() {
        assert_eq!(
            check("A perfectly normal headline", None).reason,
            Some(RejectReason::MissingUrl)
        );

        let lenient = FilterPolicy {
            require_url: false,
            ..Default::default()
        };
        let f = ArticleFilter::new(&lenient, &FilterRules::default());
        assert!(f.is_valid_article("A perfectly normal headline", None, None).valid);
    }

    #[test]
    fn test_non_http_scheme() {
        assert_eq!(
            check("A perfectly normal headline", Some("ftp://example.com/a.txt")).reason,
            Some(RejectReason::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn test_configured_exclusions() {
        let policy = FilterPolicy {
            exclude_title_patterns: vec!["^广告".to_string(), "([".to_string()],
            exclude_url_patterns: vec![r"/video/".to_string()],
            ..Default::default()
        };
        let f = ArticleFilter::new(&policy, &FilterRules::default());
        assert!(!f.is_valid_article("广告：手机芯片大促销", Some(ARTICLE), None).valid);
        assert!(
            !f.is_valid_article("A normal headline", Some("https://x.com/video/1.html"), None)
                .valid
        );
        assert!(f.is_valid_article("A normal headline", Some(ARTICLE), None).valid);
    }

    #[test]
    fn test_excluded_ancestors() {
        let html = r#"<html><body>
            <nav><ul><li class="n"><a href="/a">Navigation story headline</a></li></ul></nav>
            <div class="promo"><ul><li class="p"><a href="/b">Promoted story headline</a></li></ul></div>
            <main><ul><li class="m"><a href="/c">Main story headline</a></li></ul></main>
        </body></html>"#;
        let doc = Document::parse(html).unwrap();
        let policy = FilterPolicy {
            exclude_ancestors: vec![".promo".to_string()],
            ..Default::default()
        };
        let f = ArticleFilter::new(&policy, &FilterRules::default());

        let nav = doc.find("li.n").unwrap()[0];
        let promo = doc.find("li.p").unwrap()[0];
        let main = doc.find("li.m").unwrap()[0];
        assert_eq!(
            f.is_valid_article("Navigation story headline", Some(ARTICLE), Some(nav)).reason,
            Some(RejectReason::ExcludedAncestor)
        );
        assert!(!f.is_valid_article("Promoted story headline", Some(ARTICLE), Some(promo)).valid);
        assert!(f.is_valid_article("Main story headline", Some(ARTICLE), Some(main)).valid);
    }
}
