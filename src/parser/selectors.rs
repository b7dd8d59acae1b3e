//! Ordered selector lists used by the extraction stages
//!
//! Every heuristic list lives here as plain data so the order can be read
//! and tested in one place: fallback item selectors, chrome to strip from
//! article pages, content containers to try, and ancestors that disqualify
//! a list item.

use lazy_static::lazy_static;
use scraper::Selector;

// Helper macro to parse selectors safely at compile time
macro_rules! parse_selector {
    ($s:expr) => {
        Selector::parse($s).expect(concat!("Invalid CSS selector: ", $s))
    };
}

/// Generic item selectors tried in order when the configured one matches nothing
pub const FALLBACK_ITEM_SELECTORS: &[&str] = &[
    "ul li",
    "ol li",
    "article",
    "[class*='item']",
    "[class*='news']",
    "[class*='list'] > *",
    "li a",
];

/// The fallback that must be re-targeted to its list-item ancestor
pub const ANCHOR_IN_LIST_ITEM: &str = "li a";

/// Content containers tried in order on an article page
pub const CONTENT_CONTAINERS: &[&str] = &[
    "article",
    ".article",
    ".article-content",
    ".article-body",
    ".content",
    ".post-content",
    ".entry-content",
    ".news-content",
    ".detail",
    ".main-content",
    "#content",
    "#article",
    "main",
    "[role='main']",
];

/// Structural ancestors that mark a list element as navigation/boilerplate
pub const EXCLUDED_ANCESTORS: &[&str] = &[
    "nav",
    "header",
    "footer",
    "aside",
    ".nav",
    ".navbar",
    ".navigation",
    ".header",
    ".footer",
    ".sidebar",
    ".side-bar",
    ".menu",
    ".breadcrumb",
    ".breadcrumbs",
    "[role='navigation']",
    "[role='banner']",
    "[role='contentinfo']",
    "[role='complementary']",
];

/// Iframe hosts that indicate an embedded video player
pub const VIDEO_IFRAME_HOSTS: &[&str] = &[
    "youtube.com",
    "youtube-nocookie.com",
    "youtu.be",
    "player.vimeo.com",
    "bilibili.com",
    "player.bilibili.com",
    "v.qq.com",
    "youku.com",
    "ixigua.com",
    "douyin.com",
    "iqiyi.com",
    "dailymotion.com",
];

lazy_static! {
    /// Elements never considered part of article text
    pub static ref NOISE_ELEMENTS: Vec<Selector> = vec![
        parse_selector!("script"),
        parse_selector!("style"),
        parse_selector!("noscript"),
        parse_selector!("iframe"),
        parse_selector!("template"),
        parse_selector!("svg"),
    ];

    /// Page chrome stripped before looking for article text
    pub static ref CHROME_ELEMENTS: Vec<Selector> = {
        let mut selectors: Vec<Selector> = EXCLUDED_ANCESTORS
            .iter()
            .filter_map(|s| Selector::parse(s).ok())
            .collect();
        selectors.extend(
            [
                ".ad",
                ".ads",
                ".advert",
                ".advertisement",
                "[class^='ad-']",
                "[id^='ad-']",
                ".banner",
                ".share",
                ".comment",
                ".comments",
                ".related",
                ".recommend",
                ".copyright",
            ]
            .iter()
            .filter_map(|s| Selector::parse(s).ok()),
        );
        selectors
    };

    /// Parsed [`CONTENT_CONTAINERS`]
    pub static ref CONTENT_CONTAINER_SELECTORS: Vec<Selector> = CONTENT_CONTAINERS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();

    /// Parsed [`EXCLUDED_ANCESTORS`]
    pub static ref EXCLUDED_ANCESTOR_SELECTORS: Vec<Selector> = EXCLUDED_ANCESTORS
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect();

    /// Text-bearing blocks accumulated inside a content container
    pub static ref TEXT_BLOCKS: Selector =
        parse_selector!("p, h1, h2, h3, h4, h5, h6, li, blockquote, pre");

    pub static ref LIST_ITEM: Selector = parse_selector!("li");
    pub static ref LISTS: Selector = parse_selector!("ul, ol");
    pub static ref VIDEO: Selector = parse_selector!("video, video source");
    pub static ref IFRAME: Selector = parse_selector!("iframe[src]");
    pub static ref VIDEO_HINT: Selector =
        parse_selector!("[class*='video'], [id*='video'], [class*='Video'], [id*='Video']");
}
