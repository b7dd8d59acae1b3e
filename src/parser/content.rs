//! Article page analysis
//!
//! Decides from a fetched page whether it carries real content: enough
//! article text once page chrome is stripped, or an embedded video. Pure
//! and synchronous; the network side lives in `crawler::content`.

use serde::{Deserialize, Serialize};

use super::dom::{Document, Node};
use super::sanitize::sanitize_text;
use super::selectors::{
    CHROME_ELEMENTS, CONTENT_CONTAINER_SELECTORS, IFRAME, LISTS, LIST_ITEM, NOISE_ELEMENTS,
    TEXT_BLOCKS, VIDEO, VIDEO_HINT, VIDEO_IFRAME_HOSTS,
};
use crate::models::ContentCheckResult;
use crate::utils::char_len;

/// Boilerplate phrases that mark a short block as page furniture
const BOILERPLATE_PHRASES: &[&str] = &[
    "首页",
    "登录",
    "注册",
    "关于我们",
    "联系我们",
    "版权所有",
    "上一篇",
    "下一篇",
    "返回顶部",
    "分享到",
    "扫一扫",
    "免责声明",
    "copyright",
    "all rights reserved",
    "privacy policy",
    "terms of use",
    "share this",
    "sign in",
];

/// Thresholds of the page analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentRules {
    /// Accumulated characters needed to count as text content
    pub min_text_chars: usize,
    /// Link text / block text above which a short block is dropped
    pub link_density_threshold: f64,
    /// Blocks shorter than this are subject to the link-density rule
    pub short_block_chars: usize,
    /// Boilerplate phrases are only checked in blocks up to this length
    pub boilerplate_block_chars: usize,
    /// Lists whose links per item exceed this are treated as navigation
    pub nav_list_ratio: f64,
    /// Length of the snippet kept from accepted text
    pub snippet_chars: usize,
}

impl Default for ContentRules {
    fn default() -> Self {
        Self {
            min_text_chars: 80,
            link_density_threshold: 0.3,
            short_block_chars: 50,
            boilerplate_block_chars: 30,
            nav_list_ratio: 0.7,
            snippet_chars: 200,
        }
    }
}

/// Analyze a fetched article page
pub fn analyze_page(html: &str, rules: &ContentRules) -> ContentCheckResult {
    let Ok(doc) = Document::parse(html) else {
        return ContentCheckResult::rejected("空白页面");
    };

    let has_video = detect_video(&doc);
    let text = container_text(&doc, rules).or_else(|| body_text(&doc, rules));

    let has_text = text.is_some();
    let has_content = has_text || has_video;
    let reason = if has_content {
        None
    } else {
        Some("正文内容不足".to_string())
    };

    ContentCheckResult {
        has_content,
        has_text,
        has_video,
        reason,
        text_snippet: text.map(|t| t.chars().take(rules.snippet_chars).collect()),
    }
}

fn is_stripped(node: Node<'_>) -> bool {
    NOISE_ELEMENTS.iter().any(|s| node.is(s)) || CHROME_ELEMENTS.iter().any(|s| node.is(s))
}

fn in_stripped(node: Node<'_>) -> bool {
    node.is_within(&NOISE_ELEMENTS) || node.is_within(&CHROME_ELEMENTS)
}

/// `<video>`, a known player iframe, or a video-hinted element outside chrome
fn detect_video(doc: &Document) -> bool {
    if !doc.select(&VIDEO).is_empty() {
        return true;
    }

    let player_iframe = doc.select(&IFRAME).into_iter().any(|frame| {
        frame
            .attr("src")
            .and_then(|src| {
                let absolute = if src.starts_with("//") {
                    format!("https:{src}")
                } else {
                    src.to_string()
                };
                url::Url::parse(&absolute).ok()
            })
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| {
                VIDEO_IFRAME_HOSTS
                    .iter()
                    .any(|h| host == *h || host.ends_with(&format!(".{h}")))
            })
    });
    if player_iframe {
        return true;
    }

    doc.select(&VIDEO_HINT)
        .into_iter()
        .any(|n| !n.is_within(&CHROME_ELEMENTS))
}

/// Article text found inside the first content container that has enough of it
fn container_text(doc: &Document, rules: &ContentRules) -> Option<String> {
    for selector in CONTENT_CONTAINER_SELECTORS.iter() {
        let best = doc
            .select(selector)
            .into_iter()
            .filter(|c| !in_stripped(*c))
            .map(|c| accumulate_blocks(c, rules))
            .max_by_key(|text| char_len(text));

        if let Some(text) = best {
            if char_len(&text) >= rules.min_text_chars {
                return Some(text);
            }
        }
    }
    None
}

/// Join the outermost text blocks of `container`, skipping link-heavy and boilerplate ones
fn accumulate_blocks(container: Node<'_>, rules: &ContentRules) -> String {
    let blocks: Vec<Node<'_>> = container
        .select(&TEXT_BLOCKS)
        .into_iter()
        .filter(|b| !in_stripped(*b))
        .filter(|b| {
            // Outermost only: no other text block between it and the container
            !b.ancestors()
                .take_while(|a| *a != container)
                .any(|a| a.is(&TEXT_BLOCKS))
        })
        .collect();

    if blocks.is_empty() {
        let text = container.text_without(&is_stripped);
        return if keep_block(container, &text, rules) {
            text
        } else {
            String::new()
        };
    }

    let kept: Vec<String> = blocks
        .into_iter()
        .filter_map(|b| {
            let text = b.text_without(&is_stripped);
            keep_block(b, &text, rules).then_some(text)
        })
        .collect();
    sanitize_text(&kept.join("\n"))
}

fn keep_block(block: Node<'_>, text: &str, rules: &ContentRules) -> bool {
    let len = char_len(text);
    if len == 0 {
        return false;
    }

    if len < rules.short_block_chars {
        let link_chars: usize = block
            .links()
            .into_iter()
            .filter(|l| !in_stripped(*l))
            .map(|l| char_len(&l.text()))
            .sum();
        let link_chars = if block.is_link() { len } else { link_chars };
        if link_chars as f64 / len as f64 > rules.link_density_threshold {
            return false;
        }
    }

    if len <= rules.boilerplate_block_chars {
        let lower = text.to_lowercase();
        if BOILERPLATE_PHRASES.iter().any(|p| lower.contains(p)) {
            return false;
        }
    }

    true
}

/// Whole-body text with chrome and link-list navigation removed
fn body_text(doc: &Document, rules: &ContentRules) -> Option<String> {
    let skip = |node: Node<'_>| {
        is_stripped(node) || (node.is(&LISTS) && is_link_list(node, rules.nav_list_ratio))
    };
    let text = sanitize_text(&doc.body().text_without(&skip));
    (char_len(&text) >= rules.min_text_chars).then_some(text)
}

fn is_link_list(list: Node<'_>, ratio: f64) -> bool {
    let items = list.select(&LIST_ITEM).len();
    if items == 0 {
        return false;
    }
    list.links().len() as f64 / items as f64 > ratio
}
