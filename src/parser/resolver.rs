//! Item selector resolution with fallback discovery
//!
//! The configured item selector is tried first. When it matches nothing the
//! resolver walks [`FALLBACK_ITEM_SELECTORS`] and then, as a last resort,
//! the most frequent class names on the page. A fallback is only accepted
//! when enough of its elements look like article entries.

use std::fmt;

use scraper::Selector;
use tracing::{debug, info};

use super::dom::{Document, Node};
use super::selectors::{ANCHOR_IN_LIST_ITEM, FALLBACK_ITEM_SELECTORS, LIST_ITEM};
use crate::utils::char_len;

/// Where the selector that produced the item set came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorOrigin {
    Configured,
    Fallback,
    ClassFrequency,
    /// Nothing usable was found; the element set is empty
    Unresolved,
}

impl fmt::Display for SelectorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Configured => "configured",
            Self::Fallback => "fallback",
            Self::ClassFrequency => "class_frequency",
            Self::Unresolved => "unresolved",
        };
        write!(f, "{s}")
    }
}

/// The selector actually used for one extraction run
///
/// Returned alongside the elements instead of being written back into the
/// source config, so concurrent runs of one source never see each other's
/// fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSelector {
    pub selector: String,
    pub origin: SelectorOrigin,
}

/// Item elements plus the selector that found them
pub struct Resolution<'a> {
    pub resolved: ResolvedSelector,
    pub elements: Vec<Node<'a>>,
}

impl<'a> Resolution<'a> {
    fn new(selector: &str, origin: SelectorOrigin, elements: Vec<Node<'a>>) -> Self {
        Self {
            resolved: ResolvedSelector {
                selector: selector.to_string(),
                origin,
            },
            elements,
        }
    }
}

/// Finds the item elements of a listing page
#[derive(Debug, Clone)]
pub struct SelectorResolver {
    /// Viable elements a fallback must produce to be accepted
    pub min_elements: usize,
    /// Minimum text length of a viable element
    pub min_text_chars: usize,
    /// How many top class names the last resort tries
    pub class_candidates: usize,
}

impl Default for SelectorResolver {
    fn default() -> Self {
        Self {
            min_elements: 3,
            min_text_chars: 10,
            class_candidates: 10,
        }
    }
}

impl SelectorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the item elements of `doc`
    ///
    /// Never fails: an unusable configuration degrades to fallbacks, and a
    /// page with nothing list-like yields an empty [`SelectorOrigin::Unresolved`]
    /// resolution.
    pub fn resolve<'a>(&self, doc: &'a Document, item_selector: &str) -> Resolution<'a> {
        let configured = item_selector.trim();
        if !configured.is_empty() {
            match Selector::parse(configured) {
                Ok(sel) => {
                    let elements = doc.select(&sel);
                    if !elements.is_empty() {
                        debug!(selector = configured, count = elements.len(), "Configured selector matched");
                        return Resolution::new(configured, SelectorOrigin::Configured, elements);
                    }
                    info!(selector = configured, "Configured selector matched nothing, trying fallbacks");
                }
                Err(_) => {
                    info!(selector = configured, "Configured selector is invalid, trying fallbacks");
                }
            }
        }

        for fallback in FALLBACK_ITEM_SELECTORS {
            let Ok(sel) = Selector::parse(fallback) else {
                continue;
            };
            let mut elements = doc.select(&sel);
            if *fallback == ANCHOR_IN_LIST_ITEM {
                elements = retarget_to_list_items(elements);
            }

            let viable = self.viable(elements);
            if viable.len() >= self.min_elements {
                info!(selector = fallback, count = viable.len(), "Fallback selector accepted");
                return Resolution::new(fallback, SelectorOrigin::Fallback, viable);
            }
        }

        for (class, count) in doc
            .class_frequencies()
            .into_iter()
            .filter(|(class, count)| *count >= self.min_elements && is_plain_class(class))
            .take(self.class_candidates)
        {
            let selector = format!(".{class}");
            let Ok(sel) = Selector::parse(&selector) else {
                continue;
            };
            let viable = self.viable(doc.select(&sel));
            if viable.len() >= self.min_elements {
                info!(selector = %selector, frequency = count, "Class frequency selector accepted");
                return Resolution::new(&selector, SelectorOrigin::ClassFrequency, viable);
            }
        }

        info!("No item selector produced usable elements");
        Resolution::new(configured, SelectorOrigin::Unresolved, Vec::new())
    }

    /// Elements that contain a link and enough text to be an article entry
    fn viable<'a>(&self, elements: Vec<Node<'a>>) -> Vec<Node<'a>> {
        elements
            .into_iter()
            .filter(|n| {
                (n.is_link() || n.first_link().is_some()) && char_len(&n.text()) >= self.min_text_chars
            })
            .collect()
    }
}

/// Replace anchors by their nearest `li`, keeping document order and dropping repeats
fn retarget_to_list_items(anchors: Vec<Node<'_>>) -> Vec<Node<'_>> {
    let mut out: Vec<Node<'_>> = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        let item = anchor.closest_ancestor(&LIST_ITEM).unwrap_or(anchor);
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Class names usable in a `.class` selector without escaping
fn is_plain_class(class: &str) -> bool {
    let mut chars = class.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
