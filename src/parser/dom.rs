//! Typed node handles over a parsed HTML tree
//!
//! [`Document`] owns the parsed tree, [`Node`] is a cheap copyable handle to
//! one element in it. Everything the extraction stages need from the DOM
//! goes through `find`, `text` and `attr` here, so the rest of the crate
//! never touches `scraper` internals directly.
//!
//! A `Document` is not `Send`; parse, extract and drop it before awaiting.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use crate::utils::error::ParseError;
use crate::utils::normalize_whitespace;

/// Parse a selector string, mapping failures to [`ParseError::InvalidSelector`]
pub fn parse_selector(selector: &str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|_| ParseError::InvalidSelector(selector.to_string()))
}

/// Parse a list of selectors, silently dropping the ones that do not parse
pub fn parse_selector_list(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(sel) => Some(sel),
            Err(_) => {
                tracing::warn!(selector = %s, "Ignoring invalid selector");
                None
            }
        })
        .collect()
}

/// A parsed HTML document
pub struct Document {
    html: Html,
}

impl Document {
    /// Parse a full HTML document
    ///
    /// # Errors
    ///
    /// Returns `ParseError::MalformedInput` for an empty body; html5ever
    /// recovers from everything else.
    pub fn parse(html: &str) -> Result<Self, ParseError> {
        if html.trim().is_empty() {
            return Err(ParseError::MalformedInput("empty document".to_string()));
        }
        Ok(Self {
            html: Html::parse_document(html),
        })
    }

    /// The `<html>` element
    pub fn root(&self) -> Node<'_> {
        Node {
            el: self.html.root_element(),
        }
    }

    /// The `<body>` element, or the root when there is none
    pub fn body(&self) -> Node<'_> {
        static BODY: std::sync::LazyLock<Option<Selector>> =
            std::sync::LazyLock::new(|| Selector::parse("body").ok());
        BODY.as_ref()
            .and_then(|sel| self.html.select(sel).next())
            .map(|el| Node { el })
            .unwrap_or_else(|| self.root())
    }

    /// All elements matching `selector` in document order
    pub fn find(&self, selector: &str) -> Result<Vec<Node<'_>>, ParseError> {
        let sel = parse_selector(selector)?;
        Ok(self.select(&sel))
    }

    /// All elements matching a pre-parsed selector
    pub fn select(&self, selector: &Selector) -> Vec<Node<'_>> {
        self.html.select(selector).map(|el| Node { el }).collect()
    }

    /// Class names ranked by how many elements carry them (most frequent first)
    ///
    /// Ties are broken alphabetically so the ranking is deterministic.
    pub fn class_frequencies(&self) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for node in self.root().descendants() {
            for class in node.el.value().classes() {
                *counts.entry(class).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(class, count)| (class.to_string(), count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }
}

/// Handle to one element of a [`Document`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Node<'a> {
    el: ElementRef<'a>,
}

impl<'a> Node<'a> {
    /// Lower-case tag name
    pub fn tag(&self) -> &'a str {
        self.el.value().name()
    }

    /// Attribute value, if present
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.el.value().attr(name)
    }

    /// Non-empty trimmed attribute value
    pub fn attr_non_empty(&self, name: &str) -> Option<String> {
        self.attr(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// `id` attribute
    pub fn id_attr(&self) -> Option<&'a str> {
        self.el.value().id()
    }

    /// Class names of this element
    pub fn classes(&self) -> impl Iterator<Item = &'a str> {
        self.el.value().classes()
    }

    /// Whitespace-normalized text of this element and its descendants
    pub fn text(&self) -> String {
        normalize_whitespace(&self.el.text().collect::<String>())
    }

    /// Text with descendants for which `skip` returns true left out
    pub fn text_without(&self, skip: &dyn Fn(Node<'a>) -> bool) -> String {
        let mut out = String::new();
        collect_text(self.el, skip, &mut out);
        normalize_whitespace(&out)
    }

    /// Whether this element matches `selector`
    pub fn is(&self, selector: &Selector) -> bool {
        selector.matches(&self.el)
    }

    /// Descendant elements matching `selector` (excluding this element)
    pub fn select(&self, selector: &Selector) -> Vec<Node<'a>> {
        let this = self.el;
        self.el
            .select(selector)
            .filter(|el| *el != this)
            .map(|el| Node { el })
            .collect()
    }

    /// First descendant matching `selector`
    pub fn select_first(&self, selector: &Selector) -> Option<Node<'a>> {
        let this = self.el;
        self.el
            .select(selector)
            .find(|el| *el != this)
            .map(|el| Node { el })
    }

    /// Descendants matching a selector string
    pub fn find(&self, selector: &str) -> Result<Vec<Node<'a>>, ParseError> {
        let sel = parse_selector(selector)?;
        Ok(self.select(&sel))
    }

    /// All descendant elements, depth first
    pub fn descendants(&self) -> impl Iterator<Item = Node<'a>> {
        self.el
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .map(|el| Node { el })
    }

    /// Parent elements from the nearest outwards
    pub fn ancestors(&self) -> impl Iterator<Item = Node<'a>> {
        self.el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .map(|el| Node { el })
    }

    /// Nearest ancestor (not self) matching `selector`
    pub fn closest_ancestor(&self, selector: &Selector) -> Option<Node<'a>> {
        self.ancestors().find(|n| n.is(selector))
    }

    /// Whether this element or any ancestor matches one of `selectors`
    pub fn is_within(&self, selectors: &[Selector]) -> bool {
        std::iter::once(*self)
            .chain(self.ancestors())
            .any(|n| selectors.iter().any(|s| n.is(s)))
    }

    /// Descendant `<a href>` links
    pub fn links(&self) -> Vec<Node<'a>> {
        self.select(&LINK)
    }

    /// First descendant `<a href>` link
    pub fn first_link(&self) -> Option<Node<'a>> {
        self.select_first(&LINK)
    }

    /// Whether this element is itself a link with an href
    pub fn is_link(&self) -> bool {
        self.tag() == "a" && self.attr("href").is_some()
    }

    /// Raw inner HTML
    pub fn inner_html(&self) -> String {
        self.el.inner_html()
    }
}

lazy_static::lazy_static! {
    static ref LINK: Selector = Selector::parse("a[href]").expect("Invalid CSS selector: a[href]");
}

fn collect_text<'a>(el: ElementRef<'a>, skip: &dyn Fn(Node<'a>) -> bool, out: &mut String) {
    for child in el.children() {
        match child.value() {
            scraper::Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            scraper::Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if skip(Node { el: child_el }) {
                        continue;
                    }
                    collect_text(child_el, skip, out);
                }
            }
            _ => {}
        }
    }
}
