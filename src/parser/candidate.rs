//! Candidate extraction from resolved item elements
//!
//! Applies the field rules of a list descriptor to each item element and
//! falls back to link heuristics when a rule yields nothing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use scraper::Selector;
use tracing::{debug, warn};

use super::dom::Node;
use super::sanitize::sanitize_inline;
use crate::models::{FieldMap, FieldRule};
use crate::utils::resolve_url;

/// A list item that has not been filtered or verified yet
///
/// Borrows the element it came from so the filter can inspect ancestors.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub title: String,
    pub url: Option<String>,
    pub mobile_url: Option<String>,
    pub published_at: Option<String>,
    pub summary: Option<String>,
    pub element: Node<'a>,
}

/// Why an element produced no candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateError {
    EmptyTitle,
    UnresolvableUrl(String),
}

impl std::fmt::Display for CandidateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "empty title"),
            Self::UnresolvableUrl(href) => write!(f, "unresolvable url: {href}"),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CompiledRule {
    selector: Option<Selector>,
    attribute: Option<String>,
    regex: Option<Regex>,
}

impl CompiledRule {
    /// Compile leniently; a broken part is dropped so heuristics can take over
    fn compile(rule: &FieldRule, field: &str) -> Self {
        let selector = rule
            .selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| match Selector::parse(s) {
                Ok(sel) => Some(sel),
                Err(_) => {
                    warn!(field, selector = s, "Invalid field selector ignored");
                    None
                }
            });
        let regex = rule
            .regex
            .as_deref()
            .filter(|s| !s.is_empty())
            .and_then(|s| match Regex::new(s) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!(field, regex = s, error = %e, "Invalid field regex ignored");
                    None
                }
            });

        Self {
            selector,
            attribute: rule.attribute.clone().filter(|a| !a.is_empty()),
            regex,
        }
    }

    /// Value of the rule for `element`, `None` when blank
    ///
    /// `default_attribute` is read instead of text when the rule selects a
    /// sub-element without naming an attribute (`href` for URL fields).
    fn apply(&self, element: Node<'_>, default_attribute: Option<&str>) -> Option<String> {
        let target = match &self.selector {
            Some(sel) => element.select_first(sel)?,
            None => element,
        };

        let attribute = self
            .attribute
            .as_deref()
            .or(default_attribute.filter(|_| self.selector.is_some()));
        let raw = match attribute {
            Some(name) => target.attr(name)?.trim().to_string(),
            None => target.text(),
        };
        if raw.is_empty() {
            return None;
        }

        let value = match &self.regex {
            Some(re) => {
                let caps = re.captures(&raw)?;
                caps.get(1).or_else(|| caps.get(0))?.as_str().trim().to_string()
            }
            None => raw,
        };
        (!value.is_empty()).then_some(value)
    }
}

/// Turns item elements into [`Candidate`]s
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    title: CompiledRule,
    url: Option<CompiledRule>,
    mobile_url: Option<CompiledRule>,
    published_at: Option<CompiledRule>,
    summary: Option<CompiledRule>,
    base_url: Option<String>,
}

impl CandidateExtractor {
    /// Build an extractor for one field map
    ///
    /// `base_url` is what relative links are resolved against, normally
    /// the source base URL or the listing URL.
    pub fn new(fields: &FieldMap, base_url: Option<&str>) -> Self {
        let optional = |rule: &Option<FieldRule>, field: &str| {
            rule.as_ref()
                .filter(|r| !r.is_empty())
                .map(|r| CompiledRule::compile(r, field))
        };

        Self {
            title: CompiledRule::compile(&fields.title, "title"),
            url: optional(&fields.url, "url"),
            mobile_url: optional(&fields.mobile_url, "mobileUrl"),
            published_at: optional(&fields.published_at, "publishedAt"),
            summary: optional(&fields.summary, "summary"),
            base_url: base_url.map(str::to_string),
        }
    }

    /// Extract every element, dropping the ones that produce no candidate
    pub fn extract_all<'a>(&self, elements: &[Node<'a>]) -> Vec<Candidate<'a>> {
        elements
            .iter()
            .filter_map(|el| match self.extract(*el) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    debug!(reason = %e, "Element dropped during extraction");
                    None
                }
            })
            .collect()
    }

    /// Extract one element
    pub fn extract<'a>(&self, element: Node<'a>) -> Result<Candidate<'a>, CandidateError> {
        let title = self
            .title_rule_value(element)
            .or_else(|| heuristic_title(element))
            .map(|t| sanitize_inline(&t))
            .filter(|t| !t.is_empty())
            .ok_or(CandidateError::EmptyTitle)?;

        let href = self
            .url
            .as_ref()
            .and_then(|rule| rule.apply(element, Some("href")))
            .or_else(|| heuristic_href(element));
        let url = match href {
            Some(href) => Some(
                resolve_url(self.base_url.as_deref(), &href)
                    .ok_or(CandidateError::UnresolvableUrl(href))?,
            ),
            None => None,
        };

        let mobile_url = self
            .mobile_url
            .as_ref()
            .and_then(|rule| rule.apply(element, Some("href")))
            .and_then(|href| resolve_url(self.base_url.as_deref(), &href));

        let published_at = self
            .published_at
            .as_ref()
            .and_then(|rule| rule.apply(element, None))
            .map(|raw| normalize_published_at(&raw));

        let summary = self
            .summary
            .as_ref()
            .and_then(|rule| rule.apply(element, None))
            .map(|s| sanitize_inline(&s))
            .filter(|s| !s.is_empty());

        Ok(Candidate {
            title,
            url,
            mobile_url,
            published_at,
            summary,
            element,
        })
    }

    fn title_rule_value(&self, element: Node<'_>) -> Option<String> {
        if self.title.selector.is_none() && self.title.attribute.is_none() && self.title.regex.is_none() {
            return None;
        }
        self.title.apply(element, None)
    }
}

/// First link text, then its `title` attribute, then the element's own text
fn heuristic_title(element: Node<'_>) -> Option<String> {
    let link = if element.is_link() {
        Some(element)
    } else {
        element.first_link()
    };

    link.map(|l| l.text())
        .filter(|t| !t.is_empty())
        .or_else(|| link.and_then(|l| l.attr_non_empty("title")))
        .or_else(|| Some(element.text()).filter(|t| !t.is_empty()))
}

fn heuristic_href(element: Node<'_>) -> Option<String> {
    if element.is_link() {
        return element.attr_non_empty("href");
    }
    element.first_link().and_then(|l| l.attr_non_empty("href"))
}

/// Normalize a scraped date to RFC 3339
///
/// Understands RFC 3339, `YYYY-MM-DD HH:MM[:SS]` (also with `/` separators),
/// bare dates, and unix timestamps in seconds or milliseconds. Naive
/// values are taken as UTC. Anything else is returned unchanged.
pub fn normalize_published_at(raw: &str) -> String {
    let value = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return dt.to_rfc3339();
    }

    if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
        let parsed = match value.len() {
            10 => value.parse::<i64>().ok().and_then(|s| Utc.timestamp_opt(s, 0).single()),
            13 => value.parse::<i64>().ok().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            _ => None,
        };
        if let Some(dt) = parsed {
            return dt.to_rfc3339();
        }
    }

    let unified = value.replace('/', "-");
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&unified, format) {
            return Utc.from_utc_datetime(&naive).to_rfc3339();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(&unified, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Utc.from_utc_datetime(&naive).to_rfc3339();
        }
    }

    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::dom::Document;

    const LIST: &str = r#"<html><body><ul>
        <li class="item">
            <a href="/news/1.html" title="Full headline one">Headline one</a>
            <span class="time">发布于 2024-03-01 08:30</span>
            <p class="desc">Short summary</p>
        </li>
        <li class="item"><a href="/news/2.html" title="Only the title attr"></a></li>
        <li class="item"><span>No link at all here</span></li>
        <li class="item"><a href="http://[bad">Broken link</a></li>
    </ul></body></html>"#;

    fn items(doc: &Document) -> Vec<Node<'_>> {
        doc.find("li.item").unwrap()
    }

    #[test]
    fn test_heuristics_without_field_rules() {
        let doc = Document::parse(LIST).unwrap();
        let extractor = CandidateExtractor::new(&FieldMap::default(), Some("https://example.com/"));
        let els = items(&doc);

        let first = extractor.extract(els[0]).unwrap();
        assert_eq!(first.title, "Headline one");
        assert_eq!(first.url.as_deref(), Some("https://example.com/news/1.html"));

        let second = extractor.extract(els[1]).unwrap();
        assert_eq!(second.title, "Only the title attr");

        let third = extractor.extract(els[2]).unwrap();
        assert_eq!(third.title, "No link at all here");
        assert!(third.url.is_none());
    }

    #[test]
    fn test_unresolvable_url_drops_candidate() {
        let doc = Document::parse(LIST).unwrap();
        let extractor = CandidateExtractor::new(&FieldMap::default(), Some("https://example.com/"));
        let els = items(&doc);
        assert!(matches!(
            extractor.extract(els[3]),
            Err(CandidateError::UnresolvableUrl(_))
        ));
        assert_eq!(extractor.extract_all(&els).len(), 3);
    }

    #[test]
    fn test_field_rules_with_regex_and_attribute() {
        let doc = Document::parse(LIST).unwrap();
        let fields = FieldMap {
            title: FieldRule::attr("a", "title"),
            url: Some(FieldRule::selector("a")),
            published_at: Some(FieldRule {
                selector: Some(".time".into()),
                attribute: None,
                regex: Some(r"(\d{4}-\d{2}-\d{2} \d{2}:\d{2})".into()),
            }),
            summary: Some(FieldRule::selector(".desc")),
            ..Default::default()
        };
        let extractor = CandidateExtractor::new(&fields, Some("https://example.com/"));
        let c = extractor.extract(items(&doc)[0]).unwrap();

        assert_eq!(c.title, "Full headline one");
        assert_eq!(c.url.as_deref(), Some("https://example.com/news/1.html"));
        assert_eq!(c.published_at.as_deref(), Some("2024-03-01T08:30:00+00:00"));
        assert_eq!(c.summary.as_deref(), Some("Short summary"));
    }

    #[test]
    fn test_regex_without_group_uses_whole_match() {
        let doc = Document::parse(LIST).unwrap();
        let fields = FieldMap {
            title: FieldRule {
                selector: Some("a".into()),
                attribute: None,
                regex: Some(r"Headline \w+".into()),
            },
            ..Default::default()
        };
        let extractor = CandidateExtractor::new(&fields, None);
        let c = extractor.extract(items(&doc)[0]).unwrap();
        assert_eq!(c.title, "Headline one");
    }

    #[test]
    fn test_invalid_title_selector_falls_back_to_heuristics() {
        let doc = Document::parse(LIST).unwrap();
        let fields = FieldMap {
            title: FieldRule::selector("a[[["),
            ..Default::default()
        };
        let extractor = CandidateExtractor::new(&fields, Some("https://example.com/"));
        assert_eq!(extractor.extract(items(&doc)[0]).unwrap().title, "Headline one");
    }

    #[test]
    fn test_normalize_published_at() {
        assert_eq!(
            normalize_published_at("2024-03-01T08:30:00+08:00"),
            "2024-03-01T08:30:00+08:00"
        );
        assert_eq!(normalize_published_at("2024/03/01"), "2024-03-01T00:00:00+00:00");
        assert_eq!(normalize_published_at("2024-03-01 08:30:15"), "2024-03-01T08:30:15+00:00");
        assert_eq!(normalize_published_at("1700000000"), "2023-11-14T22:13:20+00:00");
        assert_eq!(normalize_published_at("1700000000000"), "2023-11-14T22:13:20+00:00");
        assert_eq!(normalize_published_at("3小时前"), "3小时前");
    }
}
