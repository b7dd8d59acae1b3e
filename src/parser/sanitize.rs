//! Text sanitization for titles, summaries and page snippets
//!
//! Scraped text carries invisible characters, stray control bytes and
//! entities that were escaped twice. JSON APIs also like to wrap search hits
//! in `<em>` highlight tags. Everything user-visible passes through here.

use regex::Regex;
use std::sync::LazyLock;

// Pre-compiled regex patterns for performance
static INLINE_WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("Invalid regex pattern"));

static ANY_WHITESPACE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

static MULTI_NEWLINE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid regex pattern"));

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").expect("Invalid regex pattern"));

/// Sanitize multi-line text, keeping paragraph breaks
///
/// 1. Remove zero-width characters
/// 2. Remove control characters (except newline/tab)
/// 3. Decode HTML entities
/// 4. Collapse spaces and tabs
/// 5. Trim each line
/// 6. Collapse runs of blank lines
///
/// # Examples
///
/// ```
/// use hotsift::parser::sanitize::sanitize_text;
///
/// let dirty = "Hello\u{200B}World  \n\n\n\nTest";
/// assert_eq!(sanitize_text(dirty), "HelloWorld\n\nTest");
/// ```
pub fn sanitize_text(text: &str) -> String {
    let mut result = remove_zero_width(text);
    result = remove_control_chars(&result);
    result = decode_html_entities(&result);
    result = INLINE_WHITESPACE_REGEX.replace_all(&result, " ").into_owned();
    result = trim_lines(&result);
    result = MULTI_NEWLINE_REGEX.replace_all(&result, "\n\n").into_owned();

    result.trim().to_string()
}

/// Sanitize a single-line value such as a title
///
/// Same cleaning as [`sanitize_text`], plus leftover tags are stripped and
/// all whitespace (newlines included) collapses to one space.
///
/// ```
/// use hotsift::parser::sanitize::sanitize_inline;
///
/// assert_eq!(sanitize_inline("<em>手机</em>芯片&nbsp;降价\n"), "手机芯片 降价");
/// ```
pub fn sanitize_inline(text: &str) -> String {
    let mut result = remove_zero_width(text);
    result = remove_control_chars(&result);
    result = decode_html_entities(&result);
    result = strip_html_tags(&result);
    ANY_WHITESPACE_REGEX.replace_all(result.trim(), " ").into_owned()
}

/// Remove zero-width spaces, directional marks, separators and the BOM
pub fn remove_zero_width(text: &str) -> String {
    text.chars()
        .filter(|c| {
            !matches!(*c,
                '\u{200B}'..='\u{200F}' |
                '\u{2028}'..='\u{202F}' |
                '\u{FEFF}'
            )
        })
        .collect()
}

/// Remove control characters except newline and tab
pub fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect()
}

/// Decode named and numeric HTML entities, with non-breaking spaces as plain spaces
///
/// One decoding pass only, so double-escaped text keeps its inner entity.
pub fn decode_html_entities(text: &str) -> String {
    html_escape::decode_html_entities(text).replace('\u{a0}', " ")
}

/// Trim whitespace from each line while keeping the line structure
pub fn trim_lines(text: &str) -> String {
    text.lines().map(str::trim).collect::<Vec<_>>().join("\n")
}

/// Drop HTML tags, keeping their text
pub fn strip_html_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_text_full() {
        let dirty = "Hello\u{200B}World  \n\n\n\nTest";
        let clean = sanitize_text(dirty);
        assert!(!clean.contains('\u{200B}'));
        assert_eq!(clean, "HelloWorld\n\nTest");
    }

    #[test]
    fn test_remove_zero_width() {
        assert_eq!(remove_zero_width("手\u{200B}机\u{FEFF}芯片"), "手机芯片");
        assert_eq!(remove_zero_width("Line1\u{2028}Line2\u{2029}Line3"), "Line1Line2Line3");
    }

    #[test]
    fn test_remove_control_chars() {
        let clean = remove_control_chars("Hello\x00World\x07Test\nNew\tline");
        assert_eq!(clean, "HelloWorldTest\nNew\tline");
    }

    #[test]
    fn test_decode_html_entities() {
        assert_eq!(
            decode_html_entities("&lt;div&gt;Hello &amp; World&lt;/div&gt;"),
            "<div>Hello & World</div>"
        );
        // Decoding &amp; last keeps literal entity text intact
        assert_eq!(decode_html_entities("&amp;lt;"), "&lt;");
    }

    #[test]
    fn test_named_and_numeric_entities() {
        assert_eq!(
            sanitize_inline("&ldquo;Chip&rdquo; prices &#8220;fall&#8221; &hellip; &mdash; &#x4E2D;"),
            "\u{201C}Chip\u{201D} prices \u{201C}fall\u{201D} \u{2026} \u{2014} 中"
        );
        assert_eq!(sanitize_text("芯片&nbsp;&#160;降价&#39;s"), "芯片 降价's");
    }

    #[test]
    fn test_sanitize_inline_strips_tags_and_newlines() {
        assert_eq!(sanitize_inline("  <em>Chip</em> prices\n\n fall  "), "Chip prices fall");
        assert_eq!(sanitize_inline("a < b and c > d"), "a < b and c > d");
    }

    #[test]
    fn test_empty_lines_trimming() {
        assert_eq!(sanitize_text("\n\n  \n\n\nContent\n\n  \n\n"), "Content");
    }
}
