use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, ORIGIN, REFERER,
    USER_AGENT,
};
use tracing::warn;

use crate::utils::origin_of;

/// Pool of realistic User-Agent strings for rotation
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// Get a random user agent from the pool
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
}

/// Referer and Origin for a request to `target`
///
/// Both come from the target's own origin; `fallback_base` is used when
/// the target has none (relative or opaque URLs).
pub fn referer_for(target: &str, fallback_base: Option<&str>) -> Option<String> {
    origin_of(target)
        .or_else(|| fallback_base.and_then(origin_of))
        .map(|origin| format!("{origin}/"))
}

/// Build browser-like headers for a page request
///
/// # Examples
///
/// ```
/// use hotsift::crawler::headers::build_browser_headers;
///
/// let headers = build_browser_headers(
///     "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
///     Some("https://news.example.com/"),
/// );
/// assert_eq!(headers["origin"], "https://news.example.com");
/// ```
pub fn build_browser_headers(user_agent: &str, referer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    match HeaderValue::from_str(user_agent) {
        Ok(ua) => {
            headers.insert(USER_AGENT, ua);
        }
        Err(_) => warn!(user_agent, "Invalid user agent, using default"),
    }
    if !headers.contains_key(USER_AGENT) {
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENTS[0]));
    }

    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));

    if let Some(referer) = referer {
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        }
        if let Some(origin) = origin_of(referer).and_then(|o| HeaderValue::from_str(&o).ok()) {
            headers.insert(ORIGIN, origin);
        }
    }

    // Sec-Fetch headers for modern browser compatibility
    headers.insert(
        HeaderName::from_static("sec-fetch-dest"),
        HeaderValue::from_static("document"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-mode"),
        HeaderValue::from_static("navigate"),
    );
    headers.insert(
        HeaderName::from_static("sec-fetch-site"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("upgrade-insecure-requests"),
        HeaderValue::from_static("1"),
    );

    headers
}

/// Apply per-source headers on top of `headers`, skipping invalid ones
pub fn apply_custom_headers<'a>(
    headers: &mut HeaderMap,
    custom: impl IntoIterator<Item = (&'a String, &'a String)>,
) {
    for (name, value) in custom {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid custom header"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_build_browser_headers() {
        let headers = build_browser_headers("TestAgent/1.0", Some("https://news.example.com/"));

        assert_eq!(headers.get(USER_AGENT).unwrap(), "TestAgent/1.0");
        assert_eq!(headers.get(REFERER).unwrap(), "https://news.example.com/");
        assert_eq!(headers.get(ORIGIN).unwrap(), "https://news.example.com");
        assert!(headers.contains_key("sec-fetch-dest"));
        assert!(headers
            .get(ACCEPT_LANGUAGE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("zh-CN"));
    }

    #[test]
    fn test_accept_encoding_matches_client_decoders() {
        let headers = build_browser_headers("TestAgent/1.0", None);
        let advertised = headers.get(ACCEPT_ENCODING).unwrap().to_str().unwrap();
        let codings: Vec<&str> = advertised.split(',').map(str::trim).collect();
        // The client decompresses only gzip and deflate
        assert!(codings.iter().all(|c| matches!(*c, "gzip" | "deflate")), "{advertised}");
    }

    #[test]
    fn test_headers_without_referer() {
        let headers = build_browser_headers("TestAgent/1.0", None);
        assert!(!headers.contains_key(REFERER));
        assert!(!headers.contains_key(ORIGIN));
    }

    #[test]
    fn test_referer_for_uses_target_origin() {
        assert_eq!(
            referer_for("https://a.example.com/x/1.html", Some("https://b.example.com")),
            Some("https://a.example.com/".to_string())
        );
        assert_eq!(
            referer_for("/relative", Some("https://b.example.com/news")),
            Some("https://b.example.com/".to_string())
        );
        assert_eq!(referer_for("/relative", None), None);
    }

    #[test]
    fn test_custom_headers_override() {
        let mut headers = build_browser_headers("TestAgent/1.0", None);
        let mut custom = BTreeMap::new();
        custom.insert("User-Agent".to_string(), "Custom/2.0".to_string());
        custom.insert("X-Token".to_string(), "abc".to_string());
        custom.insert("bad header".to_string(), "x".to_string());
        apply_custom_headers(&mut headers, &custom);

        assert_eq!(headers.get(USER_AGENT).unwrap(), "Custom/2.0");
        assert_eq!(headers.get("x-token").unwrap(), "abc");
    }

    #[test]
    fn test_user_agent_rotation() {
        let mut agents = std::collections::HashSet::new();
        for _ in 0..100 {
            let agent = random_user_agent();
            assert!(USER_AGENTS.contains(&agent));
            agents.insert(agent);
        }
        assert!(agents.len() > 1, "User agents should rotate");
    }
}
