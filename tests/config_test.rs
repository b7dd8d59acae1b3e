//! Configuration and sources file loading

use std::io::Write;

use hotsift::config::{Config, SourceKind, SourcesFile};
use serial_test::serial;
use tempfile::NamedTempFile;

fn temp_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_config_from_file() {
    let file = temp_file(
        ".toml",
        r#"
        [crawler]
        max_retries = 3
        realtime_matching = true
        proxy_url = "http://127.0.0.1:7890"

        [content_check]
        batch_size = 8

        [filter]
        nav_keywords = ["首页", "更多"]

        [storage]
        sqlite_path = "/tmp/hotsift-test.db"
        "#,
    );

    let config = Config::from_file(file.path()).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.crawler.max_retries, 3);
    assert!(config.crawler.realtime_matching);
    assert_eq!(config.extraction_settings().batch_size, 8);
    assert_eq!(config.filter.nav_keywords, vec!["首页", "更多"]);
    assert_eq!(
        config.fetcher_settings().proxy_url.as_deref(),
        Some("http://127.0.0.1:7890")
    );
}

#[test]
fn test_missing_config_file() {
    let result = Config::from_file(std::path::Path::new("/nonexistent/hotsift.toml"));
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_env_overrides() {
    std::env::set_var("HOTSIFT_MAX_RETRIES", "5");
    std::env::set_var("HOTSIFT_BATCH_SIZE", "2");
    std::env::set_var("HOTSIFT_LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();

    std::env::remove_var("HOTSIFT_MAX_RETRIES");
    std::env::remove_var("HOTSIFT_BATCH_SIZE");
    std::env::remove_var("HOTSIFT_LOG_FORMAT");

    assert_eq!(config.crawler.max_retries, 5);
    assert_eq!(config.content_check.batch_size, 2);
    assert_eq!(config.logging.format, "json");
    assert!(config.validate().is_ok());
}

#[test]
#[serial]
fn test_unparsable_env_keeps_default() {
    std::env::set_var("HOTSIFT_RATE_LIMIT", "fast");
    let config = Config::from_env().unwrap();
    std::env::remove_var("HOTSIFT_RATE_LIMIT");

    assert_eq!(config.crawler.requests_per_second, 10);
}

#[test]
fn test_sources_file_json() {
    let file = temp_file(
        ".json",
        r#"{"sources": [
            {
                "id": "ithome",
                "name": "IT之家",
                "kind": "html",
                "keywords": ["芯片"],
                "config": {
                    "baseUrl": "https://www.ithome.com",
                    "list": {
                        "url": "https://www.ithome.com/list/",
                        "itemSelector": ".news-list li",
                        "fields": {
                            "title": {"selector": "a"},
                            "url": {"selector": "a", "attribute": "href"},
                            "publishedAt": {"selector": ".time"}
                        },
                        "filter": {"minTitleLength": 6, "excludeUrlPatterns": ["/ad/"]}
                    },
                    "search": {
                        "url": "https://www.ithome.com/search/{keyword}.html",
                        "itemSelector": ".result li"
                    }
                }
            },
            {
                "id": "weibo",
                "kind": "json_api",
                "api": {"url": "https://example.com/hot", "itemsPointer": "/data/realtime", "titlePointer": "/word"}
            }
        ]}"#,
    );

    let file = SourcesFile::load(file.path()).unwrap();
    assert_eq!(file.sources.len(), 2);
    assert_eq!(file.sources[0].display_name(), "IT之家");

    let SourceKind::Html { config } = &file.sources[0].kind else {
        panic!("expected an html source");
    };
    assert_eq!(config.list.filter.min_title_length, 6);
    assert_eq!(config.list.filter.exclude_url_patterns, vec!["/ad/"]);
    assert!(config.list.fields.published_at.is_some());
    assert!(config.search.is_some());

    let SourceKind::JsonApi { api } = &file.sources[1].kind else {
        panic!("expected a json source");
    };
    assert_eq!(api.title_pointer, "/word");
}

#[test]
fn test_sources_file_rejects_missing_url() {
    let file = temp_file(
        ".toml",
        r#"
        [[sources]]
        id = "broken"
        kind = "json_api"

        [sources.api]
        url = ""
        "#,
    );
    assert!(SourcesFile::load(file.path()).is_err());
}
