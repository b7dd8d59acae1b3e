//! Extraction orchestrator tests against an in-process fetcher
//!
//! Request counting makes the two-phase behavior observable: rejected
//! candidates never reach the network and verification stops at the limit.

mod common;

use std::sync::Arc;

use common::{
    article_page, crawler_with, fast_settings, html_source, list_page, numbered_entries,
    thin_page, CountingFetcher,
};
use hotsift::crawler::{ConfigurableHtmlCrawler, ExtractionSettings};
use hotsift::models::RequestConfig;
use hotsift::parser::SelectorOrigin;
use proptest::prelude::*;

const BASE: &str = "https://news.example.com";

fn with_articles(fetcher: CountingFetcher, entries: &[(String, String)]) -> CountingFetcher {
    entries.iter().fold(fetcher, |f, (href, title)| {
        f.page(format!("{BASE}{href}"), article_page(title))
    })
}

#[tokio::test]
async fn test_rejected_candidates_are_never_fetched() {
    let mut entries = numbered_entries(3);
    entries.extend([
        ("/".to_string(), "首页".to_string()),
        ("/about".to_string(), "About this website and team".to_string()),
        ("/tag/chips/".to_string(), "Everything tagged with chips".to_string()),
        ("/news/ok.html".to_string(), "Hi".to_string()),
    ]);

    let fetcher = with_articles(
        CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries)),
        &entries,
    );
    let fetcher = Arc::new(fetcher);
    let crawler = crawler_with(fetcher.clone());

    let outcome = crawler
        .try_extract(&html_source(BASE, "/list", "li"))
        .await
        .unwrap();

    assert_eq!(outcome.items.len(), 3);
    assert_eq!(outcome.rejected, 4);
    // One list fetch plus one check per survivor
    assert_eq!(fetcher.call_count(), 4);
    for rejected in ["/", "/about", "/tag/chips/", "/news/ok.html"] {
        assert_eq!(fetcher.calls_to(&format!("{BASE}{rejected}")), 0, "{rejected} was fetched");
    }
}

#[tokio::test]
async fn test_limit_stops_verification_early() {
    let entries = numbered_entries(12);
    let fetcher = with_articles(
        CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries)),
        &entries,
    );
    let fetcher = Arc::new(fetcher);
    let crawler = crawler_with(fetcher.clone());

    let mut source = html_source(BASE, "/list", "li");
    source.list.limit = Some(4);
    let outcome = crawler.try_extract(&source).await.unwrap();

    assert_eq!(outcome.items.len(), 4);
    let content_checks = fetcher.call_count() - 1;
    assert!(content_checks >= 4);
    assert!(content_checks <= 4 + 5 - 1, "issued {content_checks} checks");
}

#[tokio::test]
async fn test_verification_concurrency_is_bounded_by_batch_size() {
    let entries = numbered_entries(11);
    let fetcher = with_articles(
        CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries)),
        &entries,
    );
    let fetcher = Arc::new(fetcher);
    let (extraction, checker) = fast_settings();
    let crawler = ConfigurableHtmlCrawler::new(
        fetcher.clone(),
        ExtractionSettings {
            batch_size: 3,
            ..extraction
        },
        checker,
    );

    let items = crawler.extract(&html_source(BASE, "/list", "li")).await;

    assert_eq!(items.len(), 11);
    assert!(fetcher.peak_in_flight() <= 3);
}

#[tokio::test]
async fn test_duplicate_links_are_checked_once() {
    let mut entries = numbered_entries(3);
    entries.push(entries[0].clone());
    let fetcher = with_articles(
        CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries)),
        &entries,
    );
    let fetcher = Arc::new(fetcher);
    let crawler = crawler_with(fetcher.clone());

    let items = crawler.extract(&html_source(BASE, "/list", "li")).await;

    assert_eq!(items.len(), 3);
    assert_eq!(fetcher.calls_to(&format!("{BASE}/news/1.html")), 1);
}

#[tokio::test]
async fn test_content_check_disabled_skips_article_fetches() {
    let entries = numbered_entries(4);
    let fetcher = Arc::new(CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries)));
    let (extraction, checker) = fast_settings();
    let crawler = ConfigurableHtmlCrawler::new(
        fetcher.clone(),
        ExtractionSettings {
            content_check: false,
            ..extraction
        },
        checker,
    );

    let items = crawler.extract(&html_source(BASE, "/list", "li")).await;

    assert_eq!(items.len(), 4);
    assert_eq!(fetcher.call_count(), 1);
    assert!(items.iter().all(|i| i.content.is_none()));
}

#[tokio::test]
async fn test_fallback_keeps_caller_config_untouched() {
    let entries = numbered_entries(3);
    let fetcher = with_articles(
        CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries)),
        &entries,
    );
    let crawler = crawler_with(Arc::new(fetcher));

    let source = html_source(BASE, "/list", ".missing");
    let outcome = crawler.try_extract(&source).await.unwrap();

    assert_eq!(outcome.resolved.origin, SelectorOrigin::Fallback);
    assert_eq!(outcome.items.len(), 3);
    assert_eq!(source.list.item_selector, ".missing");
}

#[tokio::test]
async fn test_search_mode_merges_keywords() {
    let chips = numbered_entries(3);
    let phones: Vec<(String, String)> = vec![
        chips[2].clone(),
        ("/news/p1.html".to_string(), "Phone makers cut prices again".to_string()),
        ("/news/p2.html".to_string(), "Phone shipments recover in autumn".to_string()),
    ];

    let fetcher = CountingFetcher::new()
        .page(format!("{BASE}/search?q=chips"), list_page(&chips))
        .page(format!("{BASE}/search?q=phones"), list_page(&phones));
    let fetcher = with_articles(with_articles(fetcher, &chips), &phones);
    let fetcher = Arc::new(fetcher);
    let crawler = crawler_with(fetcher.clone());

    let mut source = html_source(BASE, "/list", "li");
    source.search = Some(RequestConfig {
        url: format!("{BASE}/search?q={{keyword}}"),
        item_selector: "li".to_string(),
        limit: Some(4),
        ..Default::default()
    });

    let items = crawler
        .try_extract_with_keywords(&source, &["chips".to_string(), "phones".to_string()])
        .await
        .unwrap();

    assert_eq!(items.len(), 4);
    let ranks: Vec<u32> = items.iter().map(|i| i.rank).collect();
    assert_eq!(ranks, vec![1, 2, 3, 4]);
    assert_eq!(fetcher.calls_to(&format!("{BASE}/list")), 0);
    // The shared entry is verified once across both keywords
    assert_eq!(fetcher.calls_to(&format!("{BASE}/news/3.html")), 1);
}

#[tokio::test]
async fn test_keywords_without_search_descriptor_use_listing() {
    let entries = numbered_entries(3);
    let fetcher = with_articles(
        CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries)),
        &entries,
    );
    let crawler = crawler_with(Arc::new(fetcher));

    let items = crawler
        .extract_with_keywords(&html_source(BASE, "/list", "li"), &["chips".to_string()])
        .await;
    assert_eq!(items.len(), 3);
}

#[tokio::test]
async fn test_list_fetch_failure_yields_empty_result() {
    let crawler = crawler_with(Arc::new(CountingFetcher::new()));
    let source = html_source(BASE, "/list", "li");

    assert!(crawler.extract(&source).await.is_empty());
    assert!(crawler.try_extract(&source).await.is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_ranks_are_contiguous(
        good in proptest::collection::vec(any::<bool>(), 1..14),
        limit in 1usize..10,
        batch_size in 1usize..6,
    ) {
        let entries = numbered_entries(good.len());
        let mut fetcher = CountingFetcher::new().page(format!("{BASE}/list"), list_page(&entries));
        for ((href, title), ok) in entries.iter().zip(&good) {
            let body = if *ok { article_page(title) } else { thin_page() };
            fetcher = fetcher.page(format!("{BASE}{href}"), body);
        }

        let (extraction, checker) = fast_settings();
        let crawler = ConfigurableHtmlCrawler::new(
            Arc::new(fetcher),
            ExtractionSettings { batch_size, ..extraction },
            checker,
        );
        let mut source = html_source(BASE, "/list", "li");
        source.list.limit = Some(limit);

        let items = tokio_test::block_on(crawler.extract(&source));

        let expected: Vec<String> = entries
            .iter()
            .zip(&good)
            .filter(|(_, ok)| **ok)
            .map(|((_, title), _)| title.clone())
            .take(limit)
            .collect();
        let titles: Vec<String> = items.iter().map(|i| i.title.clone()).collect();
        prop_assert_eq!(titles, expected);

        let ranks: Vec<u32> = items.iter().map(|i| i.rank).collect();
        let contiguous: Vec<u32> = (1..=items.len() as u32).collect();
        prop_assert_eq!(ranks, contiguous);
    }
}
