use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hotsift::config::{Config, SourcesFile};
use hotsift::crawler::{
    build_platform, ConfigurableHtmlCrawler, CrawlerService, HttpFetcher, PageFetcher,
};
use hotsift::matcher::KeywordMatcher;
use hotsift::models::SourceConfig;
use hotsift::storage::SqliteStore;

use super::db_path;

fn http_fetcher(config: &Config) -> Result<Arc<dyn PageFetcher>> {
    let fetcher =
        HttpFetcher::with_settings(config.fetcher_settings()).context("Failed to create fetcher")?;
    Ok(Arc::new(fetcher))
}

pub async fn crawl(
    config: Config,
    sources: PathBuf,
    db: Option<PathBuf>,
    only: Option<String>,
    print_metrics: bool,
) -> Result<()> {
    println!("Starting crawl");
    println!("==============");

    if let Err(e) = hotsift::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed");
    }

    let sources_file = SourcesFile::load(&sources)?;
    let fetcher = http_fetcher(&config)?;
    let html = Arc::new(ConfigurableHtmlCrawler::new(
        Arc::clone(&fetcher),
        config.extraction_settings(),
        config.checker_settings(),
    ));

    let db_path = db_path(&config, db);
    let store = Arc::new(SqliteStore::new(&db_path)?);

    let mut service = CrawlerService::new(config.retry_config(), config.inter_source_delay())
        .with_sink(store.clone());
    if config.crawler.realtime_matching {
        let matcher = KeywordMatcher::with_ttl(store.clone(), config.matcher_cache_ttl());
        service = service.with_matcher(Arc::new(matcher), config.matcher.rank_threshold);
    }

    for source in sources_file.enabled(only.as_deref()) {
        println!("  + {} ({})", source.display_name(), source.id);
        let platform = build_platform(source, &html, &fetcher, config.list_timeout());
        service.add_platform(platform, source.keywords.clone());
    }

    if service.platform_count() == 0 {
        println!("No enabled sources to crawl.");
        return Ok(());
    }

    let report = service.crawl_all().await;

    println!("\nCrawl Summary");
    println!("=============");
    for result in &report.results {
        if result.success {
            println!("[ok]   {}: {} items", result.platform_id, result.data.len());
        } else {
            println!(
                "[fail] {}: {}",
                result.platform_id,
                result.error.as_deref().unwrap_or("未获取到数据")
            );
        }
    }
    println!("Successful: {}", report.success_count);
    println!("Failed: {}", report.failed_count);
    println!("Database: {}", db_path.display());

    if print_metrics {
        let text = hotsift::metrics::encode_metrics()
            .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {e}"))?;
        println!("\n{text}");
    }

    Ok(())
}

fn load_source(path: &Path) -> Result<SourceConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source file: {}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let source = if is_json {
        serde_json::from_str(&content)?
    } else {
        toml::from_str(&content)?
    };
    Ok(source)
}

pub async fn extract(
    mut config: Config,
    source: PathBuf,
    keywords: Vec<String>,
    no_content_check: bool,
) -> Result<()> {
    let source_config = load_source(&source)?;
    if no_content_check {
        config.content_check.enabled = false;
    }

    let crawler = ConfigurableHtmlCrawler::new(
        http_fetcher(&config)?,
        config.extraction_settings(),
        config.checker_settings(),
    );

    let items = if keywords.is_empty() {
        let outcome = crawler.try_extract(&source_config).await?;
        eprintln!(
            "selector: {} ({}), candidates: {}, rejected: {}, checked: {}",
            outcome.resolved.selector,
            outcome.resolved.origin,
            outcome.candidates,
            outcome.rejected,
            outcome.checked
        );
        outcome.items
    } else {
        crawler
            .try_extract_with_keywords(&source_config, &keywords)
            .await?
    };

    println!("{}", serde_json::to_string_pretty(&items)?);
    Ok(())
}
