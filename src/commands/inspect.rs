use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use hotsift::config::Config;
use hotsift::crawler::{ContentCache, ContentChecker, HttpFetcher};
use hotsift::matcher::KeywordMatcher;
use hotsift::models::KeywordGroup;
use hotsift::storage::SqliteStore;

use super::db_path;

pub async fn check(config: Config, url: String, base_url: Option<String>) -> Result<()> {
    let fetcher =
        HttpFetcher::with_settings(config.fetcher_settings()).context("Failed to create fetcher")?;
    let checker = ContentChecker::new(Arc::new(fetcher), config.checker_settings());

    let result = checker
        .has_content(&url, base_url.as_deref(), &ContentCache::new())
        .await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

pub async fn match_title(config: Config, title: String, db: Option<PathBuf>) -> Result<()> {
    let store = Arc::new(SqliteStore::new(db_path(&config, db))?);
    let matcher = KeywordMatcher::with_ttl(store, config.matcher_cache_ttl());

    let result = matcher.match_title(&title).await?;
    match &result.keyword_group {
        Some(group) if result.matched => {
            println!("Matched group: {} (id {}, priority {})", group.name, group.id, group.priority);
            println!("Words: {}", result.matched_words.join(", "));
        }
        _ => println!("No keyword group matched \"{title}\""),
    }
    Ok(())
}

pub fn add_group(
    config: Config,
    name: String,
    rules: PathBuf,
    priority: i32,
    db: Option<PathBuf>,
) -> Result<()> {
    let content = std::fs::read_to_string(&rules)
        .with_context(|| format!("Failed to read rule file: {}", rules.display()))?;

    let mut group = KeywordGroup::from_rule_lines(0, name, content.lines());
    group.priority = priority;
    if group.words.is_empty() && group.required_words.is_empty() {
        anyhow::bail!("rule file has no normal or required words");
    }

    let store = SqliteStore::new(db_path(&config, db))?;
    let id = store.insert_keyword_group(&group)?;
    println!(
        "Added group {} (id {id}): {} words, {} required, {} excluded",
        group.name,
        group.words.len(),
        group.required_words.len(),
        group.excluded_words.len()
    );
    Ok(())
}
