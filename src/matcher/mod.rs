//! Keyword matching of titles against keyword groups
//!
//! A group matches when at least one normal word occurs in the title, every
//! required word occurs, and no excluded word occurs. Comparison is a
//! case-insensitive substring test. Groups are tried in ascending priority
//! and the first match wins.

pub mod weight;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{KeywordGroup, MatchResult};
use crate::storage::KeywordStore;

pub use weight::{calculate_weight, DEFAULT_RANK_THRESHOLD};

/// Default lifetime of the cached group list
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

/// Strip the `+`/`!` rule prefixes some configurations keep on stored words
fn clean_word(word: &str) -> Option<&str> {
    let word = word.trim();
    let word = word
        .strip_prefix('+')
        .or_else(|| word.strip_prefix('!'))
        .unwrap_or(word)
        .trim();
    (!word.is_empty()).then_some(word)
}

/// Cleaned words paired with their lower-case form
fn cleaned(words: &[String]) -> Vec<(String, String)> {
    words
        .iter()
        .filter_map(|w| clean_word(w))
        .map(|w| (w.to_string(), w.to_lowercase()))
        .collect()
}

/// Words of `group` that make it match `title`, or `None`
///
/// A group with no normal words matches on its required words alone; a
/// group with neither never matches.
pub fn group_matches(title: &str, group: &KeywordGroup) -> Option<Vec<String>> {
    let haystack = title.to_lowercase();

    if cleaned(&group.excluded_words)
        .iter()
        .any(|(_, lower)| haystack.contains(lower.as_str()))
    {
        return None;
    }

    let required = cleaned(&group.required_words);
    if !required.iter().all(|(_, lower)| haystack.contains(lower.as_str())) {
        return None;
    }

    let normal = cleaned(&group.words);
    let mut matched: Vec<String> = normal
        .iter()
        .filter(|(_, lower)| haystack.contains(lower.as_str()))
        .map(|(original, _)| original.clone())
        .collect();

    if matched.is_empty() && (!normal.is_empty() || required.is_empty()) {
        return None;
    }

    matched.extend(required.into_iter().map(|(original, _)| original));
    Some(matched)
}

/// Match `title` against `groups`, first match in ascending priority wins
///
/// Disabled groups are skipped. Groups with equal priority keep their
/// input order.
pub fn match_title(title: &str, groups: &[KeywordGroup]) -> MatchResult {
    let mut ordered: Vec<&KeywordGroup> = groups.iter().filter(|g| g.enabled).collect();
    ordered.sort_by_key(|g| g.priority);

    for group in ordered {
        if let Some(words) = group_matches(title, group) {
            return MatchResult {
                matched: true,
                keyword_group: Some(group.clone()),
                matched_words: words,
            };
        }
    }
    MatchResult::no_match()
}

struct CachedGroups {
    loaded_at: Instant,
    groups: Arc<Vec<KeywordGroup>>,
}

/// Matcher backed by a [`KeywordStore`] with a short-lived group cache
pub struct KeywordMatcher {
    store: Arc<dyn KeywordStore>,
    ttl: Duration,
    cache: RwLock<Option<CachedGroups>>,
}

impl KeywordMatcher {
    pub fn new(store: Arc<dyn KeywordStore>) -> Self {
        Self::with_ttl(store, DEFAULT_CACHE_TTL)
    }

    pub fn with_ttl(store: Arc<dyn KeywordStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: RwLock::new(None),
        }
    }

    /// Enabled groups sorted by priority, reloaded once the cache expires
    pub async fn groups(&self) -> Result<Arc<Vec<KeywordGroup>>> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.loaded_at.elapsed() < self.ttl {
                    return Ok(Arc::clone(&cached.groups));
                }
            }
        }

        let mut cache = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock
        if let Some(cached) = cache.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.groups));
            }
        }

        let mut groups: Vec<KeywordGroup> = self
            .store
            .load_keyword_groups()
            .await?
            .into_iter()
            .filter(|g| g.enabled)
            .collect();
        groups.sort_by_key(|g| g.priority);
        debug!(count = groups.len(), "Keyword groups loaded");

        let groups = Arc::new(groups);
        *cache = Some(CachedGroups {
            loaded_at: Instant::now(),
            groups: Arc::clone(&groups),
        });
        Ok(groups)
    }

    /// Drop the cached groups so the next match reloads them
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }

    /// Match `title` against the current groups
    pub async fn match_title(&self, title: &str) -> Result<MatchResult> {
        let groups = self.groups().await?;
        Ok(match_title(title, &groups))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn group(id: i64, priority: i32, words: &[&str], required: &[&str], excluded: &[&str]) -> KeywordGroup {
        let to_vec = |w: &[&str]| w.iter().map(|s| s.to_string()).collect();
        KeywordGroup {
            id,
            name: format!("group-{id}"),
            words: to_vec(words),
            required_words: to_vec(required),
            excluded_words: to_vec(excluded),
            priority,
            enabled: true,
        }
    }

    #[test]
    fn test_required_word_with_prefix() {
        let chips = group(1, 0, &["芯片"], &["+手机"], &[]);
        let hit = match_title("手机芯片降价", std::slice::from_ref(&chips));
        assert!(hit.matched);
        assert_eq!(hit.matched_words, vec!["芯片", "手机"]);

        assert!(!match_title("电脑芯片降价", &[chips]).matched);
    }

    #[test]
    fn test_excluded_word_rejects() {
        let g = group(1, 0, &["芯片"], &[], &["广告"]);
        assert!(!match_title("芯片广告大促", std::slice::from_ref(&g)).matched);
        assert!(match_title("芯片大促", &[g]).matched);
    }

    #[test]
    fn test_first_match_not_best_match() {
        let a = group(1, 1, &["chip"], &[], &[]);
        let b = group(2, 2, &["chip", "phone", "price"], &[], &[]);
        let result = match_title("Phone chip price drop", &[b, a]);
        assert_eq!(result.keyword_group.unwrap().id, 1);
    }

    #[test]
    fn test_case_insensitive_and_disabled() {
        let mut g = group(1, 0, &["OpenAI"], &[], &[]);
        assert!(match_title("openai ships a model", std::slice::from_ref(&g)).matched);
        g.enabled = false;
        assert!(!match_title("openai ships a model", &[g]).matched);
    }

    #[test]
    fn test_required_only_group() {
        let g = group(1, 0, &[], &["芯片", "手机"], &[]);
        assert!(match_title("手机芯片降价", std::slice::from_ref(&g)).matched);
        assert!(!match_title("芯片降价", &[g]).matched);

        let empty = group(2, 0, &[], &[], &[]);
        assert!(!match_title("anything", &[empty]).matched);
    }

    #[tokio::test]
    async fn test_group_cache_reuses_store_result() {
        let store = Arc::new(MemoryStore::with_groups(vec![group(1, 0, &["芯片"], &[], &[])]));
        let matcher = KeywordMatcher::new(store.clone());

        assert!(matcher.match_title("芯片降价").await.unwrap().matched);
        assert!(matcher.match_title("芯片涨价").await.unwrap().matched);
        assert_eq!(store.group_loads(), 1);

        // Changes are invisible until the cache is dropped
        store.set_groups(Vec::new());
        assert!(matcher.match_title("芯片降价").await.unwrap().matched);
        matcher.invalidate().await;
        assert!(!matcher.match_title("芯片降价").await.unwrap().matched);
        assert_eq!(store.group_loads(), 2);
    }

    #[tokio::test]
    async fn test_group_cache_expires() {
        let store = Arc::new(MemoryStore::with_groups(vec![group(1, 0, &["x"], &[], &[])]));
        let matcher = KeywordMatcher::with_ttl(store.clone(), Duration::from_millis(10));
        matcher.groups().await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        matcher.groups().await.unwrap();
        assert_eq!(store.group_loads(), 2);
    }
}
