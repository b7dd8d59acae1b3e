//! Repository traits and their SQLite / in-memory implementations
//!
//! The crawl service and the matcher only see the traits, so the pipeline
//! can run against SQLite in production and against [`MemoryStore`] in
//! tests.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │      CrawlerService / KeywordMatcher         │
//! └──────────────────────────────────────────────┘
//!                       │
//!                       ▼
//! ┌──────────────────────────────────────────────┐
//! │          NewsSink, KeywordStore              │
//! └──────────────────────────────────────────────┘
//!              │                    │
//!              ▼                    ▼
//!     ┌─────────────────┐  ┌─────────────────┐
//!     │   SqliteStore   │  │   MemoryStore   │
//!     └─────────────────┘  └─────────────────┘
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, RwLock};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{KeywordGroup, NewsItem, NewsMatchData};

// ============================================================================
// Repository Traits
// ============================================================================

/// Read side of keyword configuration
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// All keyword groups, enabled or not
    async fn load_keyword_groups(&self) -> Result<Vec<KeywordGroup>>;
}

/// Persistence boundary for crawled items and their match history
#[async_trait]
pub trait NewsSink: Send + Sync {
    /// Upsert items keyed by (platform, title, day); returns rows written
    async fn save_items(&self, platform_id: &str, items: &[NewsItem]) -> Result<usize>;

    /// Record one matched appearance and return the item's full history
    async fn record_match(
        &self,
        platform_id: &str,
        item: &NewsItem,
        group_id: i64,
    ) -> Result<NewsMatchData>;

    /// Store the latest weight of a matched item
    async fn update_weight(
        &self,
        platform_id: &str,
        title: &str,
        group_id: i64,
        weight: f64,
    ) -> Result<()>;
}

/// Day bucket of an item: its publication date, or today
fn day_of(item: &NewsItem, now: DateTime<Utc>) -> String {
    item.published_at
        .as_deref()
        .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
        .map(|dt| dt.with_timezone(&Utc).format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| now.format("%Y-%m-%d").to_string())
}

// ============================================================================
// SQLite Implementation
// ============================================================================

/// SQLite implementation of both stores
///
/// Uses `Mutex` to ensure thread-safety for the SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directory if needed
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).context("Failed to open SQLite database")?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;

        tracing::info!(path = %path.display(), "SQLite store initialized");
        Ok(store)
    }

    /// Create in-memory store (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to create in-memory SQLite")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("SQLite connection lock poisoned"))
    }

    /// Create database schema
    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
                CREATE TABLE IF NOT EXISTS news_items (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    platform_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    day TEXT NOT NULL,
                    url TEXT,
                    mobile_url TEXT,
                    content TEXT,
                    published_at TEXT,
                    rank INTEGER NOT NULL,
                    first_seen TEXT NOT NULL,
                    last_seen TEXT NOT NULL,
                    UNIQUE(platform_id, title, day)
                );

                CREATE TABLE IF NOT EXISTS keyword_groups (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    words TEXT NOT NULL DEFAULT '[]',
                    required_words TEXT NOT NULL DEFAULT '[]',
                    excluded_words TEXT NOT NULL DEFAULT '[]',
                    priority INTEGER NOT NULL DEFAULT 0,
                    enabled INTEGER NOT NULL DEFAULT 1
                );

                CREATE TABLE IF NOT EXISTS match_appearances (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    platform_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    group_id INTEGER NOT NULL,
                    rank INTEGER NOT NULL,
                    seen_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_match_appearances_item
                    ON match_appearances(platform_id, title, group_id);

                CREATE TABLE IF NOT EXISTS match_weights (
                    platform_id TEXT NOT NULL,
                    title TEXT NOT NULL,
                    group_id INTEGER NOT NULL,
                    weight REAL NOT NULL,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (platform_id, title, group_id)
                );
                "#,
        )
        .context("Failed to create SQLite schema")?;

        Ok(())
    }

    /// Insert a keyword group, returning its new id
    pub fn insert_keyword_group(&self, group: &KeywordGroup) -> Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO keyword_groups (name, words, required_words, excluded_words, priority, enabled)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            params![
                group.name,
                serde_json::to_string(&group.words)?,
                serde_json::to_string(&group.required_words)?,
                serde_json::to_string(&group.excluded_words)?,
                group.priority,
                group.enabled,
            ],
        )
        .context("Failed to insert keyword group")?;
        Ok(conn.last_insert_rowid())
    }

    /// Stored weight of a matched item
    pub fn weight_of(&self, platform_id: &str, title: &str, group_id: i64) -> Result<Option<f64>> {
        let conn = self.lock()?;
        let weight = conn
            .query_row(
                "SELECT weight FROM match_weights WHERE platform_id = ?1 AND title = ?2 AND group_id = ?3",
                params![platform_id, title, group_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to load weight")?;
        Ok(weight)
    }

    /// Number of stored items for a platform
    pub fn count_items(&self, platform_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM news_items WHERE platform_id = ?1",
            params![platform_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl KeywordStore for SqliteStore {
    async fn load_keyword_groups(&self) -> Result<Vec<KeywordGroup>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, words, required_words, excluded_words, priority, enabled
             FROM keyword_groups ORDER BY priority, id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i32>(5)?,
                row.get::<_, bool>(6)?,
            ))
        })?;

        let mut groups = Vec::new();
        for row in rows {
            let (id, name, words, required, excluded, priority, enabled) = row?;
            groups.push(KeywordGroup {
                id,
                name,
                words: serde_json::from_str(&words)
                    .with_context(|| format!("Invalid words of keyword group {id}"))?,
                required_words: serde_json::from_str(&required)
                    .with_context(|| format!("Invalid required words of keyword group {id}"))?,
                excluded_words: serde_json::from_str(&excluded)
                    .with_context(|| format!("Invalid excluded words of keyword group {id}"))?,
                priority,
                enabled,
            });
        }
        Ok(groups)
    }
}

#[async_trait]
impl NewsSink for SqliteStore {
    async fn save_items(&self, platform_id: &str, items: &[NewsItem]) -> Result<usize> {
        let mut conn = self.lock()?;
        let now = Utc::now();
        let now_str = now.to_rfc3339();

        let tx = conn.transaction()?;
        let mut written = 0;
        for item in items {
            written += tx
                .execute(
                    r#"
                        INSERT INTO news_items
                            (platform_id, title, day, url, mobile_url, content, published_at, rank, first_seen, last_seen)
                        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                        ON CONFLICT(platform_id, title, day) DO UPDATE SET
                            url = COALESCE(excluded.url, news_items.url),
                            mobile_url = COALESCE(excluded.mobile_url, news_items.mobile_url),
                            content = COALESCE(excluded.content, news_items.content),
                            rank = excluded.rank,
                            last_seen = excluded.last_seen
                        "#,
                    params![
                        platform_id,
                        item.title,
                        day_of(item, now),
                        item.url,
                        item.mobile_url,
                        item.content,
                        item.published_at,
                        item.rank,
                        now_str,
                    ],
                )
                .context("Failed to upsert news item")?;
        }
        tx.commit()?;
        Ok(written)
    }

    async fn record_match(
        &self,
        platform_id: &str,
        item: &NewsItem,
        group_id: i64,
    ) -> Result<NewsMatchData> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO match_appearances (platform_id, title, group_id, rank, seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![platform_id, item.title, group_id, item.rank, Utc::now().to_rfc3339()],
        )
        .context("Failed to record match")?;

        let mut stmt = conn.prepare(
            "SELECT rank FROM match_appearances
             WHERE platform_id = ?1 AND title = ?2 AND group_id = ?3
             ORDER BY id",
        )?;
        let ranks = stmt
            .query_map(params![platform_id, item.title, group_id], |row| {
                row.get::<_, u32>(0)
            })?
            .collect::<rusqlite::Result<Vec<u32>>>()?;

        Ok(NewsMatchData {
            match_count: ranks.len() as u32,
            ranks,
        })
    }

    async fn update_weight(
        &self,
        platform_id: &str,
        title: &str,
        group_id: i64,
        weight: f64,
    ) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            r#"
                INSERT INTO match_weights (platform_id, title, group_id, weight, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(platform_id, title, group_id) DO UPDATE SET
                    weight = excluded.weight,
                    updated_at = excluded.updated_at
                "#,
            params![platform_id, title, group_id, weight, Utc::now().to_rfc3339()],
        )
        .context("Failed to update weight")?;
        Ok(())
    }
}

// ============================================================================
// In-memory Implementation
// ============================================================================

type ItemKey = (String, String, i64);

/// In-memory implementation of both stores
///
/// Useful for tests and for dry runs without a database.
#[derive(Default)]
pub struct MemoryStore {
    groups: RwLock<Vec<KeywordGroup>>,
    items: RwLock<HashMap<(String, String, String), NewsItem>>,
    appearances: RwLock<HashMap<ItemKey, Vec<u32>>>,
    weights: RwLock<HashMap<ItemKey, f64>>,
    group_loads: std::sync::atomic::AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store preloaded with keyword groups
    pub fn with_groups(groups: Vec<KeywordGroup>) -> Self {
        let store = Self::new();
        if let Ok(mut g) = store.groups.write() {
            *g = groups;
        }
        store
    }

    /// Replace the keyword groups
    pub fn set_groups(&self, groups: Vec<KeywordGroup>) {
        if let Ok(mut g) = self.groups.write() {
            *g = groups;
        }
    }

    /// How many times groups were loaded (cache tests)
    pub fn group_loads(&self) -> usize {
        self.group_loads.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Number of stored items
    pub fn item_count(&self) -> usize {
        self.items.read().map(|i| i.len()).unwrap_or(0)
    }

    /// Stored weight of a matched item
    pub fn weight_of(&self, platform_id: &str, title: &str, group_id: i64) -> Option<f64> {
        self.weights
            .read()
            .ok()?
            .get(&(platform_id.to_string(), title.to_string(), group_id))
            .copied()
    }
}

#[async_trait]
impl KeywordStore for MemoryStore {
    async fn load_keyword_groups(&self) -> Result<Vec<KeywordGroup>> {
        self.group_loads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.groups
            .read()
            .map(|g| g.clone())
            .map_err(|_| anyhow!("keyword group lock poisoned"))
    }
}

#[async_trait]
impl NewsSink for MemoryStore {
    async fn save_items(&self, platform_id: &str, items: &[NewsItem]) -> Result<usize> {
        let now = Utc::now();
        let mut stored = self
            .items
            .write()
            .map_err(|_| anyhow!("item lock poisoned"))?;
        for item in items {
            let key = (platform_id.to_string(), item.title.clone(), day_of(item, now));
            stored.insert(key, item.clone());
        }
        Ok(items.len())
    }

    async fn record_match(
        &self,
        platform_id: &str,
        item: &NewsItem,
        group_id: i64,
    ) -> Result<NewsMatchData> {
        let mut appearances = self
            .appearances
            .write()
            .map_err(|_| anyhow!("appearance lock poisoned"))?;
        let ranks = appearances
            .entry((platform_id.to_string(), item.title.clone(), group_id))
            .or_default();
        ranks.push(item.rank);
        Ok(NewsMatchData {
            ranks: ranks.clone(),
            match_count: ranks.len() as u32,
        })
    }

    async fn update_weight(
        &self,
        platform_id: &str,
        title: &str,
        group_id: i64,
        weight: f64,
    ) -> Result<()> {
        self.weights
            .write()
            .map_err(|_| anyhow!("weight lock poisoned"))?
            .insert((platform_id.to_string(), title.to_string(), group_id), weight);
        Ok(())
    }
}
