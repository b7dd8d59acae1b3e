//! Persistence of crawled items, keyword groups and match history
//!
//! SQLite backs the CLI; the in-memory store backs tests and dry runs.

pub mod repository;

pub use repository::{KeywordStore, MemoryStore, NewsSink, SqliteStore};
