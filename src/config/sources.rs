//! Operator source definitions
//!
//! A sources file lists every platform of a run, as TOML:
//!
//! ```toml
//! [[sources]]
//! id = "ithome"
//! kind = "html"
//! keywords = ["芯片"]
//!
//! [sources.config]
//! baseUrl = "https://www.ithome.com"
//!
//! [sources.config.list]
//! url = "https://www.ithome.com/list/"
//! itemSelector = ".news-list li"
//! limit = 20
//! fields = { title = { selector = "a" }, url = { selector = "a", attribute = "href" } }
//! ```
//!
//! or as JSON, either `{"sources": [...]}` or a bare array. Field names are
//! camelCase so definitions exported by the dashboard load unchanged.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{JsonApiConfig, SourceConfig};

/// How a platform is crawled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceKind {
    /// Configured HTML listing
    Html { config: SourceConfig },
    /// Built-in JSON hot-list endpoint
    JsonApi { api: JsonApiConfig },
}

/// One platform of the sources file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformSource {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Non-empty keywords switch the platform to search mode
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(flatten)]
    pub kind: SourceKind,
}

fn default_enabled() -> bool {
    true
}

impl PlatformSource {
    /// Display name, falling back to the id
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    fn primary_url(&self) -> &str {
        match &self.kind {
            SourceKind::Html { config } => &config.list.url,
            SourceKind::JsonApi { api } => &api.url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcesFile {
    #[serde(default)]
    pub sources: Vec<PlatformSource>,
}

impl SourcesFile {
    /// Load a sources file, JSON when the extension says so, TOML otherwise
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read sources file: {}", path.display()))?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let file = if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
        .with_context(|| format!("Failed to parse sources file: {}", path.display()))?;

        file.validate()?;
        Ok(file)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse `{"sources": [...]}` or a bare array
    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        if value.is_array() {
            let sources = serde_json::from_value(value)?;
            return Ok(Self { sources });
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Reject empty or duplicate ids and sources without a URL
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                anyhow::bail!("source id must not be empty");
            }
            if !seen.insert(source.id.as_str()) {
                anyhow::bail!("duplicate source id: {}", source.id);
            }
            if source.primary_url().trim().is_empty() {
                anyhow::bail!("source {} has no url", source.id);
            }
        }
        Ok(())
    }

    /// Enabled sources, optionally restricted to one id
    pub fn enabled<'a>(&'a self, only: Option<&'a str>) -> impl Iterator<Item = &'a PlatformSource> {
        self.sources
            .iter()
            .filter(move |s| s.enabled && only.map_or(true, |id| s.id == id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_SOURCES: &str = r#"
        [[sources]]
        id = "ithome"
        kind = "html"
        keywords = ["芯片"]

        [sources.config]
        baseUrl = "https://www.ithome.com"

        [sources.config.list]
        url = "https://www.ithome.com/list/"
        itemSelector = ".news-list li"
        limit = 20

        [sources.config.list.fields.title]
        selector = "a"

        [[sources]]
        id = "weibo"
        kind = "json_api"
        enabled = false

        [sources.api]
        url = "https://example.com/hot.json"
        itemsPointer = "/data"
    "#;

    #[test]
    fn test_toml_sources() {
        let file = SourcesFile::from_toml(TOML_SOURCES).unwrap();
        assert!(file.validate().is_ok());
        assert_eq!(file.sources.len(), 2);

        let first = &file.sources[0];
        assert_eq!(first.keywords, vec!["芯片"]);
        match &first.kind {
            SourceKind::Html { config } => {
                assert_eq!(config.list.item_selector, ".news-list li");
                assert_eq!(config.list.limit, Some(20));
                assert_eq!(config.base_url.as_deref(), Some("https://www.ithome.com"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        assert_eq!(file.enabled(None).count(), 1);
        assert_eq!(file.enabled(Some("weibo")).count(), 0);
    }

    #[test]
    fn test_json_bare_array() {
        let json = r#"[{
            "id": "hn",
            "kind": "html",
            "config": {"list": {"url": "https://news.example.com", "itemSelector": ".story"}}
        }]"#;
        let file = SourcesFile::from_json(json).unwrap();
        assert_eq!(file.sources[0].display_name(), "hn");
        assert!(file.sources[0].enabled);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"sources": [
            {"id": "a", "kind": "json_api", "api": {"url": "https://a.example.com"}},
            {"id": "a", "kind": "json_api", "api": {"url": "https://b.example.com"}}
        ]}"#;
        let file = SourcesFile::from_json(json).unwrap();
        assert!(file.validate().is_err());
    }
}
