pub mod crawl;
pub mod inspect;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use hotsift::config::Config;

// Re-export command functions for convenience
pub use crawl::{crawl, extract};
pub use inspect::{add_group, check, match_title};

/// File config when given, then `HOTSIFT_*` overrides
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Database path from the flag, falling back to the configured one
pub fn db_path(config: &Config, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| config.storage.sqlite_path.clone())
}
