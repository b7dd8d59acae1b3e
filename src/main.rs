mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "hotsift",
    version,
    about = "Configurable news-list extraction with content verification and keyword matching",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); HOTSIFT_* variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every enabled source once
    Crawl {
        /// Sources file (TOML or JSON)
        #[arg(short, long)]
        sources: PathBuf,

        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,

        /// Crawl only the source with this id
        #[arg(long)]
        only: Option<String>,

        /// Print Prometheus metrics after the run
        #[arg(long, default_value = "false")]
        metrics: bool,
    },

    /// Extract one HTML source and print the items as JSON
    Extract {
        /// Source definition (a SourceConfig, TOML or JSON)
        #[arg(short, long)]
        source: PathBuf,

        /// Search keywords
        #[arg(short, long)]
        keyword: Vec<String>,

        /// Skip article page verification
        #[arg(long, default_value = "false")]
        no_content_check: bool,
    },

    /// Check whether an article page has real content
    Check {
        /// Article URL
        url: String,

        /// Base URL used for Referer/Origin when the URL has no origin
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Match a title against the stored keyword groups
    Match {
        /// Title to match
        title: String,

        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Add a keyword group from a rule file (`+word` required, `!word` excluded)
    AddGroup {
        /// Group name
        #[arg(short, long)]
        name: String,

        /// Rule file, one word per line
        #[arg(short, long)]
        rules: PathBuf,

        /// Priority, lower runs first
        #[arg(short, long, default_value = "0")]
        priority: i32,

        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(cli.config.as_deref())?;
    let log_format = cli
        .log_format
        .clone()
        .unwrap_or_else(|| config.logging.format.clone());

    // Initialize tracing/logging
    setup_tracing(&log_format, &config.logging.level, cli.verbose)?;

    tracing::info!("hotsift starting");

    match cli.command {
        Commands::Crawl {
            sources,
            db,
            only,
            metrics,
        } => {
            tracing::info!(
                sources = %sources.display(),
                only = ?only,
                "Starting crawl command"
            );
            commands::crawl(config, sources, db, only, metrics).await?;
        }

        Commands::Extract {
            source,
            keyword,
            no_content_check,
        } => {
            tracing::info!(
                source = %source.display(),
                keywords = ?keyword,
                "Starting extract command"
            );
            commands::extract(config, source, keyword, no_content_check).await?;
        }

        Commands::Check { url, base_url } => {
            tracing::info!(url = %url, "Starting check command");
            commands::check(config, url, base_url).await?;
        }

        Commands::Match { title, db } => {
            commands::match_title(config, title, db).await?;
        }

        Commands::AddGroup {
            name,
            rules,
            priority,
            db,
        } => {
            commands::add_group(config, name, rules, priority, db)?;
        }
    }

    tracing::info!("hotsift completed successfully");
    Ok(())
}

fn setup_tracing(format: &str, level: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("hotsift=debug,info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("hotsift={level},warn")))
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}
