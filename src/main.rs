//! # Article Harness CLI (`art`)
//!
//! The `art` binary is the primary interface for Article Harness. It
//! provides commands for database initialization, feed and Hacker News
//! ingestion, embedding backfill, content repair, search, and starting
//! the REST API server.
//!
//! ## Usage
//!
//! ```bash
//! art --config ./config/art.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `art init` | Create the SQLite database and run schema migrations |
//! | `art ingest feeds` | Ingest every configured RSS/Atom feed |
//! | `art ingest hackernews` | Walk recent Hacker News items and ingest stories |
//! | `art embed pending` | Backfill missing embeddings |
//! | `art enrich` | Re-extract missing or inadequate article content |
//! | `art search "<query>"` | Search stored articles |
//! | `art serve` | Start the REST API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! art init --config ./config/art.toml
//!
//! # Ingest configured feeds
//! art ingest feeds --config ./config/art.toml
//!
//! # Ingest the 500 newest Hacker News items
//! art ingest hackernews --config ./config/art.toml
//!
//! # Backfill embeddings for rows that missed them
//! art embed pending --config ./config/art.toml
//!
//! # Semantic search
//! art search "rust async runtimes" --mode semantic --config ./config/art.toml
//!
//! # Start the API server
//! art serve --config ./config/art.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use article_harness::{config, db, enrich, migrate, pipeline, search, server};

/// Article Harness CLI — a self-hosted article ingestion, semantic
/// search, and summarization service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/art.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "art",
    about = "Article Harness — a self-hosted article ingestion, search, and summarization service",
    version,
    long_about = "Article Harness ingests articles from RSS/Atom feeds and Hacker News into a \
    SQLite store, backfills vector embeddings, and serves keyword/semantic search plus LLM-based \
    summarization over a small REST API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/art.toml`. All feed, database, embedding,
    /// and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/art.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the articles table with its
    /// URL uniqueness constraint. This command is idempotent — running
    /// it multiple times is safe.
    Init,

    /// Ingest articles from a source.
    ///
    /// Each run dedups against the store by URL, so reruns are safe and
    /// only pick up what previous runs missed.
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },

    /// Manage embedding vectors.
    ///
    /// Requires an embedding provider (e.g. OpenAI) to be configured.
    Embed {
        #[command(subcommand)]
        action: EmbedAction,
    },

    /// Re-extract missing or inadequate article content.
    ///
    /// Scans for rows whose content is null, marked as failed, or (for
    /// Hacker News rows) just the bare story title, re-fetches the page,
    /// and updates content and embedding. Pages that still fail are
    /// marked so reruns retry them deliberately.
    Enrich {
        /// Override the scan page size from config.
        #[arg(long)]
        page_size: Option<i64>,

        /// Show the candidate count without repairing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search stored articles.
    ///
    /// Keyword mode matches titles; semantic mode ranks by embedding
    /// similarity and requires an embedding provider.
    Search {
        /// The search query string.
        query: String,

        /// Search mode: `keyword` (title match) or `semantic` (vector similarity).
        #[arg(long, default_value = "keyword")]
        mode: String,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Start the REST API server.
    ///
    /// Serves `/health`, `/search`, and `/summarize` on the address
    /// configured in `[server].bind`.
    Serve,
}

/// Ingestion sources.
#[derive(Subcommand)]
enum IngestSource {
    /// Ingest every feed listed under `[[feeds]]` in the config.
    ///
    /// A failing feed is logged and skipped; the remaining sources
    /// still run.
    Feeds {
        /// Maximum number of entries to take per feed.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Walk Hacker News item IDs downward and ingest linked stories.
    ///
    /// Comments, jobs, deleted items, and stories without an external
    /// URL are filtered out. Stories are stored with their title as
    /// content; `art enrich` fetches the full page text later.
    Hackernews {
        /// Maximum number of item IDs to visit (config default: 500).
        #[arg(long)]
        max_items: Option<u64>,

        /// Start from this item ID instead of the newest one. Useful
        /// for resuming an interrupted sweep.
        #[arg(long)]
        start_id: Option<u64>,
    },
}

/// Embedding management subcommands.
#[derive(Subcommand)]
enum EmbedAction {
    /// Embed articles that have no embedding yet.
    ///
    /// Pages through rows with a null embedding and fills them in.
    /// Rows marked as scrape-failed are left for `art enrich`.
    Pending {
        /// Override the scan page size from config.
        #[arg(long)]
        page_size: Option<i64>,

        /// Show the pending count without embedding anything.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest { source } => match source {
            IngestSource::Feeds { limit } => {
                pipeline::run_ingest_feeds(&cfg, limit).await?;
            }
            IngestSource::Hackernews {
                max_items,
                start_id,
            } => {
                pipeline::run_ingest_hackernews(&cfg, start_id, max_items).await?;
            }
        },
        Commands::Embed { action } => match action {
            EmbedAction::Pending { page_size, dry_run } => {
                enrich::run_embed_pending(&cfg, page_size, dry_run).await?;
            }
        },
        Commands::Enrich { page_size, dry_run } => {
            enrich::run_enrich(&cfg, page_size, dry_run).await?;
        }
        Commands::Search { query, mode, limit } => {
            search::run_search(&cfg, &query, &mode, limit).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
