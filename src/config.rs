use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub feeds: Vec<FeedSource>,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub hackernews: HackerNewsConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub summarizer: SummarizerConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// One RSS/Atom feed to ingest. `name` becomes the stored `company` field.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
    /// Feed summaries shorter than this trigger full-page extraction.
    #[serde(default = "default_min_summary_chars")]
    pub min_summary_chars: usize,
    /// Store entries that end up with no content at all.
    #[serde(default)]
    pub store_empty: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_ingest_batch_size(),
            min_summary_chars: default_min_summary_chars(),
            store_empty: false,
        }
    }
}

fn default_ingest_batch_size() -> usize {
    100
}
fn default_min_summary_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct HackerNewsConfig {
    #[serde(default = "default_hn_api_base")]
    pub api_base: String,
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
    /// How many item IDs to walk down from the starting point per run.
    #[serde(default = "default_hn_max_items")]
    pub max_items: u64,
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HackerNewsConfig {
    fn default() -> Self {
        Self {
            api_base: default_hn_api_base(),
            batch_size: default_ingest_batch_size(),
            max_items: default_hn_max_items(),
            timeout_secs: default_extraction_timeout_secs(),
        }
    }
}

fn default_hn_api_base() -> String {
    "https://hacker-news.firebaseio.com/v0".to_string()
}
fn default_hn_max_items() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_extraction_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_extraction_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_extraction_timeout_secs() -> u64 {
    15
}
fn default_user_agent() -> String {
    format!("article-harness/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
    /// Page size for the embedding backfill scan.
    #[serde(default = "default_backfill_page_size")]
    pub page_size: i64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            batch_size: default_embed_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
            page_size: default_backfill_page_size(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_embed_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}
fn default_backfill_page_size() -> i64 {
    500
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichConfig {
    #[serde(default = "default_enrich_page_size")]
    pub page_size: i64,
    /// Repaired content shorter than this marks the row as failed.
    #[serde(default = "default_min_summary_chars")]
    pub min_content_chars: usize,
    /// Source whose rows are re-extracted even when content is present,
    /// because ingestion only stored the bare title for them.
    #[serde(default = "default_priority_source")]
    pub priority_source: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            page_size: default_enrich_page_size(),
            min_content_chars: default_min_summary_chars(),
            priority_source: default_priority_source(),
        }
    }
}

fn default_enrich_page_size() -> i64 {
    50
}
fn default_priority_source() -> String {
    "Hacker News".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_summarizer_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            max_tokens: default_max_tokens(),
            timeout_secs: default_summarizer_timeout_secs(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}
fn default_summarizer_timeout_secs() -> u64 {
    60
}

impl SummarizerConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7878".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate ingest
    if config.ingest.batch_size == 0 {
        anyhow::bail!("ingest.batch_size must be > 0");
    }

    // Validate feeds
    for feed in &config.feeds {
        if feed.name.trim().is_empty() {
            anyhow::bail!("feeds entry with url '{}' is missing a name", feed.url);
        }
        if feed.url.trim().is_empty() {
            anyhow::bail!("feeds entry '{}' is missing a url", feed.name);
        }
    }

    // Validate hackernews
    if config.hackernews.batch_size == 0 {
        anyhow::bail!("hackernews.batch_size must be > 0");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.embedding.page_size < 1 {
        anyhow::bail!("embedding.page_size must be >= 1");
    }

    // Validate enrich
    if config.enrich.page_size < 1 {
        anyhow::bail!("enrich.page_size must be >= 1");
    }

    // Validate summarizer
    if config.summarizer.is_enabled() && config.summarizer.model.is_none() {
        anyhow::bail!(
            "summarizer.model must be specified when provider is '{}'",
            config.summarizer.provider
        );
    }

    match config.summarizer.provider.as_str() {
        "disabled" | "anthropic" => {}
        other => anyhow::bail!(
            "Unknown summarizer provider: '{}'. Must be disabled or anthropic.",
            other
        ),
    }

    Ok(config)
}
