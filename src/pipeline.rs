//! Ingestion pipeline orchestration.
//!
//! Coordinates the full flow for both source kinds: fetch → dedup →
//! content quality policy → batched embedding → batched storage. Every
//! per-entry decision is a value ([`EntryOutcome`]) aggregated into an
//! [`IngestReport`]; no unit failure aborts a run.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::warn;

use crate::config::Config;
use crate::db;
use crate::embedding::{create_provider, embedding_input, EmbeddingProvider};
use crate::extract::{Extract, HttpExtractor};
use crate::feed::FeedReader;
use crate::hackernews::{self, HnClient, HnItem, ItemSource};
use crate::models::{CandidateArticle, EntryOutcome, IngestReport, SkipReason};
use crate::store::ArticleStore;

pub struct IngestionPipeline {
    store: Arc<ArticleStore>,
    extractor: Arc<dyn Extract>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    config: Config,
}

impl IngestionPipeline {
    /// `embeddings = None` means ingest without vectors; the backfill
    /// job picks those rows up later.
    pub fn new(
        store: Arc<ArticleStore>,
        extractor: Arc<dyn Extract>,
        embeddings: Option<Arc<dyn EmbeddingProvider>>,
        config: Config,
    ) -> Self {
        Self {
            store,
            extractor,
            embeddings,
            config,
        }
    }

    /// Ingest every configured feed. A failing feed is logged and
    /// skipped; the remaining sources still run.
    pub async fn run_feeds(
        &self,
        reader: &FeedReader,
        limit: Option<usize>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        for source in &self.config.feeds {
            let mut entries = match reader.fetch(source).await {
                Ok(entries) => {
                    report.sources_ok += 1;
                    entries
                }
                Err(e) => {
                    warn!(source = source.name.as_str(), error = %e, "feed fetch failed; skipping source");
                    report.sources_failed += 1;
                    continue;
                }
            };

            if let Some(limit) = limit {
                entries.truncate(limit);
            }

            self.ingest_entries(entries, &mut report).await;
        }

        Ok(report)
    }

    /// Run one source's entries through dedup, the quality policy, and
    /// the batched flush. Exposed so callers that already hold parsed
    /// entries (tests, one-off imports) can skip the network fetch.
    ///
    /// A failing entry (a store error during the dedup probe, say) is
    /// logged, counted, and skipped; its siblings still run.
    pub async fn ingest_entries(&self, entries: Vec<CandidateArticle>, report: &mut IngestReport) {
        report.fetched += entries.len();

        let mut buffer: Vec<CandidateArticle> = Vec::new();
        for candidate in entries {
            let source = candidate.company.clone();
            let url = candidate.url.clone();
            match self.resolve_feed_entry(candidate).await {
                Ok(EntryOutcome::Store(candidate)) => {
                    buffer.push(candidate);
                    if buffer.len() >= self.config.ingest.batch_size {
                        self.flush(&mut buffer, report).await;
                    }
                }
                Ok(EntryOutcome::Skip(reason)) => report.record_skip(reason),
                Err(e) => {
                    warn!(source = source.as_str(), url = url.as_str(), error = %e, "could not process entry; skipping");
                    report.failed += 1;
                }
            }
        }
        self.flush(&mut buffer, report).await;
    }

    /// Walk Hacker News item IDs downward and ingest the stories found.
    ///
    /// `start_id = None` starts from the newest item. The walk visits at
    /// most `max_items` IDs (config default when `None`) and never goes
    /// below item 1. Per-item fetch failures are logged and skipped.
    pub async fn run_hackernews(
        &self,
        source: &dyn ItemSource,
        start_id: Option<u64>,
        max_items: Option<u64>,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        let start = match start_id {
            Some(id) => id,
            None => source.max_item_id().await?,
        };
        let max_items = max_items.unwrap_or(self.config.hackernews.max_items);
        let span = max_items.min(start);
        let lowest = start - span + 1;

        let mut buffer: Vec<CandidateArticle> = Vec::new();
        for id in (lowest..=start).rev() {
            match source.item(id).await {
                Ok(Some(item)) => {
                    report.fetched += 1;
                    match self.resolve_story(&item).await {
                        Ok(EntryOutcome::Store(candidate)) => {
                            buffer.push(candidate);
                            if buffer.len() >= self.config.hackernews.batch_size {
                                self.flush(&mut buffer, &mut report).await;
                            }
                        }
                        Ok(EntryOutcome::Skip(reason)) => report.record_skip(reason),
                        Err(e) => {
                            warn!(item = item.id, error = %e, "could not process item; skipping");
                            report.failed += 1;
                        }
                    }
                }
                Ok(None) => {
                    report.fetched += 1;
                    report.record_skip(SkipReason::NotACandidate);
                }
                Err(e) => {
                    warn!(item = id, error = %e, "could not process item; skipping");
                    report.failed += 1;
                }
            }
        }
        self.flush(&mut buffer, &mut report).await;

        Ok(report)
    }

    /// Dedup, then the content quality policy.
    ///
    /// A summary at or above the threshold is trusted as content. A
    /// thinner one means the feed only carried a teaser, so the page
    /// itself is extracted; if extraction comes back empty the summary
    /// is still the best text available.
    async fn resolve_feed_entry(&self, mut candidate: CandidateArticle) -> Result<EntryOutcome> {
        if self.store.exists_by_url(&candidate.url).await? {
            return Ok(EntryOutcome::Skip(SkipReason::Duplicate));
        }

        let summary_len = candidate
            .summary
            .as_deref()
            .map(|s| s.chars().count())
            .unwrap_or(0);

        let content = if summary_len < self.config.ingest.min_summary_chars {
            let extracted = self.extractor.extract(&candidate.url).await;
            if extracted.is_empty() {
                candidate.summary.clone().unwrap_or_default()
            } else {
                extracted
            }
        } else {
            candidate.summary.clone().unwrap_or_default()
        };

        if content.is_empty() && !self.config.ingest.store_empty {
            return Ok(EntryOutcome::Skip(SkipReason::Empty));
        }

        candidate.content = Some(content);
        Ok(EntryOutcome::Store(candidate))
    }

    /// Filter first (the way the item API is sampled, most IDs are
    /// comments), then dedup against the external URL.
    async fn resolve_story(&self, item: &HnItem) -> Result<EntryOutcome> {
        if !hackernews::is_candidate(item) {
            return Ok(EntryOutcome::Skip(SkipReason::NotACandidate));
        }

        let candidate = hackernews::story_candidate(item);
        if self.store.exists_by_url(&candidate.url).await? {
            return Ok(EntryOutcome::Skip(SkipReason::Duplicate));
        }

        Ok(EntryOutcome::Store(candidate))
    }

    /// Embed what can be embedded, then insert the batch.
    ///
    /// Embedding failures degrade to rows without vectors (backfill
    /// repairs them); an insert failure drops the batch for this run and
    /// an idempotent rerun recovers it.
    async fn flush(&self, buffer: &mut Vec<CandidateArticle>, report: &mut IngestReport) {
        if buffer.is_empty() {
            return;
        }

        if let Some(provider) = &self.embeddings {
            self.embed_buffer(provider.as_ref(), buffer).await;
        }

        match self.store.insert_batch(buffer).await {
            Ok(inserted) => {
                report.ingested += inserted;
                // Conflict-skipped rows lost a race with another writer.
                report.duplicates += buffer.len() - inserted;
            }
            Err(e) => {
                warn!(error = %e, batch = buffer.len(), "batch insert failed; batch dropped for this run");
                report.failed += buffer.len();
                report.flush_failures += 1;
            }
        }
        buffer.clear();
    }

    async fn embed_buffer(&self, provider: &dyn EmbeddingProvider, buffer: &mut [CandidateArticle]) {
        let mut targets: Vec<usize> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        for (idx, candidate) in buffer.iter().enumerate() {
            if let Some(content) = candidate.content.as_deref() {
                if !content.is_empty() {
                    targets.push(idx);
                    texts.push(embedding_input(content).to_string());
                }
            }
        }

        let batch_size = self.config.embedding.batch_size.max(1);
        for (chunk_targets, chunk_texts) in targets.chunks(batch_size).zip(texts.chunks(batch_size))
        {
            match provider.embed_batch(chunk_texts).await {
                Ok(vectors) if vectors.len() == chunk_texts.len() => {
                    for (&idx, vector) in chunk_targets.iter().zip(vectors) {
                        buffer[idx].embedding = Some(vector);
                    }
                }
                Ok(vectors) => {
                    warn!(
                        expected = chunk_texts.len(),
                        got = vectors.len(),
                        "embedding batch returned wrong vector count; rows left for backfill"
                    );
                }
                Err(e) => {
                    warn!(error = %e, "batch embedding failed; rows left for backfill");
                }
            }
        }
    }
}

// ============ Command wrappers ============

pub async fn run_ingest_feeds(config: &Config, limit: Option<usize>) -> Result<()> {
    if config.feeds.is_empty() {
        bail!("No feeds configured. Add [[feeds]] entries to the config file.");
    }

    let pool = db::connect(&config.db).await?;
    let store = Arc::new(ArticleStore::new(pool));
    let reader = FeedReader::new(config.extraction.timeout_secs, &config.extraction.user_agent)?;
    let pipeline = build_pipeline(store.clone(), config)?;

    let report = pipeline.run_feeds(&reader, limit).await?;

    println!("ingest feeds");
    println!(
        "  sources: {} ok, {} failed",
        report.sources_ok, report.sources_failed
    );
    print_entry_counts(&report);
    println!("ok");

    store.close().await;
    Ok(())
}

pub async fn run_ingest_hackernews(
    config: &Config,
    start_id: Option<u64>,
    max_items: Option<u64>,
) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    let store = Arc::new(ArticleStore::new(pool));
    let client = HnClient::new(&config.hackernews, &config.extraction.user_agent)?;
    let pipeline = build_pipeline(store.clone(), config)?;

    let report = pipeline.run_hackernews(&client, start_id, max_items).await?;

    println!("ingest hackernews");
    print_entry_counts(&report);
    println!("ok");

    store.close().await;
    Ok(())
}

fn build_pipeline(store: Arc<ArticleStore>, config: &Config) -> Result<IngestionPipeline> {
    let extractor: Arc<dyn Extract> = Arc::new(HttpExtractor::new(&config.extraction)?);
    let embeddings = if config.embedding.is_enabled() {
        Some(create_provider(&config.embedding)?)
    } else {
        None
    };
    Ok(IngestionPipeline::new(
        store,
        extractor,
        embeddings,
        config.clone(),
    ))
}

fn print_entry_counts(report: &IngestReport) {
    println!("  fetched: {}", report.fetched);
    println!("  ingested: {}", report.ingested);
    println!("  duplicates: {}", report.duplicates);
    println!("  skipped: {}", report.skipped);
    println!("  failed: {}", report.failed);
    if report.flush_failures > 0 {
        println!("  flush failures: {}", report.flush_failures);
    }
}
