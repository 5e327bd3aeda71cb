//! Embedding backfill and content repair jobs.
//!
//! Both jobs walk the table in keyset pages and terminate only when a
//! page comes back empty. Rows a pass inspects but cannot finish
//! (sentinel content, embedding failure) are not served to the same run
//! again, so the empty page is always reached.

use anyhow::{bail, Result};
use tracing::warn;

use crate::config::{Config, EnrichConfig};
use crate::db;
use crate::embedding::{self, create_provider, embedding_input, EmbeddingProvider};
use crate::extract::{Extract, HttpExtractor};
use crate::models::SCRAPE_FAILED;
use crate::store::ArticleStore;

/// Embedded in place of empty content (the row still deserves a vector).
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "no content";

/// Counters for one backfill run.
#[derive(Debug, Default)]
pub struct BackfillReport {
    pub scanned: usize,
    pub embedded: usize,
    pub skipped_failed_content: usize,
    pub failed: usize,
    pub pages: usize,
}

/// Page through rows with no embedding and fill them in.
///
/// Rows whose content carries the failure sentinel are skipped: the
/// repair job owns them. Empty content embeds the placeholder text;
/// everything else embeds its content prefix. A failed embedding batch
/// leaves its rows for a rerun; a failed database write aborts the run.
pub async fn run_backfill(
    store: &ArticleStore,
    provider: &dyn EmbeddingProvider,
    batch_size: usize,
    page_size: i64,
) -> Result<BackfillReport> {
    let mut report = BackfillReport::default();
    let mut after_id = 0i64;
    let batch_size = batch_size.max(1);

    loop {
        let page = store.missing_embedding_page(after_id, page_size).await?;
        if page.count == 0 {
            break;
        }
        report.pages += 1;
        report.scanned += page.count;
        if let Some(last) = page.rows.last() {
            after_id = last.id;
        }

        let mut ids: Vec<i64> = Vec::new();
        let mut texts: Vec<String> = Vec::new();
        for row in &page.rows {
            let content = row.content.as_deref().unwrap_or("").trim();
            if content == SCRAPE_FAILED {
                report.skipped_failed_content += 1;
                continue;
            }
            let text = if content.is_empty() {
                EMPTY_CONTENT_PLACEHOLDER.to_string()
            } else {
                embedding_input(content).to_string()
            };
            ids.push(row.id);
            texts.push(text);
        }

        for (id_batch, text_batch) in ids.chunks(batch_size).zip(texts.chunks(batch_size)) {
            match provider.embed_batch(text_batch).await {
                Ok(vectors) if vectors.len() == text_batch.len() => {
                    let updates: Vec<(i64, Vec<f32>)> =
                        id_batch.iter().copied().zip(vectors).collect();
                    store.upsert_embeddings(&updates).await?;
                    report.embedded += updates.len();
                }
                Ok(vectors) => {
                    warn!(
                        expected = text_batch.len(),
                        got = vectors.len(),
                        "embedding batch returned wrong vector count; batch left for rerun"
                    );
                    report.failed += text_batch.len();
                }
                Err(e) => {
                    warn!(error = %e, "embedding batch failed; batch left for rerun");
                    report.failed += text_batch.len();
                }
            }
        }
    }

    Ok(report)
}

/// Counters for one repair run.
#[derive(Debug, Default)]
pub struct EnrichReport {
    pub scanned: usize,
    pub repaired: usize,
    pub marked_failed: usize,
    pub pages: usize,
}

/// Find rows with missing or inadequate content and re-extract them.
///
/// A re-extraction at or above the length threshold replaces the
/// content and recomputes the embedding. Anything shorter marks the row
/// with the sentinel rather than leaving near-empty text that would be
/// silently rescanned forever.
pub async fn run_enrichment(
    store: &ArticleStore,
    extractor: &dyn Extract,
    embeddings: Option<&dyn EmbeddingProvider>,
    config: &EnrichConfig,
) -> Result<EnrichReport> {
    let mut report = EnrichReport::default();
    let mut after_id = 0i64;

    loop {
        let page = store
            .repair_candidate_page(
                after_id,
                config.page_size,
                &config.priority_source,
                config.min_content_chars,
            )
            .await?;
        if page.count == 0 {
            break;
        }
        report.pages += 1;
        report.scanned += page.count;
        if let Some(last) = page.rows.last() {
            after_id = last.id;
        }

        for row in &page.rows {
            let content = extractor.extract(&row.url).await;

            if content.chars().count() >= config.min_content_chars {
                let vector = match embeddings {
                    Some(provider) => {
                        match embedding::embed_query(provider, embedding_input(&content)).await {
                            Ok(vector) => Some(vector),
                            Err(e) => {
                                warn!(id = row.id, error = %e, "embedding repaired content failed; left for backfill");
                                None
                            }
                        }
                    }
                    None => None,
                };
                store
                    .update_repair(row.id, &content, vector.as_deref())
                    .await?;
                report.repaired += 1;
            } else {
                store.mark_scrape_failed(row.id).await?;
                report.marked_failed += 1;
            }
        }
    }

    Ok(report)
}

// ============ Command wrappers ============

pub async fn run_embed_pending(
    config: &Config,
    page_size_override: Option<i64>,
    dry_run: bool,
) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let pool = db::connect(&config.db).await?;
    let store = ArticleStore::new(pool);
    let page_size = page_size_override.unwrap_or(config.embedding.page_size);

    if dry_run {
        let pending = store.count_missing_embeddings().await?;
        println!("embed pending (dry-run)");
        println!("  articles missing embeddings: {}", pending);
        store.close().await;
        return Ok(());
    }

    let provider = create_provider(&config.embedding)?;
    let report = run_backfill(
        &store,
        provider.as_ref(),
        config.embedding.batch_size,
        page_size,
    )
    .await?;

    println!("embed pending");
    println!("  model: {}", provider.model_name());
    println!("  scanned: {}", report.scanned);
    println!("  embedded: {}", report.embedded);
    println!("  skipped (failed content): {}", report.skipped_failed_content);
    println!("  failed: {}", report.failed);
    println!("  pages: {}", report.pages);
    println!("ok");

    store.close().await;
    Ok(())
}

pub async fn run_enrich(
    config: &Config,
    page_size_override: Option<i64>,
    dry_run: bool,
) -> Result<()> {
    let pool = db::connect(&config.db).await?;
    let store = ArticleStore::new(pool);

    let mut job_config = config.enrich.clone();
    if let Some(page_size) = page_size_override {
        job_config.page_size = page_size;
    }

    if dry_run {
        let candidates = store
            .count_repair_candidates(&job_config.priority_source, job_config.min_content_chars)
            .await?;
        println!("enrich (dry-run)");
        println!("  articles needing repair: {}", candidates);
        store.close().await;
        return Ok(());
    }

    let extractor = HttpExtractor::new(&config.extraction)?;
    let embeddings = if config.embedding.is_enabled() {
        Some(create_provider(&config.embedding)?)
    } else {
        None
    };

    let report = run_enrichment(&store, &extractor, embeddings.as_deref(), &job_config).await?;

    println!("enrich");
    println!("  scanned: {}", report.scanned);
    println!("  repaired: {}", report.repaired);
    println!("  marked failed: {}", report.marked_failed);
    println!("  pages: {}", report.pages);
    println!("ok");

    store.close().await;
    Ok(())
}
