//! In-process integration tests for ingestion, backfill, and enrichment.
//!
//! These drive the real pipeline, jobs, and store against a temp-file
//! SQLite database, with scripted stand-ins for the network-facing
//! pieces (extractor, embedding provider, Hacker News API).

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use article_harness::config::{
    Config, DbConfig, EmbeddingConfig, EnrichConfig, ExtractionConfig, HackerNewsConfig,
    IngestConfig, ServerConfig, SummarizerConfig,
};
use article_harness::db;
use article_harness::embedding::{EmbeddingProvider, EMBED_PREFIX_CHARS};
use article_harness::enrich::{run_backfill, run_enrichment, EMPTY_CONTENT_PLACEHOLDER};
use article_harness::extract::Extract;
use article_harness::hackernews::{HnItem, ItemSource, HN_COMPANY};
use article_harness::migrate;
use article_harness::models::{CandidateArticle, IngestReport, SCRAPE_FAILED};
use article_harness::pipeline::IngestionPipeline;
use article_harness::search::{run_query, SearchMode};
use article_harness::store::ArticleStore;

// ─── Mocks ──────────────────────────────────────────────────────────

/// Extractor that returns a fixed string and records every URL it was
/// asked about.
struct MockExtractor {
    result: String,
    calls: Mutex<Vec<String>>,
}

impl MockExtractor {
    fn returning(result: &str) -> Arc<Self> {
        Arc::new(Self {
            result: result.to_string(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Extract for MockExtractor {
    async fn extract(&self, url: &str) -> String {
        self.calls.lock().unwrap().push(url.to_string());
        self.result.clone()
    }
}

/// Deterministic embedding provider: the vector is a pure function of
/// the input text, so identical texts always embed identically. Records
/// every text it receives.
struct MockEmbeddings {
    texts: Mutex<Vec<String>>,
}

impl MockEmbeddings {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            texts: Mutex::new(Vec::new()),
        })
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }

    fn vector_for(text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        for (i, b) in text.bytes().enumerate() {
            v[i % 8] += b as f32;
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddings {
    fn model_name(&self) -> &str {
        "mock"
    }
    fn dims(&self) -> usize {
        8
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.texts.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}

/// Scripted Hacker News source. IDs listed in `failing` error out on
/// fetch; IDs absent from `items` resolve to `None`.
struct ScriptedItems {
    max_id: u64,
    items: HashMap<u64, HnItem>,
    failing: Vec<u64>,
}

#[async_trait]
impl ItemSource for ScriptedItems {
    async fn max_item_id(&self) -> Result<u64> {
        Ok(self.max_id)
    }

    async fn item(&self, id: u64) -> Result<Option<HnItem>> {
        if self.failing.contains(&id) {
            anyhow::bail!("scripted fetch failure for item {}", id);
        }
        Ok(self.items.get(&id).cloned())
    }
}

fn hn_story(id: u64, url: &str, title: &str) -> HnItem {
    HnItem {
        id,
        kind: Some("story".to_string()),
        deleted: false,
        by: Some("tester".to_string()),
        time: Some(1_700_000_000),
        url: Some(url.to_string()),
        title: Some(title.to_string()),
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

fn test_config(tmp: &TempDir) -> Config {
    Config {
        db: DbConfig {
            path: tmp.path().join("articles.sqlite"),
        },
        feeds: Vec::new(),
        ingest: IngestConfig::default(),
        hackernews: HackerNewsConfig::default(),
        extraction: ExtractionConfig::default(),
        embedding: EmbeddingConfig::default(),
        enrich: EnrichConfig::default(),
        summarizer: SummarizerConfig::default(),
        server: ServerConfig::default(),
    }
}

async fn open_store(config: &Config) -> Arc<ArticleStore> {
    let pool = db::connect(&config.db).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();
    Arc::new(ArticleStore::new(pool))
}

fn candidate(url: &str, title: &str, summary: Option<&str>) -> CandidateArticle {
    CandidateArticle {
        title: title.to_string(),
        url: url.to_string(),
        published_date: None,
        company: "Example".to_string(),
        summary: summary.map(|s| s.to_string()),
        content: None,
        embedding: None,
    }
}

fn pipeline(
    store: Arc<ArticleStore>,
    extractor: Arc<MockExtractor>,
    embeddings: Option<Arc<MockEmbeddings>>,
    config: &Config,
) -> IngestionPipeline {
    let embeddings = embeddings.map(|e| e as Arc<dyn EmbeddingProvider>);
    IngestionPipeline::new(store, extractor, embeddings, config.clone())
}

// ─── Feed ingestion ─────────────────────────────────────────────────

#[tokio::test]
async fn test_end_to_end_feed_ingest() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    // Two entries, one without a link; the linked one carries a short
    // teaser, so extraction kicks in and returns a full article body.
    let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>T</title>
  <item>
    <title>A</title>
    <link>http://a</link>
    <description>A teaser that is well under two hundred characters.</description>
  </item>
  <item>
    <title>Orphan</title>
    <description>no link here</description>
  </item>
</channel></rss>"#;
    let entries = article_harness::feed::parse_entries("Example", rss.as_bytes()).unwrap();
    assert_eq!(entries.len(), 1, "link-less entry must never reach the store");

    let body = "extracted body ".repeat(34); // ~500 chars
    let extractor = MockExtractor::returning(&body);
    let embeddings = MockEmbeddings::new();
    let p = pipeline(store.clone(), extractor.clone(), Some(embeddings.clone()), &config);

    let mut report = IngestReport::default();
    p.ingest_entries(entries, &mut report).await;

    assert_eq!(report.ingested, 1);
    assert_eq!(store.count().await.unwrap(), 1);
    assert_eq!(extractor.calls(), vec!["http://a".to_string()]);

    let rows = store.get_by_ids(&[1]).await.unwrap();
    assert_eq!(rows[0].title, "A");
    assert_eq!(rows[0].url, "http://a");
    assert_eq!(rows[0].content.as_deref(), Some(body.as_str()));

    // The embedding landed at ingest time, not left for backfill.
    assert_eq!(store.count_missing_embeddings().await.unwrap(), 0);
}

#[tokio::test]
async fn test_ingest_twice_yields_no_duplicates() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let entries = vec![
        candidate("http://a", "A", Some(&"s".repeat(300))),
        candidate("http://b", "B", Some(&"s".repeat(300))),
    ];

    let extractor = MockExtractor::returning("");
    let p = pipeline(store.clone(), extractor, None, &config);

    let mut first = IngestReport::default();
    p.ingest_entries(entries.clone(), &mut first).await;
    assert_eq!(first.ingested, 2);

    let mut second = IngestReport::default();
    p.ingest_entries(entries, &mut second).await;
    assert_eq!(second.ingested, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_extractor_invoked_only_for_short_summaries() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let long_summary = "long feed summary ".repeat(20); // > 200 chars
    let entries = vec![
        candidate("http://long", "Long", Some(&long_summary)),
        candidate("http://short", "Short", Some("tiny teaser")),
    ];

    // Extraction fails, so the short entry falls back to its summary.
    let extractor = MockExtractor::returning("");
    let p = pipeline(store.clone(), extractor.clone(), None, &config);

    let mut report = IngestReport::default();
    p.ingest_entries(entries, &mut report).await;

    assert_eq!(extractor.calls(), vec!["http://short".to_string()]);

    let rows = store.get_by_ids(&[1, 2]).await.unwrap();
    assert_eq!(rows[0].content.as_deref(), Some(long_summary.as_str()));
    assert_eq!(rows[1].content.as_deref(), Some("tiny teaser"));
}

#[tokio::test]
async fn test_empty_entry_policy_is_configurable() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    let store = open_store(&config).await;

    let extractor = MockExtractor::returning("");

    // Default policy: nothing usable, nothing stored.
    let p = pipeline(store.clone(), extractor.clone(), None, &config);
    let mut report = IngestReport::default();
    p.ingest_entries(vec![candidate("http://empty", "E", None)], &mut report)
        .await;
    assert_eq!(report.ingested, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.count().await.unwrap(), 0);

    // store_empty keeps the row with empty content.
    config.ingest.store_empty = true;
    let p = pipeline(store.clone(), extractor, None, &config);
    let mut report = IngestReport::default();
    p.ingest_entries(vec![candidate("http://empty", "E", None)], &mut report)
        .await;
    assert_eq!(report.ingested, 1);
    let rows = store.get_by_ids(&[1]).await.unwrap();
    assert_eq!(rows[0].content.as_deref(), Some(""));
}

#[tokio::test]
async fn test_embedding_uses_content_prefix_only() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    // Two summaries sharing a 4000-char prefix but differing after it.
    let prefix = "p".repeat(EMBED_PREFIX_CHARS);
    let entries = vec![
        candidate("http://a", "A", Some(&format!("{}{}", prefix, "tail one"))),
        candidate("http://b", "B", Some(&format!("{}{}", prefix, "a different tail"))),
    ];

    let extractor = MockExtractor::returning("");
    let embeddings = MockEmbeddings::new();
    let p = pipeline(store.clone(), extractor, Some(embeddings.clone()), &config);

    let mut report = IngestReport::default();
    p.ingest_entries(entries, &mut report).await;
    assert_eq!(report.ingested, 2);

    let texts = embeddings.texts();
    assert_eq!(texts.len(), 2);
    assert_eq!(texts[0], texts[1], "only the shared prefix may be embedded");
    assert_eq!(texts[0].chars().count(), EMBED_PREFIX_CHARS);
}

#[tokio::test]
async fn test_batched_flush_persists_every_row() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.ingest.batch_size = 2;
    let store = open_store(&config).await;

    let entries: Vec<CandidateArticle> = (0..5)
        .map(|i| {
            candidate(
                &format!("http://batch/{}", i),
                &format!("B{}", i),
                Some(&"s".repeat(300)),
            )
        })
        .collect();

    let extractor = MockExtractor::returning("");
    let p = pipeline(store.clone(), extractor, None, &config);
    let mut report = IngestReport::default();
    p.ingest_entries(entries, &mut report).await;

    assert_eq!(report.ingested, 5);
    assert_eq!(store.count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_store_error_per_entry_does_not_abort_run() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    // A closed pool makes every dedup lookup error out; the run must
    // still finish and account for each entry.
    store.close().await;

    let entries = vec![
        candidate("http://a", "A", Some(&"s".repeat(300))),
        candidate("http://b", "B", Some(&"s".repeat(300))),
    ];

    let extractor = MockExtractor::returning("");
    let p = pipeline(store.clone(), extractor, None, &config);
    let mut report = IngestReport::default();
    p.ingest_entries(entries, &mut report).await;

    assert_eq!(report.fetched, 2);
    assert_eq!(report.failed, 2);
    assert_eq!(report.ingested, 0);
}

// ─── Hacker News ingestion ──────────────────────────────────────────

#[tokio::test]
async fn test_hackernews_run_filters_and_contains_failures() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let mut items = HashMap::new();
    items.insert(10, hn_story(10, "https://example.com/ten", "Story Ten"));
    items.insert(
        9,
        HnItem {
            kind: Some("comment".to_string()),
            ..hn_story(9, "https://example.com/nine", "A Comment")
        },
    );
    items.insert(
        8,
        HnItem {
            deleted: true,
            ..hn_story(8, "https://example.com/eight", "Deleted")
        },
    );
    items.insert(
        7,
        HnItem {
            url: None,
            ..hn_story(7, "", "Ask HN: no link")
        },
    );
    items.insert(5, hn_story(5, "https://example.com/five", "Story Five"));
    // ID 6 errors out, ID 4 resolves to null.
    let source = ScriptedItems {
        max_id: 10,
        items,
        failing: vec![6],
    };

    let extractor = MockExtractor::returning("");
    let p = pipeline(store.clone(), extractor, None, &config);
    let report = p
        .run_hackernews(&source, None, Some(7))
        .await
        .unwrap();

    // IDs visited: 10..=4. Stored: 10 and 5. Failed: 6.
    assert_eq!(report.ingested, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(store.count().await.unwrap(), 2);

    let rows = store.get_by_ids(&[1, 2]).await.unwrap();
    for row in &rows {
        assert_eq!(row.company, HN_COMPANY);
    }
    // Stories are stored with title as content until enrichment runs.
    let ten = rows.iter().find(|r| r.title == "Story Ten").unwrap();
    assert_eq!(ten.content.as_deref(), Some("Story Ten"));
    assert_eq!(
        ten.summary.as_deref(),
        Some("A story submitted by user tester.")
    );
}

#[tokio::test]
async fn test_hackernews_rerun_is_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let mut items = HashMap::new();
    items.insert(3, hn_story(3, "https://example.com/three", "Three"));
    let source = ScriptedItems {
        max_id: 3,
        items,
        failing: Vec::new(),
    };

    let extractor = MockExtractor::returning("");
    let p = pipeline(store.clone(), extractor, None, &config);

    let first = p.run_hackernews(&source, None, Some(3)).await.unwrap();
    assert_eq!(first.ingested, 1);

    let second = p.run_hackernews(&source, None, Some(3)).await.unwrap();
    assert_eq!(second.ingested, 0);
    assert_eq!(second.duplicates, 1);
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_hackernews_store_error_per_item_does_not_abort_run() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;
    store.close().await;

    let mut items = HashMap::new();
    items.insert(3, hn_story(3, "https://example.com/three", "Three"));
    let source = ScriptedItems {
        max_id: 3,
        items,
        failing: Vec::new(),
    };

    let extractor = MockExtractor::returning("");
    let p = pipeline(store.clone(), extractor, None, &config);
    let report = p.run_hackernews(&source, None, Some(1)).await.unwrap();

    assert_eq!(report.failed, 1);
    assert_eq!(report.ingested, 0);
}

// ─── Store ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_insert_batch_reports_conflict_skips() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let first = vec![candidate("http://dup", "A", None)];
    assert_eq!(store.insert_batch(&first).await.unwrap(), 1);

    // Same URL again plus one new row: the constraint absorbs the dup.
    let second = vec![
        candidate("http://dup", "A again", None),
        candidate("http://new", "B", None),
    ];
    assert_eq!(store.insert_batch(&second).await.unwrap(), 1);
    assert_eq!(store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn test_keyword_search_is_case_insensitive() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    store
        .insert_batch(&[
            candidate("http://1", "Scaling Rust Services", Some("s")),
            candidate("http://2", "Unrelated Title", Some("s")),
        ])
        .await
        .unwrap();

    let hits = run_query(&store, None, SearchMode::Keyword, "rust", 10)
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Scaling Rust Services");
    assert!(hits[0].score.is_none());
}

#[tokio::test]
async fn test_semantic_search_orders_by_similarity() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let mut a = candidate("http://a", "A", None);
    a.content = Some("alpha".to_string());
    a.embedding = Some(MockEmbeddings::vector_for("alpha"));
    let mut b = candidate("http://b", "B", None);
    b.content = Some("totally different words".to_string());
    b.embedding = Some(MockEmbeddings::vector_for("totally different words"));
    store.insert_batch(&[a, b]).await.unwrap();

    let embeddings = MockEmbeddings::new();
    let hits = run_query(
        &store,
        Some(embeddings.as_ref() as &dyn EmbeddingProvider),
        SearchMode::Semantic,
        "alpha",
        10,
    )
    .await
    .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].title, "A");
    let top = hits[0].score.unwrap();
    assert!((top - 1.0).abs() < 1e-5, "exact match should score ~1.0, got {}", top);
    assert!(hits[1].score.unwrap() < top);
}

// ─── Backfill ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_backfill_pages_until_empty() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let rows: Vec<CandidateArticle> = (0..5)
        .map(|i| {
            let mut c = candidate(&format!("http://bf/{}", i), &format!("R{}", i), None);
            c.content = Some(format!("content number {}", i));
            c
        })
        .collect();
    store.insert_batch(&rows).await.unwrap();

    let embeddings = MockEmbeddings::new();
    // N=5, P=2: three non-empty pages (2, 2, 1), then the empty page stops the loop.
    let report = run_backfill(&store, embeddings.as_ref(), 64, 2).await.unwrap();

    assert_eq!(report.pages, 3);
    assert_eq!(report.scanned, 5);
    assert_eq!(report.embedded, 5);
    assert_eq!(report.failed, 0);
    assert_eq!(store.count_missing_embeddings().await.unwrap(), 0);
}

#[tokio::test]
async fn test_backfill_skips_sentinel_and_embeds_placeholder() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let mut failed = candidate("http://failed", "F", None);
    failed.content = Some(SCRAPE_FAILED.to_string());
    let mut empty = candidate("http://empty", "E", None);
    empty.content = Some(String::new());
    store.insert_batch(&[failed, empty]).await.unwrap();

    let embeddings = MockEmbeddings::new();
    let report = run_backfill(&store, embeddings.as_ref(), 64, 50).await.unwrap();

    assert_eq!(report.skipped_failed_content, 1);
    assert_eq!(report.embedded, 1);
    assert_eq!(embeddings.texts(), vec![EMPTY_CONTENT_PLACEHOLDER.to_string()]);

    // The sentinel row stays embedding-less for the repair job.
    assert_eq!(store.count_missing_embeddings().await.unwrap(), 1);
}

// ─── Enrichment ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_enrichment_repairs_missing_and_title_only_content() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let null_content = candidate("http://null", "Null Row", None);
    let mut sentinel = candidate("http://sentinel", "Sentinel Row", None);
    sentinel.content = Some(SCRAPE_FAILED.to_string());
    let mut hn_title_only = candidate("http://hn", "HN Story", None);
    hn_title_only.company = HN_COMPANY.to_string();
    hn_title_only.content = Some("HN Story".to_string());
    let mut healthy = candidate("http://fine", "Fine", None);
    healthy.content = Some("h".repeat(400));
    store
        .insert_batch(&[null_content, sentinel, hn_title_only, healthy])
        .await
        .unwrap();

    let body = "repaired body text ".repeat(20); // > 200 chars
    let extractor = MockExtractor::returning(&body);
    let embeddings = MockEmbeddings::new();
    let report = run_enrichment(
        &store,
        extractor.as_ref(),
        Some(embeddings.as_ref() as &dyn EmbeddingProvider),
        &config.enrich,
    )
    .await
    .unwrap();

    assert_eq!(report.repaired, 3);
    assert_eq!(report.marked_failed, 0);

    let rows = store.get_by_ids(&[1, 2, 3, 4]).await.unwrap();
    for row in rows.iter().take(3) {
        assert_eq!(row.content.as_deref(), Some(body.as_str()));
    }
    // The healthy non-priority row was never a candidate.
    assert_eq!(rows[3].content.as_deref(), Some("h".repeat(400).as_str()));
    assert!(!extractor.calls().contains(&"http://fine".to_string()));
}

#[tokio::test]
async fn test_enrichment_marks_short_extraction_as_failed() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let store = open_store(&config).await;

    let null_content = candidate("http://null", "N", None);
    store.insert_batch(&[null_content]).await.unwrap();

    // Re-extraction comes back below the 200-char minimum.
    let extractor = MockExtractor::returning("too short to count as an article");
    let report = run_enrichment(&store, extractor.as_ref(), None, &config.enrich)
        .await
        .unwrap();

    assert_eq!(report.repaired, 0);
    assert_eq!(report.marked_failed, 1);

    let rows = store.get_by_ids(&[1]).await.unwrap();
    assert_eq!(rows[0].content.as_deref(), Some(SCRAPE_FAILED));
    // Sentinel rows keep a null embedding until repaired.
    assert_eq!(store.count_missing_embeddings().await.unwrap(), 1);
}

#[tokio::test]
async fn test_enrichment_terminates_when_everything_fails() {
    let tmp = TempDir::new().unwrap();
    let mut config = test_config(&tmp);
    config.enrich.page_size = 2;
    let store = open_store(&config).await;

    let rows: Vec<CandidateArticle> = (0..5)
        .map(|i| candidate(&format!("http://fail/{}", i), &format!("F{}", i), None))
        .collect();
    store.insert_batch(&rows).await.unwrap();

    let extractor = MockExtractor::returning("");
    let report = run_enrichment(&store, extractor.as_ref(), None, &config.enrich)
        .await
        .unwrap();

    // Keyset pagination walks past rows it just marked as failed, so
    // the loop reaches the empty page instead of rescanning them.
    assert_eq!(report.marked_failed, 5);
    assert_eq!(report.pages, 3);
}
