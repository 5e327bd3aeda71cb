//! Core data models used throughout Article Harness.
//!
//! These types represent the articles, ingestion candidates, and run reports
//! that flow through the ingestion and enrichment pipeline.

/// Sentinel stored in `content` when extraction has definitively failed.
/// Rows carrying it are excluded from embedding until repaired.
pub const SCRAPE_FAILED: &str = "SCRAPE_FAILED";

/// Title assigned when a source entry carries none.
pub const NO_TITLE: &str = "No Title Found";

/// An article candidate produced by a source, before persistence.
#[derive(Debug, Clone)]
pub struct CandidateArticle {
    pub title: String,
    pub url: String,
    pub published_date: Option<String>,
    pub company: String,
    pub summary: Option<String>,
    pub content: Option<String>,
    pub embedding: Option<Vec<f32>>,
}

/// A stored article row.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub published_date: Option<String>,
    pub company: String,
    pub summary: Option<String>,
    pub content: Option<String>,
}

/// One keyset page of rows pulled by a maintenance job.
#[derive(Debug)]
pub struct ArticlePage<T> {
    pub rows: Vec<T>,
    pub count: usize,
}

/// Row shape for the embedding backfill scan.
#[derive(Debug, Clone)]
pub struct EmbeddingCandidate {
    pub id: i64,
    pub content: Option<String>,
}

/// Row shape for the content repair scan.
#[derive(Debug, Clone)]
pub struct RepairCandidate {
    pub id: i64,
    pub url: String,
    pub title: String,
}

/// Resolution of a single source entry after dedup and the quality policy.
#[derive(Debug)]
pub enum EntryOutcome {
    /// Accepted; the finished candidate goes to the write buffer.
    Store(CandidateArticle),
    /// Deliberately not stored.
    Skip(SkipReason),
}

/// Why an entry was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// An article with the same URL already exists.
    Duplicate,
    /// Not an ingestible item (wrong kind, deleted, or no external link).
    NotACandidate,
    /// Nothing usable remained after extraction and fallbacks.
    Empty,
}

/// Aggregated counters for one ingestion run.
#[derive(Debug, Default, Clone)]
pub struct IngestReport {
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub fetched: usize,
    pub ingested: usize,
    pub duplicates: usize,
    pub skipped: usize,
    pub failed: usize,
    pub flush_failures: usize,
}

impl IngestReport {
    /// Record a per-entry resolution. `Store` is counted at flush time,
    /// when the database reports how many rows actually landed.
    pub fn record_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Duplicate => self.duplicates += 1,
            SkipReason::NotACandidate | SkipReason::Empty => self.skipped += 1,
        }
    }
}
