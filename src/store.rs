//! SQLite-backed article store.
//!
//! [`ArticleStore`] is the only component that owns SQL. Everything above it
//! (pipeline, jobs, search, server) goes through these methods, so tests can
//! point the whole stack at a temp-file database.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{
    Article, ArticlePage, CandidateArticle, EmbeddingCandidate, RepairCandidate, SCRAPE_FAILED,
};

type ArticleRow = (
    i64,
    String,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
);

const ARTICLE_COLUMNS: &str = "id, title, url, published_date, company, summary, content";

fn article_from_row(row: ArticleRow) -> Article {
    Article {
        id: row.0,
        title: row.1,
        url: row.2,
        published_date: row.3,
        company: row.4,
        summary: row.5,
        content: row.6,
    }
}

pub struct ArticleStore {
    pool: SqlitePool,
}

impl ArticleStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // ============ Ingestion ============

    /// Dedup probe. The UNIQUE constraint on `url` remains the real
    /// guarantee; this check only saves buffering work.
    pub async fn exists_by_url(&self, url: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM articles WHERE url = ? LIMIT 1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    /// Insert a batch of candidates in one transaction.
    ///
    /// Rows whose `url` already exists are silently skipped
    /// (`ON CONFLICT DO NOTHING`), so concurrent runs cannot produce
    /// duplicates. Returns the number of rows actually inserted; any
    /// error rolls back the whole batch.
    pub async fn insert_batch(&self, batch: &[CandidateArticle]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for candidate in batch {
            let blob = candidate.embedding.as_deref().map(vec_to_blob);
            let result = sqlx::query(
                r#"
                INSERT INTO articles (title, url, published_date, company, summary, content, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(url) DO NOTHING
                "#,
            )
            .bind(&candidate.title)
            .bind(&candidate.url)
            .bind(&candidate.published_date)
            .bind(&candidate.company)
            .bind(&candidate.summary)
            .bind(&candidate.content)
            .bind(blob)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // ============ Backfill / Enrichment ============

    /// One keyset page of rows with no embedding yet.
    ///
    /// Keyset pagination (`id > after_id`) means rows the caller inspects
    /// but leaves embedding-less (sentinel-failed content) are not served
    /// again within a run, so the scan always reaches the empty page.
    pub async fn missing_embedding_page(
        &self,
        after_id: i64,
        limit: i64,
    ) -> Result<ArticlePage<EmbeddingCandidate>> {
        let rows: Vec<(i64, Option<String>)> = sqlx::query_as(
            r#"
            SELECT id, content FROM articles
            WHERE embedding IS NULL AND id > ?
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let rows: Vec<EmbeddingCandidate> = rows
            .into_iter()
            .map(|(id, content)| EmbeddingCandidate { id, content })
            .collect();
        let count = rows.len();
        Ok(ArticlePage { rows, count })
    }

    pub async fn count_missing_embeddings(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE embedding IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Write back a page of computed embeddings in one transaction.
    pub async fn upsert_embeddings(&self, updates: &[(i64, Vec<f32>)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for (id, vector) in updates {
            sqlx::query("UPDATE articles SET embedding = ? WHERE id = ?")
                .bind(vec_to_blob(vector))
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// One keyset page of rows whose content needs repair: null content,
    /// sentinel-failed content, or (for the designated source whose
    /// ingestion only stores a title) short or title-identical content.
    pub async fn repair_candidate_page(
        &self,
        after_id: i64,
        limit: i64,
        priority_source: &str,
        min_chars: usize,
    ) -> Result<ArticlePage<RepairCandidate>> {
        let rows: Vec<(i64, String, String)> = sqlx::query_as(
            r#"
            SELECT id, url, title FROM articles
            WHERE id > ?
              AND (
                content IS NULL
                OR content = ?
                OR (company = ? AND (LENGTH(content) < ? OR content = title))
              )
            ORDER BY id ASC
            LIMIT ?
            "#,
        )
        .bind(after_id)
        .bind(SCRAPE_FAILED)
        .bind(priority_source)
        .bind(min_chars as i64)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let rows: Vec<RepairCandidate> = rows
            .into_iter()
            .map(|(id, url, title)| RepairCandidate { id, url, title })
            .collect();
        let count = rows.len();
        Ok(ArticlePage { rows, count })
    }

    pub async fn count_repair_candidates(
        &self,
        priority_source: &str,
        min_chars: usize,
    ) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM articles
            WHERE content IS NULL
               OR content = ?
               OR (company = ? AND (LENGTH(content) < ? OR content = title))
            "#,
        )
        .bind(SCRAPE_FAILED)
        .bind(priority_source)
        .bind(min_chars as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Replace a repaired row's content. Passing an embedding stores it;
    /// passing `None` clears the column so the row becomes eligible for
    /// the next backfill pass.
    pub async fn update_repair(
        &self,
        id: i64,
        content: &str,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        sqlx::query("UPDATE articles SET content = ?, embedding = ? WHERE id = ?")
            .bind(content)
            .bind(embedding.map(vec_to_blob))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark a row as definitively failed. The embedding column is left
    /// untouched.
    pub async fn mark_scrape_failed(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE articles SET content = ? WHERE id = ?")
            .bind(SCRAPE_FAILED)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ============ Lookup / Search ============

    pub async fn get_by_ids(&self, ids: &[i64]) -> Result<Vec<Article>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM articles WHERE id IN ({}) ORDER BY id ASC",
            ARTICLE_COLUMNS, placeholders
        );

        let mut query = sqlx::query_as::<_, ArticleRow>(&sql);
        for id in ids {
            query = query.bind(id);
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(article_from_row).collect())
    }

    /// Case-insensitive substring match on title, newest first.
    pub async fn search_keyword(&self, query: &str, limit: i64) -> Result<Vec<Article>> {
        let pattern = format!("%{}%", query);
        let sql = format!(
            r#"
            SELECT {} FROM articles
            WHERE title LIKE ?
            ORDER BY published_date IS NULL, published_date DESC, id DESC
            LIMIT ?
            "#,
            ARTICLE_COLUMNS
        );

        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(pattern)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(article_from_row).collect())
    }

    /// Cosine similarity of the query vector against every stored
    /// embedding, best first. The corpus is small enough that scoring
    /// happens here rather than in a vector index.
    pub async fn search_semantic(
        &self,
        query_vec: &[f32],
        limit: usize,
    ) -> Result<Vec<(Article, f32)>> {
        let sql = format!(
            "SELECT {}, embedding FROM articles WHERE embedding IS NOT NULL",
            ARTICLE_COLUMNS
        );

        let rows: Vec<(
            i64,
            String,
            String,
            Option<String>,
            String,
            Option<String>,
            Option<String>,
            Vec<u8>,
        )> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let mut scored: Vec<(Article, f32)> = rows
            .into_iter()
            .map(|(id, title, url, published_date, company, summary, content, blob)| {
                let score = cosine_similarity(query_vec, &blob_to_vec(&blob));
                (
                    article_from_row((id, title, url, published_date, company, summary, content)),
                    score,
                )
            })
            .collect();

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.id.cmp(&b.0.id))
        });
        scored.truncate(limit);
        Ok(scored)
    }
}
