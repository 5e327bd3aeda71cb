//! Keyword and semantic search over the article store.
//!
//! Ranking itself lives in the store ([`ArticleStore::search_keyword`] /
//! [`ArticleStore::search_semantic`]); this module parses the mode,
//! embeds semantic queries, and shapes results for the CLI and the API.

use anyhow::{bail, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::models::Article;
use crate::store::ArticleStore;

/// Characters of content shown as the result excerpt.
const SNIPPET_CHARS: usize = 240;

pub const DEFAULT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Keyword,
    Semantic,
}

impl SearchMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "keyword" => Ok(Self::Keyword),
            "semantic" => Ok(Self::Semantic),
            other => bail!("Unknown search mode: {}. Use keyword or semantic.", other),
        }
    }
}

/// One ranked search result. `score` is present only for semantic
/// matches; keyword results are ordered by recency instead.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: i64,
    pub title: String,
    pub url: String,
    pub company: String,
    pub published_date: Option<String>,
    pub score: Option<f32>,
    pub snippet: String,
}

/// Execute a query in the given mode.
///
/// Semantic mode embeds the query text with the provided embedding
/// provider; passing `None` there is an error, since keyword search is
/// the only mode that works without vectors.
pub async fn run_query(
    store: &ArticleStore,
    embeddings: Option<&dyn EmbeddingProvider>,
    mode: SearchMode,
    query: &str,
    limit: i64,
) -> Result<Vec<SearchHit>> {
    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    match mode {
        SearchMode::Keyword => {
            let articles = store.search_keyword(query, limit).await?;
            Ok(articles
                .into_iter()
                .map(|article| hit_from(article, None))
                .collect())
        }
        SearchMode::Semantic => {
            let provider = match embeddings {
                Some(provider) => provider,
                None => {
                    bail!("Mode 'semantic' requires embeddings. Set [embedding] provider in config.")
                }
            };
            let query_vec = embedding::embed_query(provider, query).await?;
            let scored = store
                .search_semantic(&query_vec, limit.max(0) as usize)
                .await?;
            Ok(scored
                .into_iter()
                .map(|(article, score)| hit_from(article, Some(score)))
                .collect())
        }
    }
}

fn hit_from(article: Article, score: Option<f32>) -> SearchHit {
    let snippet = article
        .content
        .as_deref()
        .or(article.summary.as_deref())
        .map(snippet_of)
        .unwrap_or_default();

    SearchHit {
        id: article.id,
        title: article.title,
        url: article.url,
        company: article.company,
        published_date: article.published_date,
        score,
        snippet,
    }
}

fn snippet_of(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}

// ============ Command wrapper ============

pub async fn run_search(config: &Config, query: &str, mode: &str, limit: Option<i64>) -> Result<()> {
    let mode = SearchMode::parse(mode)?;

    if mode == SearchMode::Semantic && !config.embedding.is_enabled() {
        bail!("Mode 'semantic' requires embeddings. Set [embedding] provider in config.");
    }

    let pool = db::connect(&config.db).await?;
    let store = ArticleStore::new(pool);

    let embeddings: Option<Arc<dyn EmbeddingProvider>> = if mode == SearchMode::Semantic {
        Some(embedding::create_provider(&config.embedding)?)
    } else {
        None
    };

    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    let hits = run_query(&store, embeddings.as_deref(), mode, query, limit).await?;

    if hits.is_empty() {
        println!("No results.");
        store.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        match hit.score {
            Some(score) => println!("{}. [{:.2}] {} / {}", i + 1, score, hit.company, hit.title),
            None => println!("{}. {} / {}", i + 1, hit.company, hit.title),
        }
        if let Some(ref date) = hit.published_date {
            println!("    published: {}", date);
        }
        println!("    url: {}", hit.url);
        if !hit.snippet.is_empty() {
            println!("    excerpt: \"{}\"", hit.snippet);
        }
        println!("    id: {}", hit.id);
        println!();
    }

    store.close().await;
    Ok(())
}
