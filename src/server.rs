//! REST API server.
//!
//! Thin request/response glue over the store, the embedding provider,
//! and the summarizer. The server holds no state of its own beyond the
//! shared service handles.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/search?q=...&mode=...&limit=...` | Keyword or semantic search |
//! | `POST` | `/summarize` | Summarize a set of articles by ID |
//!
//! # Error Contract
//!
//! All error responses share one JSON shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser frontend
//! can call the API directly.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::error;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::search::{self, SearchHit, SearchMode};
use crate::store::ArticleStore;
use crate::summarize::Summarizer;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    store: Arc<ArticleStore>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    summarizer: Option<Arc<Summarizer>>,
}

/// Start the REST API server on `[server].bind`.
///
/// Services are constructed once here and shared read-only by every
/// handler. A misconfigured but enabled provider is fatal at startup; a
/// disabled one only fails the requests that need it. Runs until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db).await?;
    let store = Arc::new(ArticleStore::new(pool));

    let embeddings = if config.embedding.is_enabled() {
        Some(embedding::create_provider(&config.embedding)?)
    } else {
        None
    };

    let summarizer = if config.summarizer.is_enabled() {
        Some(Arc::new(Summarizer::new(&config.summarizer)?))
    } else {
        None
    };

    let app = router(store, embeddings, summarizer);

    println!("API server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the application router over already-constructed services.
///
/// Split out from [`run_server`] so tests can serve it on an ephemeral
/// port without going through config loading.
pub fn router(
    store: Arc<ArticleStore>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    summarizer: Option<Arc<Summarizer>>,
) -> Router {
    let state = AppState {
        store,
        embeddings,
        summarizer,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/search", get(handle_search))
        .route("/summarize", post(handle_summarize))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    error!(error = %err, "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: err.to_string(),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /search ============

#[derive(Deserialize)]
struct SearchParams {
    q: Option<String>,
    mode: Option<String>,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

async fn handle_search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = params.q.as_deref().unwrap_or("").trim().to_string();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    let mode = SearchMode::parse(params.mode.as_deref().unwrap_or("keyword"))
        .map_err(|e| bad_request(e.to_string()))?;

    if mode == SearchMode::Semantic && state.embeddings.is_none() {
        return Err(bad_request(
            "Semantic search requires embeddings. Set [embedding] provider in config.",
        ));
    }

    let limit = params.limit.unwrap_or(search::DEFAULT_LIMIT);
    if limit < 1 {
        return Err(bad_request("limit must be >= 1"));
    }

    let results = search::run_query(
        &state.store,
        state.embeddings.as_deref(),
        mode,
        &query,
        limit,
    )
    .await
    .map_err(internal)?;

    Ok(Json(SearchResponse { results }))
}

// ============ POST /summarize ============

#[derive(Deserialize)]
struct SummarizeRequest {
    article_ids: Vec<i64>,
    #[serde(default)]
    instruction: Option<String>,
}

#[derive(Serialize)]
struct SummarizeResponse {
    summary: String,
    articles: Vec<i64>,
}

async fn handle_summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<SummarizeResponse>, AppError> {
    if request.article_ids.is_empty() {
        return Err(bad_request("article_ids must not be empty"));
    }

    let summarizer = state
        .summarizer
        .as_ref()
        .ok_or_else(|| bad_request("Summarizer is disabled. Set [summarizer] provider in config."))?;

    let articles = state
        .store
        .get_by_ids(&request.article_ids)
        .await
        .map_err(internal)?;

    if articles.is_empty() {
        return Err(not_found("no articles found for the given ids"));
    }

    let summary = summarizer
        .summarize_articles(&articles, request.instruction.as_deref())
        .await
        .map_err(internal)?;

    let articles = articles.iter().map(|a| a.id).collect();
    Ok(Json(SummarizeResponse { summary, articles }))
}
