//! # Article Harness
//!
//! A self-hosted article ingestion, semantic search, and summarization
//! service.
//!
//! Article Harness reads RSS/Atom feeds and the Hacker News API into a
//! SQLite article store, extracts full page text where feeds only carry
//! teasers, backfills vector embeddings, and exposes keyword/semantic
//! search plus LLM summarization via a CLI and a small REST API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────┐
//! │   Sources    │──▶│   Pipeline    │──▶│  SQLite   │
//! │  RSS / HN    │   │ Extract+Embed │   │ articles  │
//! └──────────────┘   └──────────────┘   └────┬─────┘
//!                                            │
//!                        ┌───────────────────┤
//!                        ▼                   ▼
//!                   ┌──────────┐       ┌──────────┐
//!                   │   CLI    │       │   HTTP   │
//!                   │  (art)   │       │  (REST)  │
//!                   └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! art init                      # create database
//! art ingest feeds              # ingest configured RSS/Atom feeds
//! art ingest hackernews         # ingest recent Hacker News stories
//! art embed pending             # backfill embeddings
//! art enrich                    # repair missing/short content
//! art search "llm inference" --mode semantic
//! art serve                     # start the REST API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`feed`] | RSS/Atom feed reading |
//! | [`hackernews`] | Hacker News item source |
//! | [`extract`] | Article page content extraction |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`pipeline`] | Ingestion orchestration |
//! | [`enrich`] | Embedding backfill and content repair |
//! | [`store`] | SQLite article store |
//! | [`search`] | Keyword and semantic search |
//! | [`summarize`] | LLM summarization |
//! | [`server`] | REST API server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod enrich;
pub mod extract;
pub mod feed;
pub mod hackernews;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod search;
pub mod server;
pub mod store;
pub mod summarize;
