//! Hacker News story source.
//!
//! The Firebase API has no listing endpoint worth bulk-reading, so the
//! pipeline walks item IDs downward from the newest one. Only live
//! stories with an external URL become candidates; everything else
//! (comments, jobs, polls, deleted items, Ask HN posts) is filtered out.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;

use crate::config::HackerNewsConfig;
use crate::models::{CandidateArticle, NO_TITLE};

/// Source label stored on Hacker News rows. The enrichment job treats
/// this source specially since ingestion only stores story titles.
pub const HN_COMPANY: &str = "Hacker News";

/// One item from the Firebase API. Absent fields are common; the API
/// returns partial objects for many item kinds.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HnItem {
    pub id: u64,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub by: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
}

/// Item lookup seam so the ID walk can run against a scripted source in
/// tests.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// The newest item ID, i.e. the walk's starting point.
    async fn max_item_id(&self) -> Result<u64>;
    /// Fetch one item. `None` means the ID does not resolve to an item.
    async fn item(&self, id: u64) -> Result<Option<HnItem>>;
}

pub struct HnClient {
    api_base: String,
    client: reqwest::Client,
}

impl HnClient {
    pub fn new(config: &HackerNewsConfig, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl ItemSource for HnClient {
    async fn max_item_id(&self) -> Result<u64> {
        let url = format!("{}/maxitem.json", self.api_base);
        let id = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<u64>()
            .await
            .context("Failed to fetch max item ID")?;
        Ok(id)
    }

    async fn item(&self, id: u64) -> Result<Option<HnItem>> {
        let url = format!("{}/item/{}.json", self.api_base, id);
        // The API returns literal `null` for IDs that never resolved.
        let item = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Option<HnItem>>()
            .await
            .with_context(|| format!("Failed to fetch item {}", id))?;
        Ok(item)
    }
}

/// Live, externally-linked stories are the only items worth storing.
pub fn is_candidate(item: &HnItem) -> bool {
    item.kind.as_deref() == Some("story")
        && !item.deleted
        && item.url.as_deref().map(|u| !u.is_empty()).unwrap_or(false)
}

/// Build a candidate from a story that passed [`is_candidate`].
///
/// Content is the bare title at this stage; the enrichment job fetches
/// the real page text later.
pub fn story_candidate(item: &HnItem) -> CandidateArticle {
    let title = item
        .title
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());
    let by = item.by.as_deref().unwrap_or("unknown");
    let published_date = item
        .time
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|d| d.to_rfc3339());

    CandidateArticle {
        url: item.url.clone().unwrap_or_default(),
        published_date,
        company: HN_COMPANY.to_string(),
        summary: Some(format!("A story submitted by user {}.", by)),
        content: Some(title.clone()),
        title,
        embedding: None,
    }
}
