//! RSS/Atom feed reading.
//!
//! Fetching and parsing are split so parsing can be tested on fixture
//! XML. A feed failure (network, status, malformed XML) errors out of
//! [`FeedReader::fetch`] and the pipeline isolates it to that source.

use anyhow::{bail, Context, Result};
use feed_rs::parser;
use std::time::Duration;
use tracing::debug;

use crate::config::FeedSource;
use crate::extract::strip_html;
use crate::models::{CandidateArticle, NO_TITLE};

pub struct FeedReader {
    client: reqwest::Client,
}

impl FeedReader {
    pub fn new(timeout_secs: u64, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, source: &FeedSource) -> Result<Vec<CandidateArticle>> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch feed '{}'", source.name))?;

        if !response.status().is_success() {
            bail!(
                "Feed '{}' returned HTTP {}",
                source.name,
                response.status()
            );
        }

        let bytes = response.bytes().await?;
        parse_entries(&source.name, &bytes)
    }
}

/// Turn raw feed XML into candidates for the pipeline.
///
/// Entries without a link are dropped here: with no URL there is no
/// identity to dedup on. Missing titles get the placeholder, summaries
/// are tag-stripped, and every text field is scrubbed of NUL characters.
pub fn parse_entries(source_name: &str, bytes: &[u8]) -> Result<Vec<CandidateArticle>> {
    let feed = parser::parse(bytes)
        .with_context(|| format!("Failed to parse feed '{}'", source_name))?;

    let mut candidates = Vec::new();

    for entry in feed.entries {
        let url = entry
            .links
            .first()
            .map(|link| scrub(&link.href))
            .filter(|href| !href.is_empty());
        let url = match url {
            Some(url) => url,
            None => {
                debug!(source = source_name, entry = %entry.id, "dropping entry without a link");
                continue;
            }
        };

        let title = entry
            .title
            .map(|t| scrub(&t.content))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());

        let summary = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body))
            .map(|s| scrub(&strip_html(&s)))
            .filter(|s| !s.is_empty());

        let published_date = entry
            .published
            .or(entry.updated)
            .map(|d| d.to_rfc3339());

        candidates.push(CandidateArticle {
            title,
            url,
            published_date,
            company: source_name.to_string(),
            summary,
            content: None,
            embedding: None,
        });
    }

    Ok(candidates)
}

fn scrub(text: &str) -> String {
    if text.contains('\0') {
        text.replace('\0', "")
    } else {
        text.to_string()
    }
}
