//! LLM summarization over stored articles.
//!
//! The model is an opaque collaborator: one request, one text back, no
//! retry loop. Prompt assembly is a pure function so it can be tested
//! without the API.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::SummarizerConfig;
use crate::models::Article;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
/// Per-article cap on the content fed into the prompt.
const PROMPT_CONTENT_CHARS: usize = 10_000;

const SYSTEM_PROMPT: &str = r#"You are a helpful assistant that summarizes collections of engineering blog posts and news stories.
Provide a concise, informative summary in 2-3 paragraphs.
Focus on the key facts, recurring themes, and important conclusions.
Use clear, accessible language."#;

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

pub struct Summarizer {
    model: String,
    max_tokens: u32,
    api_key: String,
    client: reqwest::Client,
}

impl Summarizer {
    /// Create a summarizer from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for the `"disabled"` provider, an unknown
    /// provider name, a missing model, or a missing `ANTHROPIC_API_KEY`.
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        match config.provider.as_str() {
            "anthropic" => {}
            "disabled" => bail!("Summarizer is disabled. Set [summarizer] provider in config."),
            other => bail!("Unknown summarizer provider: {}", other),
        }

        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("summarizer.model required for Anthropic provider"))?;
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .map_err(|_| anyhow::anyhow!("ANTHROPIC_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            max_tokens: config.max_tokens,
            api_key,
            client,
        })
    }

    /// Summarize a set of articles in one shot. `query`, when present,
    /// focuses the summary on what the caller searched for.
    pub async fn summarize_articles(
        &self,
        articles: &[Article],
        query: Option<&str>,
    ) -> Result<String> {
        let request = MessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: build_prompt(articles, query),
            }],
            system: Some(SYSTEM_PROMPT.to_string()),
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            bail!("Anthropic API error {}: {}", status, error_text);
        }

        let message: MessageResponse = response.json().await?;
        let summary = message
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(summary)
    }
}

fn build_prompt(articles: &[Article], query: Option<&str>) -> String {
    let mut prompt = match query {
        Some(query) if !query.trim().is_empty() => format!(
            "Please summarize the following articles as they relate to \"{}\":\n",
            query.trim()
        ),
        _ => "Please summarize the following articles:\n".to_string(),
    };

    for (idx, article) in articles.iter().enumerate() {
        let body = article
            .content
            .as_deref()
            .or(article.summary.as_deref())
            .unwrap_or(&article.title);

        prompt.push_str(&format!(
            "\n--- Article {} ---\nTitle: {}\nSource: {}\nContent:\n{}\n",
            idx + 1,
            article.title,
            article.company,
            truncate_chars(body, PROMPT_CONTENT_CHARS)
        ));
    }

    prompt
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
