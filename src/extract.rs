//! Content extraction from article pages.
//!
//! The extractor is deliberately infallible: network errors, bad status
//! codes, and unusable markup all degrade to an empty string, and the
//! caller decides what to fall back to. Selector literals are static and
//! known-valid, hence the `unwrap`s.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;

use crate::config::ExtractionConfig;

/// Fetches a page and extracts its readable text.
#[async_trait]
pub trait Extract: Send + Sync {
    async fn extract(&self, url: &str) -> String;
}

/// HTTP-backed extractor with a bounded per-request timeout.
pub struct HttpExtractor {
    client: reqwest::Client,
}

impl HttpExtractor {
    pub fn new(config: &ExtractionConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Extract for HttpExtractor {
    async fn extract(&self, url: &str) -> String {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url, error = %e, "page fetch failed");
                return String::new();
            }
        };

        if !response.status().is_success() {
            debug!(url, status = %response.status(), "page fetch returned non-success");
            return String::new();
        }

        match response.text().await {
            Ok(html) => extract_from_html(&html),
            Err(e) => {
                debug!(url, error = %e, "page body read failed");
                String::new()
            }
        }
    }
}

/// Extract readable article text from an HTML document.
///
/// Stage one scores likely article containers by the length of their
/// paragraph text and keeps the best. When no container yields paragraph
/// text, stage two falls back to the first non-empty known content area
/// (then `<body>`), with script/style/nav chrome excluded.
pub fn extract_from_html(html: &str) -> String {
    let doc = Html::parse_document(html);

    let text = best_container_text(&doc);
    if !text.is_empty() {
        return text;
    }

    fallback_area_text(&doc)
}

fn best_container_text(doc: &Html) -> String {
    let containers = Selector::parse(
        "article, main, [role=\"main\"], div.post, div.content, div.entry-content, div.article-body",
    )
    .unwrap();
    let paragraphs = Selector::parse("p").unwrap();

    let mut best = String::new();
    for container in doc.select(&containers) {
        let text = container
            .select(&paragraphs)
            .map(|p| normalize_whitespace(&p.text().collect::<Vec<_>>().join(" ")))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if text.len() > best.len() {
            best = text;
        }
    }
    best
}

fn fallback_area_text(doc: &Html) -> String {
    const AREAS: &[&str] = &["article", "main", "#content", ".post", ".entry-content", "body"];

    for area in AREAS {
        let selector = Selector::parse(area).unwrap();
        if let Some(element) = doc.select(&selector).next() {
            let text = text_without_chrome(element);
            if !text.is_empty() {
                return text;
            }
        }
    }
    String::new()
}

/// Collect an element's text nodes, skipping anything nested under page
/// chrome (scripts, styles, navigation, headers, footers).
fn text_without_chrome(element: ElementRef) -> String {
    const CHROME: &[&str] = &["script", "style", "nav", "header", "footer", "aside"];

    let mut parts: Vec<String> = Vec::new();
    for node in element.descendants() {
        if let Some(text) = node.value().as_text() {
            let in_chrome = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .map(|el| CHROME.contains(&el.name()))
                    .unwrap_or(false)
            });
            if !in_chrome {
                parts.push(text.to_string());
            }
        }
    }
    normalize_whitespace(&parts.join(" "))
}

/// Strip tags from an HTML fragment, returning whitespace-normalized text.
/// Feed summaries routinely arrive as HTML.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    normalize_whitespace(&text)
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
