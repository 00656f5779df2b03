//! Article text extraction.

use super::traits::ArticleSource;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, instrument};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OSX 10_14_3) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/71.0.3578.98 Safari/537.36";

/// Zacks wraps the article body in these containers; everything else is chrome.
const ZACKS_BODY: &str = "div.commentary_body";

/// Fetches a page and reduces it to plain text.
pub struct ArticleScraper {
    http: Client,
}

impl ArticleScraper {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http })
    }
}

/// Extract readable text from `html`. Pages from Zacks only contribute their
/// commentary blocks.
pub fn extract_text(url: &str, html: &str) -> Result<String> {
    let document = Html::parse_document(html);

    let text = if url.contains("zacks") {
        let selector = Selector::parse(ZACKS_BODY).map_err(|e| anyhow!("bad selector: {}", e))?;
        document
            .select(&selector)
            .map(|div| div.text().collect::<String>())
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        visible_text(&document)
    };

    Ok(collapse_whitespace(&text))
}

fn visible_text(document: &Html) -> String {
    let mut parts: Vec<&str> = Vec::new();

    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };

        let hidden = node
            .parent()
            .and_then(|parent| parent.value().as_element().map(|e| e.name()))
            .map(|name| matches!(name, "script" | "style" | "noscript"))
            .unwrap_or(false);

        if !hidden {
            parts.push(&**text);
        }
    }

    parts.join(" ")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl ArticleSource for ArticleScraper {
    #[instrument(skip(self))]
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch article {}", url))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Failed to retrieve the webpage. Status code: {}", status.as_u16());
        }

        let body = response
            .text()
            .await
            .context("Failed to read article body")?;

        let text = extract_text(url, &body)?;
        debug!(chars = text.len(), "Article text extracted");
        Ok(text)
    }
}
