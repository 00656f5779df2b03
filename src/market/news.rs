//! Alpha Vantage NEWS_SENTIMENT discovery.

use super::traits::{NewsLead, NewsSource};
use crate::config::NewsConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, instrument};

const BULLISH: &str = "Bullish";

#[derive(Debug, Deserialize)]
struct NewsSentimentResponse {
    feed: Option<Vec<FeedItem>>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedItem {
    url: String,
    #[serde(default)]
    ticker_sentiment: Vec<TickerSentiment>,
}

#[derive(Debug, Deserialize)]
struct TickerSentiment {
    ticker: String,
    ticker_sentiment_label: String,
}

/// News discovery backed by Alpha Vantage.
pub struct AlphaVantageNews {
    http: Client,
    api_key: String,
    base_url: String,
    topic: String,
}

impl AlphaVantageNews {
    pub fn new(config: &NewsConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            topic: config.topic.clone(),
        })
    }
}

/// Keep bullish, non-crypto tickers. A repeated ticker keeps its first
/// position but takes the most recent URL.
fn bullish_leads(feed: Vec<FeedItem>) -> Vec<NewsLead> {
    let mut leads: Vec<NewsLead> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for item in feed {
        for sentiment in item.ticker_sentiment {
            if sentiment.ticker_sentiment_label != BULLISH || sentiment.ticker.contains("CRYPTO") {
                continue;
            }

            match index.get(&sentiment.ticker).copied() {
                Some(pos) => leads[pos].url = item.url.clone(),
                None => {
                    index.insert(sentiment.ticker.clone(), leads.len());
                    leads.push(NewsLead::new(sentiment.ticker, item.url.clone()));
                }
            }
        }
    }

    leads
}

#[async_trait]
impl NewsSource for AlphaVantageNews {
    #[instrument(skip(self), fields(topic = %self.topic))]
    async fn discover(&self) -> Result<Vec<NewsLead>> {
        let url = format!(
            "{}/query?function=NEWS_SENTIMENT&topics={}&apikey={}",
            self.base_url,
            urlencoding::encode(&self.topic),
            urlencoding::encode(&self.api_key)
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to fetch news sentiment")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Alpha Vantage returned {}", status);
        }

        let body: NewsSentimentResponse = response
            .json()
            .await
            .context("Failed to parse news sentiment response")?;

        let Some(feed) = body.feed else {
            let reason = body
                .error_message
                .or(body.information)
                .unwrap_or_else(|| "no feed in response".to_string());
            anyhow::bail!("Alpha Vantage returned no feed: {}", reason);
        };

        debug!("Received {} feed items", feed.len());
        let leads = bullish_leads(feed);
        info!(
            "📰 [DISCOVER] {} bullish tickers: {:?}",
            leads.len(),
            leads.iter().map(|l| l.ticker.as_str()).collect::<Vec<_>>()
        );

        Ok(leads)
    }
}
