//! Source-agnostic traits for the data the trading loop consumes.
//!
//! Each trait covers one collaborator:
//! - news discovery (ticker -> article URL)
//! - article text extraction
//! - current and historical prices

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A bullish mention of a ticker in a news article.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsLead {
    pub ticker: String,
    pub url: String,
}

impl NewsLead {
    pub fn new(ticker: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            url: url.into(),
        }
    }
}

/// Daily closes over a window plus the latest traded price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceHistory {
    pub closes: Vec<Decimal>,
    pub current: Decimal,
}

/// Discovers candidate tickers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Leads in discovery order, one per ticker.
    async fn discover(&self) -> Result<Vec<NewsLead>>;
}

/// Extracts readable text from an article URL.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String>;
}

/// Current and historical prices.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn current_price(&self, ticker: &str) -> Result<Decimal>;

    /// Daily closes between `start` and `end` and the current price.
    async fn history(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceHistory>;
}
