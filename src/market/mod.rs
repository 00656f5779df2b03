//! Market data collaborators for the trading loop.
//!
//! ## Discovery
//! Alpha Vantage NEWS_SENTIMENT feed, filtered to bullish equity tickers.
//!
//! ## Articles
//! Plain-text extraction from the article behind each lead.
//!
//! ## Prices
//! Current price and daily closes from the Yahoo Finance chart API.

mod article;
mod news;
mod prices;
mod traits;

pub use article::{extract_text, ArticleScraper};
pub use news::AlphaVantageNews;
pub use prices::YahooPrices;
pub use traits::*;
