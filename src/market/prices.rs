//! Price data from the Yahoo Finance chart endpoint.

use super::traits::{PriceHistory, PriceSource};
use crate::config::PricesConfig;
use crate::utils::decimal::round_whole;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<Decimal>>,
}

/// Yahoo Finance chart API client.
pub struct YahooPrices {
    http: Client,
    base_url: String,
}

impl YahooPrices {
    pub fn new(config: &PricesConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn chart(&self, ticker: &str, query: &str) -> Result<ChartResult> {
        let url = format!(
            "{}/v8/finance/chart/{}?{}",
            self.base_url,
            urlencoding::encode(ticker),
            query
        );

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch chart for {}", ticker))?;

        let status = response.status();
        let envelope: ChartEnvelope = response
            .json()
            .await
            .with_context(|| format!("Failed to parse chart for {} ({})", ticker, status))?;

        if let Some(error) = envelope.chart.error {
            anyhow::bail!(
                "Chart request for {} failed: {} {}",
                ticker,
                error.code,
                error.description
            );
        }

        envelope
            .chart
            .result
            .and_then(|mut results| results.pop())
            .with_context(|| format!("No chart data for {}", ticker))
    }
}

fn market_price(ticker: &str, result: &ChartResult) -> Result<Decimal> {
    result
        .meta
        .regular_market_price
        .with_context(|| format!("No current price for {}", ticker))
}

#[async_trait]
impl PriceSource for YahooPrices {
    #[instrument(skip(self))]
    async fn current_price(&self, ticker: &str) -> Result<Decimal> {
        let result = self.chart(ticker, "range=1d&interval=1d").await?;
        market_price(ticker, &result)
    }

    #[instrument(skip(self))]
    async fn history(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceHistory> {
        let query = format!(
            "period1={}&period2={}&interval=1d",
            start.timestamp(),
            end.timestamp()
        );
        let result = self.chart(ticker, &query).await?;
        let current = market_price(ticker, &result)?;

        let closes: Vec<Decimal> = result
            .indicators
            .quote
            .into_iter()
            .next()
            .map(|quote| quote.close.into_iter().flatten().map(round_whole).collect())
            .unwrap_or_default();

        anyhow::ensure!(!closes.is_empty(), "No closing prices for {}", ticker);
        debug!(count = closes.len(), %current, "Fetched price history");

        Ok(PriceHistory { closes, current })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prices_for(server: &MockServer) -> YahooPrices {
        YahooPrices::new(&PricesConfig {
            base_url: server.uri(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_history_rounds_closes_and_skips_gaps() {
        let server = MockServer::start().await;
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap();

        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .and(query_param("period1", start.timestamp().to_string()))
            .and(query_param("period2", end.timestamp().to_string()))
            .and(query_param("interval", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{
                        "meta": { "symbol": "AAPL", "regularMarketPrice": 171.42 },
                        "timestamp": [1, 2, 3, 4],
                        "indicators": { "quote": [{ "close": [170.6, null, 168.2, 172.5] }] }
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let history = prices_for(&server).history("AAPL", start, end).await.unwrap();

        assert_eq!(history.closes, vec![dec!(171), dec!(168), dec!(172)]);
        assert_eq!(history.current, dec!(171.42));
    }

    #[tokio::test]
    async fn test_current_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/MSFT"))
            .and(query_param("range", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{ "meta": { "regularMarketPrice": 415.1 } }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let price = prices_for(&server).current_price("MSFT").await.unwrap();
        assert_eq!(price, dec!(415.1));
    }

    #[tokio::test]
    async fn test_unknown_ticker_reports_chart_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "chart": {
                    "result": null,
                    "error": { "code": "Not Found", "description": "No data found, symbol may be delisted" }
                }
            })))
            .mount(&server)
            .await;

        let err = prices_for(&server).current_price("ZZZZ").await.unwrap_err();
        assert!(err.to_string().contains("delisted"), "{}", err);
    }

    #[tokio::test]
    async fn test_empty_history_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "chart": {
                    "result": [{
                        "meta": { "regularMarketPrice": 12.5 },
                        "indicators": { "quote": [{ "close": [null, null] }] }
                    }],
                    "error": null
                }
            })))
            .mount(&server)
            .await;

        let now = Utc::now();
        let result = prices_for(&server)
            .history("THIN", now - chrono::Duration::days(7), now)
            .await;
        assert!(result.is_err());
    }
}
