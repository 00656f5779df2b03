//! Alpaca REST API client.

use super::traits::Broker;
use super::types::*;
use crate::config::AlpacaConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, instrument};

const PAPER_BASE_URL: &str = "https://paper-api.alpaca.markets";
const LIVE_BASE_URL: &str = "https://api.alpaca.markets";

/// Alpaca trading API client.
pub struct AlpacaClient {
    http: Client,
    api_key: String,
    secret_key: String,
    base_url: String,
}

impl AlpacaClient {
    /// Create a new Alpaca client from configuration.
    pub fn new(config: &AlpacaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = match &config.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if config.paper => PAPER_BASE_URL.to_string(),
            None => LIVE_BASE_URL.to_string(),
        };

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            secret_key: config.secret_key.clone(),
            base_url,
        })
    }

    /// REST base URL in use.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("APCA-API-KEY-ID", &self.api_key)
            .header("APCA-API-SECRET-KEY", &self.secret_key)
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Alpaca {} failed with {}: {}", what, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }
}

#[async_trait]
impl Broker for AlpacaClient {
    #[instrument(skip(self))]
    async fn account(&self) -> Result<Account> {
        let url = format!("{}/v2/account", self.base_url);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("Failed to fetch account")?;

        Self::parse(response, "account").await
    }

    #[instrument(skip(self))]
    async fn positions(&self) -> Result<Vec<Position>> {
        let url = format!("{}/v2/positions", self.base_url);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .context("Failed to fetch positions")?;

        Self::parse(response, "positions").await
    }

    #[instrument(skip(self, order), fields(symbol = %order.symbol, qty = order.qty))]
    async fn submit_bracket(&self, order: &BracketOrder) -> Result<OrderResponse> {
        let url = format!("{}/v2/orders", self.base_url);
        debug!("Submitting bracket order: {:?}", order);

        let response = self
            .authed(self.http.post(&url))
            .json(order)
            .send()
            .await
            .context("Failed to submit bracket order")?;

        Self::parse(response, "order submission").await
    }
}
