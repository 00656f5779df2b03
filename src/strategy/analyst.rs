//! Turns news leads into priced buy candidates.

use crate::llm::{StockAdvisor, Verdict};
use crate::market::{ArticleSource, NewsLead, NewsSource, PriceSource};
use anyhow::Result;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

/// A ticker the model wants to buy, with its predicted sell limit.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub ticker: String,
    pub article_url: String,
    pub predicted_limit: Decimal,
    pub current_price: Decimal,
    /// `predicted_limit - current_price`
    pub spread: Decimal,
}

impl Candidate {
    pub fn new(
        ticker: impl Into<String>,
        article_url: impl Into<String>,
        predicted_limit: Decimal,
        current_price: Decimal,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            article_url: article_url.into(),
            predicted_limit,
            current_price,
            spread: predicted_limit - current_price,
        }
    }
}

/// Index candidates by ticker.
pub fn by_ticker(candidates: &[Candidate]) -> HashMap<&str, &Candidate> {
    candidates.iter().map(|c| (c.ticker.as_str(), c)).collect()
}

/// Runs discovery, scraping and both model calls for every lead.
pub struct Analyst {
    news: Arc<dyn NewsSource>,
    articles: Arc<dyn ArticleSource>,
    prices: Arc<dyn PriceSource>,
    advisor: StockAdvisor,
    history_days: i64,
    max_article_chars: usize,
}

impl Analyst {
    pub fn new(
        news: Arc<dyn NewsSource>,
        articles: Arc<dyn ArticleSource>,
        prices: Arc<dyn PriceSource>,
        advisor: StockAdvisor,
        history_days: i64,
        max_article_chars: usize,
    ) -> Self {
        Self {
            news,
            articles,
            prices,
            advisor,
            history_days,
            max_article_chars,
        }
    }

    /// Discover leads and evaluate them in discovery order.
    ///
    /// Only a discovery failure is returned as an error; any per-ticker
    /// failure is logged and the ticker skipped.
    pub async fn find_candidates(&self) -> Result<Vec<Candidate>> {
        let leads = self.news.discover().await?;
        let mut candidates = Vec::new();

        for lead in &leads {
            if let Some(candidate) = self.evaluate(lead).await {
                candidates.push(candidate);
            }
        }

        info!(
            "🔍 [ANALYST] {} of {} leads became candidates",
            candidates.len(),
            leads.len()
        );
        Ok(candidates)
    }

    async fn evaluate(&self, lead: &NewsLead) -> Option<Candidate> {
        let ticker = lead.ticker.as_str();
        let article = self.article_text(lead).await;

        let verdict = match self.advisor.decide_growth(ticker, &article).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(%ticker, error = %e, "Growth decision failed");
                return None;
            }
        };

        if verdict == Verdict::Pass {
            info!(%ticker, "⏭️  [ANALYST] Don't buy");
            return None;
        }
        info!(%ticker, "✅ [ANALYST] Buy");

        let end = Utc::now();
        let start = end - Duration::days(self.history_days);
        let history = match self.prices.history(ticker, start, end).await {
            Ok(history) => history,
            Err(e) => {
                error!(%ticker, error = %e, "Failed to fetch price history");
                return None;
            }
        };

        let limit = match self
            .advisor
            .predict_limit(&history.closes, history.current, &article)
            .await
        {
            Ok(limit) => limit,
            Err(e) => {
                error!(%ticker, error = %e, "Limit prediction failed");
                return None;
            }
        };

        let candidate = Candidate::new(ticker, &lead.url, limit, history.current);
        info!(
            %ticker,
            limit = %candidate.predicted_limit,
            current = %candidate.current_price,
            spread = %candidate.spread,
            "🎯 [ANALYST] Sell limit predicted"
        );
        Some(candidate)
    }

    async fn article_text(&self, lead: &NewsLead) -> String {
        match self.articles.fetch_text(&lead.url).await {
            Ok(text) => text.chars().take(self.max_article_chars).collect(),
            Err(e) => {
                warn!(ticker = %lead.ticker, url = %lead.url, error = %e, "Article scrape failed");
                String::new()
            }
        }
    }
}
