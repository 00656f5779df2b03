//! The trading cycle and the position re-check that drives it.

use crate::broker::Broker;
use crate::config::Config;
use crate::journal::Journal;
use crate::llm::{CompletionOracle, StockAdvisor};
use crate::market::{ArticleSource, NewsSource, PriceSource};
use crate::strategy::{Analyst, Candidate, OrderExecutor, OrderPlan, Placement, PositionSizer};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// External services a trading context talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub news: Arc<dyn NewsSource>,
    pub articles: Arc<dyn ArticleSource>,
    pub prices: Arc<dyn PriceSource>,
    pub oracle: Arc<dyn CompletionOracle>,
    pub broker: Arc<dyn Broker>,
}

/// What happened to one order plan.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub ticker: String,
    pub quantity: i64,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    /// `submitted`, `rejected` or `failed`
    pub status: &'static str,
    pub order_id: Option<String>,
    pub error: Option<String>,
}

impl OrderOutcome {
    fn from_placement(plan: &OrderPlan, placement: &Placement) -> Self {
        let (status, order_id, error) = match placement {
            Placement::Submitted(response) => ("submitted", Some(response.id.clone()), None),
            Placement::Rejected(rejection) => ("rejected", None, Some(rejection.to_string())),
            Placement::Failed(e) => ("failed", None, Some(e.to_string())),
        };

        Self {
            ticker: plan.ticker.clone(),
            quantity: plan.quantity,
            take_profit: plan.take_profit,
            stop_loss: plan.stop_loss,
            status,
            order_id,
            error,
        }
    }
}

/// Summary of one discovery-to-orders pass.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub cash: Decimal,
    pub candidates: Vec<Candidate>,
    pub plans: Vec<OrderPlan>,
    pub outcomes: Vec<OrderOutcome>,
    pub submitted: usize,
    pub failed: usize,
    /// Open positions after submission
    pub positions_held: usize,
}

/// Everything a trading cycle needs, passed explicitly.
pub struct TradingContext {
    broker: Arc<dyn Broker>,
    analyst: Analyst,
    sizer: PositionSizer,
    executor: OrderExecutor,
    journal: Option<Mutex<Journal>>,
}

impl TradingContext {
    pub fn new(config: &Config, services: Collaborators, journal: Option<Journal>) -> Self {
        let advisor = StockAdvisor::new(services.oracle, &config.openai);
        let analyst = Analyst::new(
            services.news,
            services.articles,
            services.prices.clone(),
            advisor,
            config.trading.history_days,
            config.trading.max_article_chars,
        );
        let sizer = PositionSizer::new(services.prices, config.trading.stop_loss_ratio);

        Self {
            broker: services.broker,
            analyst,
            sizer,
            executor: OrderExecutor::new(),
            journal: journal.map(Mutex::new),
        }
    }

    /// Run one full cycle: discover, analyse, size and submit.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started_at = Utc::now();
        info!("🔄 [CYCLE] Starting trading cycle");

        let candidates = self.analyst.find_candidates().await?;

        // Cash is fetched fresh for every sizing decision
        let account = self.broker.account().await?;
        let plans = self.sizer.plan(&candidates, account.cash).await;

        let mut outcomes = Vec::with_capacity(plans.len());
        for plan in &plans {
            let placement = self.executor.place_bracket(self.broker.as_ref(), plan).await;
            outcomes.push(OrderOutcome::from_placement(plan, &placement));
        }

        let submitted = outcomes.iter().filter(|o| o.status == "submitted").count();
        let failed = outcomes.len() - submitted;
        let positions_held = self.broker.positions().await?.len();

        let report = CycleReport {
            started_at,
            cash: account.cash,
            candidates,
            plans,
            outcomes,
            submitted,
            failed,
            positions_held,
        };

        info!(
            candidates = report.candidates.len(),
            submitted = report.submitted,
            failed = report.failed,
            positions = report.positions_held,
            "🏁 [CYCLE] Trading cycle complete"
        );

        self.record(&report);
        Ok(report)
    }

    /// Re-run the cycle if positions have closed since the last one.
    ///
    /// Returns the position count to compare against on the next check.
    pub async fn check_positions(&self, expected: usize) -> Result<usize> {
        let held = self.broker.positions().await?.len();

        if held < expected {
            info!(held, expected, "📉 [CHECK] Positions closed, starting a new cycle");
            let report = self.run_cycle().await?;
            Ok(report.positions_held)
        } else {
            info!(held, "💤 [CHECK] Nothing closed, sleeping until the next check");
            Ok(expected)
        }
    }

    fn record(&self, report: &CycleReport) {
        let Some(journal) = &self.journal else {
            return;
        };

        let result = match journal.lock() {
            Ok(journal) => journal.record_cycle(report),
            Err(_) => Err(anyhow::anyhow!("journal lock poisoned")),
        };

        if let Err(e) = result {
            warn!(error = %e, "Failed to journal cycle");
        }
    }
}
