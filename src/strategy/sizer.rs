//! Position sizing: spreads to allocations to per-ticker order plans.

use super::allocator::correct_allocate_percentages;
use super::analyst::{by_ticker, Candidate};
use crate::market::PriceSource;
use crate::utils::decimal::{percent_of, round_to_cents, truncate_whole, whole_shares};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Sized bracket order for one ticker.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPlan {
    pub ticker: String,
    pub allocation_pct: Decimal,
    pub allotted_cash: Decimal,
    pub current_price: Decimal,
    pub quantity: i64,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

/// Splits available cash across candidates.
pub struct PositionSizer {
    prices: Arc<dyn PriceSource>,
    stop_loss_ratio: Decimal,
}

impl PositionSizer {
    pub fn new(prices: Arc<dyn PriceSource>, stop_loss_ratio: Decimal) -> Self {
        Self {
            prices,
            stop_loss_ratio,
        }
    }

    /// Stop price below `price` at the configured ratio, in cents.
    pub fn stop_loss_for(&self, price: Decimal) -> Decimal {
        round_to_cents(price * self.stop_loss_ratio)
    }

    /// Build order plans in allocation rank order.
    ///
    /// `cash` is truncated to whole units first. Tickers whose price cannot be
    /// fetched, whose quantity rounds to zero or whose take profit does not
    /// clear the stop loss are left out.
    pub async fn plan(&self, candidates: &[Candidate], cash: Decimal) -> Vec<OrderPlan> {
        if candidates.is_empty() {
            info!("💤 [SIZER] No candidates to size");
            return Vec::new();
        }

        let cash = truncate_whole(cash);
        let signals: Vec<(String, Decimal)> = candidates
            .iter()
            .map(|c| (c.ticker.clone(), c.spread))
            .collect();

        let allocations = match correct_allocate_percentages(&signals) {
            Ok(allocations) => allocations,
            Err(e) => {
                error!(error = %e, ?signals, "Allocation failed, nothing to size");
                return Vec::new();
            }
        };

        info!(%cash, "💰 [SIZER] Total available cash");
        for allocation in &allocations {
            debug!(
                ticker = %allocation.ticker,
                spread = %allocation.signal,
                pct = %allocation.percentage.round_dp(4),
                "Allocation"
            );
        }

        let lookup = by_ticker(candidates);
        let mut plans = Vec::with_capacity(allocations.len());

        for allocation in &allocations {
            let ticker = allocation.ticker.as_str();
            let Some(candidate) = lookup.get(ticker) else {
                continue;
            };

            let price = match self.prices.current_price(ticker).await {
                Ok(price) => round_to_cents(price),
                Err(e) => {
                    warn!(%ticker, error = %e, "Skipping, current price unavailable");
                    continue;
                }
            };

            let allotted = percent_of(allocation.percentage, cash);
            let quantity = whole_shares(allotted, price);
            debug!(%ticker, %price, allotted = %allotted.round_dp(2), quantity, "Sized");

            if quantity <= 0 {
                warn!(%ticker, quantity, "Skipping, zero or negative quantity");
                continue;
            }

            let take_profit = round_to_cents(candidate.predicted_limit);
            let stop_loss = self.stop_loss_for(price);
            if take_profit <= stop_loss {
                warn!(
                    %ticker,
                    %take_profit,
                    %stop_loss,
                    "Skipping, take profit must be above stop loss"
                );
                continue;
            }

            plans.push(OrderPlan {
                ticker: ticker.to_string(),
                allocation_pct: allocation.percentage,
                allotted_cash: allotted,
                current_price: price,
                quantity,
                take_profit,
                stop_loss,
            });
        }

        plans
    }
}
