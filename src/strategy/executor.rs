//! Bracket order validation and submission.

use super::sizer::OrderPlan;
use crate::broker::{BracketOrder, Broker, OrderResponse};
use crate::utils::decimal::round_to_cents;
use anyhow::Result;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, warn};

/// Reasons an order is refused before it reaches the broker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OrderRejection {
    #[error("invalid quantity ({quantity}) for {ticker}")]
    InvalidQuantity { ticker: String, quantity: i64 },

    #[error("take profit ({take_profit}) must be greater than stop loss ({stop_loss}) for {ticker}")]
    InvertedBracket {
        ticker: String,
        take_profit: Decimal,
        stop_loss: Decimal,
    },
}

/// Build the wire order for a plan, rounding both exit legs to cents.
pub fn bracket_for(plan: &OrderPlan) -> Result<BracketOrder, OrderRejection> {
    let take_profit = round_to_cents(plan.take_profit);
    let stop_loss = round_to_cents(plan.stop_loss);

    let quantity = match u64::try_from(plan.quantity) {
        Ok(q) if q > 0 => q,
        _ => {
            return Err(OrderRejection::InvalidQuantity {
                ticker: plan.ticker.clone(),
                quantity: plan.quantity,
            })
        }
    };

    if take_profit <= stop_loss {
        return Err(OrderRejection::InvertedBracket {
            ticker: plan.ticker.clone(),
            take_profit,
            stop_loss,
        });
    }

    Ok(BracketOrder::buy(&plan.ticker, quantity, take_profit, stop_loss))
}

/// Result of placing one plan.
#[derive(Debug)]
pub enum Placement {
    Submitted(OrderResponse),
    Rejected(OrderRejection),
    Failed(anyhow::Error),
}

impl Placement {
    pub fn is_submitted(&self) -> bool {
        matches!(self, Placement::Submitted(_))
    }
}

/// Submits bracket orders for sized plans.
#[derive(Debug, Default)]
pub struct OrderExecutor;

impl OrderExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Validate and submit one bracket order.
    pub async fn place_bracket(&self, broker: &dyn Broker, plan: &OrderPlan) -> Placement {
        let order = match bracket_for(plan) {
            Ok(order) => order,
            Err(rejection) => {
                warn!(error = %rejection, "Order skipped");
                return Placement::Rejected(rejection);
            }
        };

        info!(
            ticker = %order.symbol,
            qty = order.qty,
            take_profit = %order.take_profit.limit_price,
            stop_loss = %order.stop_loss.stop_price,
            "📤 [ORDER] Placing bracket order"
        );

        match broker.submit_bracket(&order).await {
            Ok(response) => {
                info!(
                    ticker = %response.symbol,
                    order_id = %response.id,
                    status = ?response.status,
                    "✅ [ORDER] Accepted"
                );
                Placement::Submitted(response)
            }
            Err(e) => {
                error!(ticker = %order.symbol, error = %e, "❌ [ORDER] Failed to place order");
                Placement::Failed(e)
            }
        }
    }
}
