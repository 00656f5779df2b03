//! Order gateway abstraction.
//!
//! The trading loop only needs three things from a brokerage: the cash
//! balance, the open positions and a way to submit a bracket order.

use super::types::{Account, BracketOrder, OrderResponse, Position};
use anyhow::Result;
use async_trait::async_trait;

/// Brokerage used for sizing and order submission.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Broker: Send + Sync {
    /// Fetch a fresh account snapshot.
    async fn account(&self) -> Result<Account>;

    /// Fetch all open positions.
    async fn positions(&self) -> Result<Vec<Position>>;

    /// Submit a bracket order.
    async fn submit_bracket(&self, order: &BracketOrder) -> Result<OrderResponse>;
}
