//! In-memory paper broker for dry runs and testing.
//!
//! Fills every bracket order immediately at the price reported by the
//! configured [`PriceSource`]; the attached exit legs are recorded but never
//! triggered. Positions can be closed manually to simulate an exit.

use super::traits::Broker;
use super::types::*;
use crate::market::PriceSource;
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// Simulated position.
#[derive(Debug, Clone)]
pub struct PaperPosition {
    pub symbol: String,
    pub qty: Decimal,
    pub avg_entry_price: Decimal,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
}

/// Paper trading state.
#[derive(Debug, Default)]
pub struct PaperState {
    pub cash: Decimal,
    pub positions: HashMap<String, PaperPosition>,
    pub orders: Vec<BracketOrder>,
}

/// Broker that keeps everything in memory.
pub struct PaperBroker {
    state: RwLock<PaperState>,
    prices: Arc<dyn PriceSource>,
    next_order_id: AtomicU64,
}

impl PaperBroker {
    /// Create a paper broker funded with `initial_cash`.
    pub fn new(initial_cash: Decimal, prices: Arc<dyn PriceSource>) -> Self {
        Self {
            state: RwLock::new(PaperState {
                cash: initial_cash,
                ..Default::default()
            }),
            prices,
            next_order_id: AtomicU64::new(1),
        }
    }

    /// Remaining cash.
    pub async fn cash(&self) -> Decimal {
        self.state.read().await.cash
    }

    /// Every order accepted so far.
    pub async fn orders(&self) -> Vec<BracketOrder> {
        self.state.read().await.orders.clone()
    }

    /// Close a position at `price`, crediting the proceeds.
    pub async fn close_position(&self, symbol: &str, price: Decimal) -> Option<PaperPosition> {
        let mut state = self.state.write().await;
        let position = state.positions.remove(symbol)?;
        state.cash += position.qty * price;
        info!(%symbol, qty = %position.qty, %price, "📝 [PAPER] Position closed");
        Some(position)
    }
}

#[async_trait]
impl Broker for PaperBroker {
    async fn account(&self) -> Result<Account> {
        let state = self.state.read().await;
        let invested: Decimal = state
            .positions
            .values()
            .map(|p| p.qty * p.avg_entry_price)
            .sum();

        Ok(Account {
            id: "paper".to_string(),
            status: "ACTIVE".to_string(),
            currency: "USD".to_string(),
            cash: state.cash,
            buying_power: Some(state.cash),
            portfolio_value: Some(state.cash + invested),
        })
    }

    async fn positions(&self) -> Result<Vec<Position>> {
        let state = self.state.read().await;
        let mut positions: Vec<Position> = state
            .positions
            .values()
            .map(|p| Position {
                symbol: p.symbol.clone(),
                qty: p.qty,
                avg_entry_price: p.avg_entry_price,
                market_value: Some(p.qty * p.avg_entry_price),
                unrealized_pl: Some(Decimal::ZERO),
                side: PositionSide::Long,
            })
            .collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(positions)
    }

    async fn submit_bracket(&self, order: &BracketOrder) -> Result<OrderResponse> {
        let price = self.prices.current_price(&order.symbol).await?;
        let qty = Decimal::from(order.qty);
        let cost = qty * price;

        let mut state = self.state.write().await;
        anyhow::ensure!(
            cost <= state.cash,
            "insufficient buying power for {}: need {} have {}",
            order.symbol,
            cost,
            state.cash
        );

        state.cash -= cost;
        let position = state
            .positions
            .entry(order.symbol.clone())
            .or_insert_with(|| PaperPosition {
                symbol: order.symbol.clone(),
                qty: Decimal::ZERO,
                avg_entry_price: Decimal::ZERO,
                take_profit: order.take_profit.limit_price,
                stop_loss: order.stop_loss.stop_price,
            });
        let held_cost = position.qty * position.avg_entry_price;
        position.qty += qty;
        position.avg_entry_price = (held_cost + cost) / position.qty;
        position.take_profit = order.take_profit.limit_price;
        position.stop_loss = order.stop_loss.stop_price;
        state.orders.push(order.clone());

        let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
        info!(
            symbol = %order.symbol,
            qty = order.qty,
            %price,
            remaining_cash = %state.cash,
            "📝 [PAPER] Bracket order filled"
        );

        Ok(OrderResponse {
            id: format!("paper-{}", id),
            client_order_id: format!("paper-{}", id),
            symbol: order.symbol.clone(),
            status: OrderStatus::Filled,
            qty: Some(qty),
            order_class: Some(OrderClass::Bracket),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MockPriceSource;
    use rust_decimal_macros::dec;

    fn paper_broker(cash: Decimal, price: Decimal) -> PaperBroker {
        let mut prices = MockPriceSource::new();
        prices
            .expect_current_price()
            .returning(move |_| Ok(price));
        PaperBroker::new(cash, Arc::new(prices))
    }

    #[tokio::test]
    async fn test_fill_deducts_cash_and_opens_position() {
        let broker = paper_broker(dec!(1000), dec!(50));
        let order = BracketOrder::buy("AAPL", 4, dec!(60), dec!(47.50));

        let response = broker.submit_bracket(&order).await.unwrap();
        assert_eq!(response.status, OrderStatus::Filled);
        assert_eq!(broker.cash().await, dec!(800));

        let positions = broker.positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].qty, dec!(4));
        assert_eq!(positions[0].avg_entry_price, dec!(50));

        let account = broker.account().await.unwrap();
        assert_eq!(account.cash, dec!(800));
        assert_eq!(account.portfolio_value, Some(dec!(1000)));
    }

    #[tokio::test]
    async fn test_insufficient_cash_rejected() {
        let broker = paper_broker(dec!(100), dec!(50));
        let order = BracketOrder::buy("AAPL", 3, dec!(60), dec!(47.50));

        assert!(broker.submit_bracket(&order).await.is_err());
        assert_eq!(broker.cash().await, dec!(100));
        assert!(broker.orders().await.is_empty());
    }

    #[tokio::test]
    async fn test_close_position_credits_proceeds() {
        let broker = paper_broker(dec!(1000), dec!(50));
        broker
            .submit_bracket(&BracketOrder::buy("AAPL", 2, dec!(60), dec!(47.50)))
            .await
            .unwrap();

        let closed = broker.close_position("AAPL", dec!(60)).await.unwrap();
        assert_eq!(closed.qty, dec!(2));
        assert_eq!(broker.cash().await, dec!(1020));
        assert!(broker.positions().await.unwrap().is_empty());
        assert!(broker.close_position("AAPL", dec!(60)).await.is_none());
    }
}
