//! Type definitions for Alpaca trading API requests and responses.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trading account snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub cash: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub buying_power: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub portfolio_value: Option<Decimal>,
}

/// Open position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub qty: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub avg_entry_price: Decimal,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub market_value: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub unrealized_pl: Option<Decimal>,
    pub side: PositionSide,
}

/// Position side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeInForce {
    Day, // Cancelled at market close
    Gtc, // Good Till Cancel
}

/// Order class; bracket attaches a take-profit and a stop-loss leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderClass {
    Simple,
    Bracket,
}

/// Order status as reported by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    New,
    Accepted,
    PendingNew,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TakeProfit {
    #[serde(with = "rust_decimal::serde::str")]
    pub limit_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopLoss {
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_price: Decimal,
}

/// Market buy with attached take-profit limit and stop-loss stop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BracketOrder {
    pub symbol: String,
    pub qty: u64,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub order_class: OrderClass,
    pub take_profit: TakeProfit,
    pub stop_loss: StopLoss,
}

impl BracketOrder {
    /// Good-till-cancelled market buy bracketed by the given exit prices.
    pub fn buy(symbol: &str, qty: u64, take_profit: Decimal, stop_loss: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            qty,
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Gtc,
            order_class: OrderClass::Bracket,
            take_profit: TakeProfit {
                limit_price: take_profit,
            },
            stop_loss: StopLoss {
                stop_price: stop_loss,
            },
        }
    }
}

/// Order acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    #[serde(default)]
    pub client_order_id: String,
    pub symbol: String,
    pub status: OrderStatus,
    #[serde(default, with = "rust_decimal::serde::str_option")]
    pub qty: Option<Decimal>,
    #[serde(default)]
    pub order_class: Option<OrderClass>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_bracket_order_wire_shape() {
        let order = BracketOrder::buy("AAPL", 12, dec!(215.50), dec!(190.00));
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(
            value,
            json!({
                "symbol": "AAPL",
                "qty": 12,
                "side": "buy",
                "type": "market",
                "time_in_force": "gtc",
                "order_class": "bracket",
                "take_profit": { "limit_price": "215.50" },
                "stop_loss": { "stop_price": "190.00" }
            })
        );
    }

    #[test]
    fn test_account_parses_string_decimals() {
        let account: Account = serde_json::from_value(json!({
            "id": "acc-1",
            "status": "ACTIVE",
            "currency": "USD",
            "cash": "10543.87",
            "buying_power": "21087.74"
        }))
        .unwrap();

        assert_eq!(account.cash, dec!(10543.87));
        assert_eq!(account.buying_power, Some(dec!(21087.74)));
        assert_eq!(account.portfolio_value, None);
    }

    #[test]
    fn test_unknown_order_status_tolerated() {
        let response: OrderResponse = serde_json::from_value(json!({
            "id": "ord-1",
            "symbol": "MSFT",
            "status": "held",
            "qty": "3"
        }))
        .unwrap();

        assert_eq!(response.status, OrderStatus::Other);
        assert_eq!(response.qty, Some(dec!(3)));
    }
}
