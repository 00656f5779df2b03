//! SQLite journal of trading cycles.
//!
//! Records, per cycle:
//! - Cash available at sizing time and the resulting counts
//! - Every candidate with its predicted limit and spread
//! - Every order plan with its submission outcome

use crate::trader::CycleReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// One journaled cycle.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub cash: Decimal,
    pub candidates: usize,
    pub submitted: usize,
    pub failed: usize,
    pub positions_held: usize,
}

/// One journaled order.
#[derive(Debug, Clone)]
pub struct JournalOrder {
    pub ticker: String,
    pub quantity: i64,
    pub take_profit: Decimal,
    pub stop_loss: Decimal,
    pub status: String,
    pub broker_order_id: Option<String>,
    pub error: Option<String>,
}

/// SQLite-backed cycle journal.
pub struct Journal {
    conn: Connection,
}

fn parse_decimal(text: &str) -> Decimal {
    Decimal::from_str(text).unwrap_or_default()
}

impl Journal {
    /// Open (or create) the journal at `db_path`.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create journal directory {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {:?}", path))?;

        let journal = Self { conn };
        journal.init_schema()?;

        info!("Journal opened at {:?}", path);
        Ok(journal)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cycles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at TEXT NOT NULL,
                cash TEXT NOT NULL,
                candidates INTEGER NOT NULL,
                submitted INTEGER NOT NULL,
                failed INTEGER NOT NULL,
                positions_held INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS candidates (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cycle_id INTEGER NOT NULL REFERENCES cycles(id),
                ticker TEXT NOT NULL,
                url TEXT NOT NULL,
                predicted_limit TEXT NOT NULL,
                current_price TEXT NOT NULL,
                spread TEXT NOT NULL,
                allocation_pct TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_candidates_cycle ON candidates(cycle_id);

            CREATE TABLE IF NOT EXISTS orders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                cycle_id INTEGER NOT NULL REFERENCES cycles(id),
                ticker TEXT NOT NULL,
                quantity INTEGER NOT NULL,
                take_profit TEXT NOT NULL,
                stop_loss TEXT NOT NULL,
                status TEXT NOT NULL,
                broker_order_id TEXT,
                error TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_orders_cycle ON orders(cycle_id);
            "#,
        )?;

        debug!("Journal schema initialized");
        Ok(())
    }

    /// Store a cycle with its candidates and orders. Returns the cycle id.
    pub fn record_cycle(&self, report: &CycleReport) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute(
            r#"
            INSERT INTO cycles (started_at, cash, candidates, submitted, failed, positions_held)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                report.started_at.to_rfc3339(),
                report.cash.to_string(),
                report.candidates.len() as i64,
                report.submitted as i64,
                report.failed as i64,
                report.positions_held as i64,
            ],
        )?;
        let cycle_id = tx.last_insert_rowid();

        let allocations: HashMap<&str, Decimal> = report
            .plans
            .iter()
            .map(|p| (p.ticker.as_str(), p.allocation_pct))
            .collect();

        for candidate in &report.candidates {
            tx.execute(
                r#"
                INSERT INTO candidates (cycle_id, ticker, url, predicted_limit, current_price,
                                        spread, allocation_pct)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    cycle_id,
                    candidate.ticker,
                    candidate.article_url,
                    candidate.predicted_limit.to_string(),
                    candidate.current_price.to_string(),
                    candidate.spread.to_string(),
                    allocations
                        .get(candidate.ticker.as_str())
                        .map(|pct| pct.round_dp(6).to_string()),
                ],
            )?;
        }

        for outcome in &report.outcomes {
            tx.execute(
                r#"
                INSERT INTO orders (cycle_id, ticker, quantity, take_profit, stop_loss, status,
                                    broker_order_id, error)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
                params![
                    cycle_id,
                    outcome.ticker,
                    outcome.quantity,
                    outcome.take_profit.to_string(),
                    outcome.stop_loss.to_string(),
                    outcome.status,
                    outcome.order_id,
                    outcome.error,
                ],
            )?;
        }

        tx.commit()?;

        debug!(
            cycle_id,
            candidates = report.candidates.len(),
            orders = report.outcomes.len(),
            "Cycle journaled"
        );
        Ok(cycle_id)
    }

    /// Most recent cycles, newest first.
    pub fn recent_cycles(&self, limit: usize) -> Result<Vec<CycleSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, started_at, cash, candidates, submitted, failed, positions_held
            FROM cycles
            ORDER BY id DESC
            LIMIT ?1
            "#,
        )?;

        let cycles = stmt
            .query_map([limit as i64], |row| {
                Ok(CycleSummary {
                    id: row.get(0)?,
                    started_at: DateTime::parse_from_rfc3339(&row.get::<_, String>(1)?)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                    cash: parse_decimal(&row.get::<_, String>(2)?),
                    candidates: row.get::<_, i64>(3)? as usize,
                    submitted: row.get::<_, i64>(4)? as usize,
                    failed: row.get::<_, i64>(5)? as usize,
                    positions_held: row.get::<_, i64>(6)? as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(cycles)
    }

    /// Orders placed in a cycle, in submission order.
    pub fn orders_for_cycle(&self, cycle_id: i64) -> Result<Vec<JournalOrder>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ticker, quantity, take_profit, stop_loss, status, broker_order_id, error
            FROM orders
            WHERE cycle_id = ?1
            ORDER BY id
            "#,
        )?;

        let orders = stmt
            .query_map([cycle_id], |row| {
                Ok(JournalOrder {
                    ticker: row.get(0)?,
                    quantity: row.get(1)?,
                    take_profit: parse_decimal(&row.get::<_, String>(2)?),
                    stop_loss: parse_decimal(&row.get::<_, String>(3)?),
                    status: row.get(4)?,
                    broker_order_id: row.get(5)?,
                    error: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{Candidate, OrderPlan};
    use crate::trader::OrderOutcome;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn report(submitted: usize) -> CycleReport {
        let plan = OrderPlan {
            ticker: "NVDA".to_string(),
            allocation_pct: dec!(100),
            allotted_cash: dec!(5000),
            current_price: dec!(120.15),
            quantity: 42,
            take_profit: dec!(140),
            stop_loss: dec!(114.14),
        };

        CycleReport {
            started_at: Utc::now(),
            cash: dec!(5000),
            candidates: vec![
                Candidate::new("NVDA", "https://n/1", dec!(140), dec!(120.15)),
                Candidate::new("AMD", "https://n/2", dec!(90), dec!(100)),
            ],
            plans: vec![plan],
            outcomes: vec![OrderOutcome {
                ticker: "NVDA".to_string(),
                quantity: 42,
                take_profit: dec!(140),
                stop_loss: dec!(114.14),
                status: "submitted",
                order_id: Some("abc-123".to_string()),
                error: None,
            }],
            submitted,
            failed: 0,
            positions_held: 1,
        }
    }

    #[test]
    fn test_record_and_read_back() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path().join("nested/journal.db")).unwrap();

        let first = journal.record_cycle(&report(0)).unwrap();
        let second = journal.record_cycle(&report(1)).unwrap();
        assert!(second > first);

        let cycles = journal.recent_cycles(10).unwrap();
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].id, second);
        assert_eq!(cycles[0].submitted, 1);
        assert_eq!(cycles[0].candidates, 2);
        assert_eq!(cycles[0].cash, dec!(5000));

        let orders = journal.orders_for_cycle(second).unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].ticker, "NVDA");
        assert_eq!(orders[0].quantity, 42);
        assert_eq!(orders[0].stop_loss, dec!(114.14));
        assert_eq!(orders[0].broker_order_id.as_deref(), Some("abc-123"));
        assert!(orders[0].error.is_none());
    }

    #[test]
    fn test_recent_cycles_respects_limit() {
        let dir = tempdir().unwrap();
        let journal = Journal::open(dir.path().join("journal.db")).unwrap();
        for _ in 0..4 {
            journal.record_cycle(&report(1)).unwrap();
        }

        assert_eq!(journal.recent_cycles(3).unwrap().len(), 3);
        assert!(journal.orders_for_cycle(999).unwrap().is_empty());
    }
}
