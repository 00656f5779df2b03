//! # Evergreen Trader
//!
//! An automated equity trading loop driven by news sentiment and language
//! model judgements.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `market`: News discovery, article scraping and price data
//! - `llm`: OpenAI client, growth verdict and sell-limit prediction
//! - `broker`: Alpaca REST client and an in-memory paper broker
//! - `strategy`: Candidate analysis, allocation, sizing and order placement
//! - `trader`: The trading cycle and position re-check
//! - `scheduler`: Recurring task with cancellation
//! - `journal`: SQLite journal of cycles and orders
//! - `utils`: Shared utilities and decimal arithmetic

pub mod broker;
pub mod config;
pub mod journal;
pub mod llm;
pub mod market;
pub mod scheduler;
pub mod strategy;
pub mod trader;
pub mod utils;

pub use config::Config;
