//! Configuration management for the evergreen trader.
//!
//! Loads settings from an optional config file, `EGT__`-prefixed environment
//! variables and the well-known credential variables (`ALPACA_API_KEY`,
//! `ALPACA_SECRET`, `OPENAI_API_KEY`, `ALPHA_VANTAGE_API_KEY`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Alpaca brokerage credentials
    #[serde(default)]
    pub alpaca: AlpacaConfig,
    /// OpenAI completion settings
    #[serde(default)]
    pub openai: OpenAiConfig,
    /// News-sentiment discovery feed
    #[serde(default)]
    pub news: NewsConfig,
    /// Price data source
    #[serde(default)]
    pub prices: PricesConfig,
    /// Sizing and order parameters
    #[serde(default)]
    pub trading: TradingConfig,
    /// Position re-check schedule
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// SQLite journal
    #[serde(default)]
    pub journal: JournalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlpacaConfig {
    /// API key id
    #[serde(default)]
    pub api_key: String,
    /// API secret key
    #[serde(default)]
    pub secret_key: String,
    /// Trade against the paper endpoint
    #[serde(default = "default_paper")]
    pub paper: bool,
    /// Override for the REST base URL
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(default)]
    pub api_key: String,
    /// Chat model used for both prompts
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Sampling temperature for the growth verdict
    #[serde(default = "default_decision_temperature")]
    pub decision_temperature: f32,
    /// Sampling temperature for the sell-limit prediction
    #[serde(default = "default_limit_temperature")]
    pub limit_temperature: f32,
    /// Fixed seed sent with every completion
    #[serde(default = "default_seed")]
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsConfig {
    /// Alpha Vantage API key
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_news_base_url")]
    pub base_url: String,
    /// NEWS_SENTIMENT topic filter
    #[serde(default = "default_topic")]
    pub topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesConfig {
    #[serde(default = "default_prices_base_url")]
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Days of closing prices shown to the limit predictor
    #[serde(default = "default_history_days")]
    pub history_days: i64,
    /// Stop loss as a fraction of the current price (0.95 = 5% below)
    #[serde(default = "default_stop_loss_ratio")]
    pub stop_loss_ratio: Decimal,
    /// Maximum characters of article text sent to the model
    #[serde(default = "default_max_article_chars")]
    pub max_article_chars: usize,
    /// Trade against the in-memory paper broker instead of Alpaca
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between position checks
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,
    #[serde(default = "default_journal_path")]
    pub path: String,
}

// Default value functions
fn default_paper() -> bool {
    true
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_decision_temperature() -> f32 {
    1.0
}

fn default_limit_temperature() -> f32 {
    0.7
}

fn default_seed() -> u64 {
    50
}

fn default_news_base_url() -> String {
    "https://www.alphavantage.co".to_string()
}

fn default_topic() -> String {
    "blockchain".to_string()
}

fn default_prices_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_history_days() -> i64 {
    7
}

fn default_stop_loss_ratio() -> Decimal {
    Decimal::new(95, 2) // 0.95
}

fn default_max_article_chars() -> usize {
    12_000
}

fn default_check_interval() -> u64 {
    86_400 // once a day
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_path() -> String {
    "data/journal.db".to_string()
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("EGT"))
            .build()
            .context("Failed to build configuration")?;

        let mut config: Config = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.apply_credentials_from(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Fill credentials from the well-known variable names; non-empty values win.
    pub fn apply_credentials_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let pick = |name: &str, current: &mut String| {
            if let Some(value) = lookup(name).filter(|v| !v.is_empty()) {
                *current = value;
            }
        };

        pick("ALPACA_API_KEY", &mut self.alpaca.api_key);
        pick("ALPACA_SECRET", &mut self.alpaca.secret_key);
        pick("OPENAI_API_KEY", &mut self.openai.api_key);
        pick("ALPHA_VANTAGE_API_KEY", &mut self.news.api_key);

        if lookup("LIVE_TRADING").as_deref() == Some("true") {
            self.alpaca.paper = false;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.trading.stop_loss_ratio > Decimal::ZERO
                && self.trading.stop_loss_ratio < Decimal::ONE,
            "stop_loss_ratio must be between 0 and 1"
        );

        anyhow::ensure!(
            self.trading.history_days >= 1,
            "history_days must be at least 1"
        );

        anyhow::ensure!(
            self.schedule.check_interval_secs > 0,
            "check_interval_secs must be positive"
        );

        anyhow::ensure!(
            (0.0..=2.0).contains(&self.openai.decision_temperature)
                && (0.0..=2.0).contains(&self.openai.limit_temperature),
            "temperatures must be between 0 and 2"
        );

        Ok(())
    }

    /// Names of credentials that are still empty.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.alpaca.api_key.is_empty() || self.alpaca.secret_key.is_empty() {
            missing.push("ALPACA_API_KEY/ALPACA_SECRET");
        }
        if self.openai.api_key.is_empty() {
            missing.push("OPENAI_API_KEY");
        }
        if self.news.api_key.is_empty() {
            missing.push("ALPHA_VANTAGE_API_KEY");
        }
        missing
    }
}

impl Default for AlpacaConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            paper: default_paper(),
            base_url: None,
        }
    }
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_openai_base_url(),
            decision_temperature: default_decision_temperature(),
            limit_temperature: default_limit_temperature(),
            seed: default_seed(),
        }
    }
}

impl Default for NewsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_news_base_url(),
            topic: default_topic(),
        }
    }
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            base_url: default_prices_base_url(),
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            history_days: default_history_days(),
            stop_loss_ratio: default_stop_loss_ratio(),
            max_article_chars: default_max_article_chars(),
            dry_run: false,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_journal_enabled(),
            path: default_journal_path(),
        }
    }
}
