//! Evergreen Trader - Main Entry Point
//!
//! Runs the news-driven trading loop, prints allocations for ad-hoc spreads,
//! or shows the cycle journal.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use evergreen_trader::broker::{AlpacaClient, Broker, PaperBroker};
use evergreen_trader::config::Config;
use evergreen_trader::journal::Journal;
use evergreen_trader::llm::OpenAiClient;
use evergreen_trader::market::{AlphaVantageNews, ArticleScraper, PriceSource, YahooPrices};
use evergreen_trader::scheduler::{RecurringTask, ShutdownSignal};
use evergreen_trader::strategy::correct_allocate_percentages;
use evergreen_trader::trader::{Collaborators, TradingContext};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Starting balance of the in-memory broker used by `--dry-run`.
const PAPER_CASH: Decimal = dec!(100000);

/// Evergreen Trader CLI
#[derive(Parser)]
#[command(name = "evergreen-trader")]
#[command(version, about = "News-driven equity trading with LLM buy and sell-limit decisions")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a trading cycle, then re-check positions on a schedule
    Run {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,

        /// Trade against an in-memory paper broker
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the normalized allocation for TICKER=SPREAD pairs
    Allocate {
        /// Signals in rank-independent order, e.g. AAPL=12.5 MSFT=8
        #[arg(required = true)]
        signals: Vec<String>,
    },

    /// Show recent cycles from the journal
    Status {
        /// Path to SQLite journal
        #[arg(short, long, default_value = "data/journal.db")]
        db: String,

        /// Number of cycles to show
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Show the orders of each cycle
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    match cli.command {
        Some(Commands::Allocate { signals }) => show_allocation(&signals),
        Some(Commands::Status { db, limit, verbose }) => show_status(&db, limit, verbose),
        Some(Commands::Run { once, dry_run }) => run_trader(once, dry_run).await,
        None => run_trader(false, false).await,
    }
}

async fn run_trader(once: bool, dry_run: bool) -> Result<()> {
    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║              Evergreen Trader v{}                       ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    let mut config = Config::load()?;
    if dry_run {
        config.trading.dry_run = true;
    }
    config.validate()?;
    log_config(&config);

    let missing = config.missing_credentials();
    if !missing.is_empty() {
        if config.trading.dry_run {
            warn!("⚠️  Missing credentials: {}", missing.join(", "));
        } else {
            anyhow::bail!("Missing credentials: {}", missing.join(", "));
        }
    }

    let prices = Arc::new(YahooPrices::new(&config.prices)?);
    let broker = build_broker(&config, prices.clone())?;

    let services = Collaborators {
        news: Arc::new(AlphaVantageNews::new(&config.news)?),
        articles: Arc::new(ArticleScraper::new()?),
        prices,
        oracle: Arc::new(OpenAiClient::new(&config.openai)?),
        broker,
    };

    let journal = if config.journal.enabled {
        match Journal::open(&config.journal.path) {
            Ok(journal) => Some(journal),
            Err(e) => {
                warn!(error = %e, "Journal unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    let ctx = Arc::new(TradingContext::new(&config, services, journal));

    info!("🚀 Starting first trading cycle...");
    let report = ctx.run_cycle().await?;
    if once {
        return Ok(());
    }

    let shutdown = Arc::new(ShutdownSignal::new());
    let signal = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        signal.trigger();
    });

    let period = Duration::from_secs(config.schedule.check_interval_secs);
    info!(
        "⏰ Checking positions every {}s (holding {})",
        period.as_secs(),
        report.positions_held
    );
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let expected = Arc::new(AtomicUsize::new(report.positions_held));
    let checks = RecurringTask::new(period, shutdown.subscribe())
        .run(|tick| {
            let ctx = ctx.clone();
            let expected = expected.clone();
            async move {
                match ctx.check_positions(expected.load(Ordering::SeqCst)).await {
                    Ok(next) => expected.store(next, Ordering::SeqCst),
                    Err(e) => error!(tick, error = %e, "Position check failed"),
                }
            }
        })
        .await;

    info!(checks, "👋 Evergreen Trader stopped");
    Ok(())
}

/// Dry runs trade against a funded [`PaperBroker`]; otherwise Alpaca.
fn build_broker(config: &Config, prices: Arc<dyn PriceSource>) -> Result<Arc<dyn Broker>> {
    if config.trading.dry_run {
        info!("📝 DRY RUN - paper broker funded with ${}", PAPER_CASH);
        return Ok(Arc::new(PaperBroker::new(PAPER_CASH, prices)));
    }

    let client = AlpacaClient::new(&config.alpaca)?;
    if config.alpaca.paper {
        info!("📝 Alpaca paper trading at {}", client.base_url());
    } else {
        warn!("⚠️  LIVE TRADING MODE - Real money at risk!");
    }
    Ok(Arc::new(client))
}

/// Parse `TICKER=SPREAD`.
fn parse_signal(arg: &str) -> Result<(String, Decimal)> {
    let (ticker, value) = arg
        .split_once('=')
        .with_context(|| format!("Expected TICKER=SPREAD, got {:?}", arg))?;
    let ticker = ticker.trim();
    anyhow::ensure!(!ticker.is_empty(), "Empty ticker in {:?}", arg);

    let value = Decimal::from_str(value.trim())
        .with_context(|| format!("Invalid spread in {:?}", arg))?;
    Ok((ticker.to_uppercase(), value))
}

fn show_allocation(args: &[String]) -> Result<()> {
    let signals = args
        .iter()
        .map(|arg| parse_signal(arg))
        .collect::<Result<Vec<_>>>()?;

    let allocations = correct_allocate_percentages(&signals)?;

    println!("\n📊 Allocation");
    for allocation in &allocations {
        println!(
            "   {:>2}. {:<8} spread {:>12}  →  {:>10.6}%",
            allocation.rank,
            allocation.ticker,
            allocation.signal,
            allocation.percentage
        );
    }
    Ok(())
}

/// Show recent cycles from the journal.
fn show_status(db_path: &str, limit: usize, verbose: bool) -> Result<()> {
    use std::path::Path;

    println!("╔════════════════════════════════════════════════════════════╗");
    println!("║              EVERGREEN TRADER STATUS                       ║");
    println!("╚════════════════════════════════════════════════════════════╝");

    if !Path::new(db_path).exists() {
        println!("\n❌ Journal not found: {}", db_path);
        println!("   The trader has not completed a cycle yet, or the path is incorrect.");
        return Ok(());
    }

    let journal = Journal::open(db_path)?;
    let cycles = journal.recent_cycles(limit)?;

    if cycles.is_empty() {
        println!("\n❌ No cycles recorded yet.");
        return Ok(());
    }

    println!("\n📈 Recent Cycles");
    for cycle in &cycles {
        println!(
            "   ┌─ #{} {}",
            cycle.id,
            cycle.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        println!("   ├─ Cash:        ${:.2}", cycle.cash);
        println!("   ├─ Candidates:  {}", cycle.candidates);
        println!(
            "   ├─ Orders:      {} submitted, {} failed",
            cycle.submitted, cycle.failed
        );
        println!("   └─ Positions:   {}", cycle.positions_held);

        if verbose {
            for order in journal.orders_for_cycle(cycle.id)? {
                println!(
                    "      • {} x{} TP ${:.2} SL ${:.2} [{}]{}",
                    order.ticker,
                    order.quantity,
                    order.take_profit,
                    order.stop_loss,
                    order.status,
                    order
                        .error
                        .map(|e| format!(" {}", e))
                        .unwrap_or_default()
                );
            }
        }
    }

    Ok(())
}

/// Initialize logging to stdout and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "evergreen-trader.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("evergreen_trader=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .init();

    Ok(())
}

/// Log configuration on startup.
fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   Model: {} (seed {})", config.openai.model, config.openai.seed);
    info!(
        "   Temperatures: decision {}, limit {}",
        config.openai.decision_temperature, config.openai.limit_temperature
    );
    info!("   News Topic: {}", config.news.topic);
    info!("   History Window: {} days", config.trading.history_days);
    info!(
        "   Stop Loss: {:.0}% of price",
        config.trading.stop_loss_ratio * dec!(100)
    );
    info!(
        "   Check Interval: {}s",
        config.schedule.check_interval_secs
    );
    info!(
        "   Broker: {}",
        if config.trading.dry_run {
            "in-memory paper"
        } else if config.alpaca.paper {
            "Alpaca paper"
        } else {
            "Alpaca live"
        }
    );
    if config.journal.enabled {
        info!("   Journal: {}", config.journal.path);
    }
}
