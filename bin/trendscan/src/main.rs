use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use backtest::{run_backtest, BacktestConfig, SimConfig};
use common::{Config, Venue};
use engine::{connect, load_universe, ScanCache, Scanner, VenueLimits};
use strategy::{Condition, RuleFileConfig, RuleSet, TrendStack, TrendStackConfig};

#[derive(Parser, Debug)]
#[command(name = "trendscan", about = "Multi-timeframe trend scanner and backtester")]
struct Cli {
    /// Overrides SCAN_VENUE.
    #[arg(long, global = true)]
    venue: Option<Venue>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Screen symbols for the configured setup. Scans the top-volume universe when none are given.
    Scan { symbols: Vec<String> },
    /// Replay the trend stack over one symbol's recent history
    Backtest {
        symbol: String,
        #[arg(long)]
        allow_short: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cli = Cli::parse();
    let cfg = Config::from_env().context("invalid configuration")?;
    let venue = cli.venue.unwrap_or(cfg.venue);
    let limits = VenueLimits::for_venue(venue);
    let clients = connect(venue, limits.fetch_timeout)?;
    info!(venue = %venue, "trendscan starting");

    let stack = TrendStack::new(TrendStackConfig {
        use_rsi: cfg.use_rsi,
        use_adx: cfg.use_adx,
        ..TrendStackConfig::default()
    });

    match cli.command {
        Command::Scan { symbols } => {
            let condition: Arc<dyn Condition> = match &cfg.rules_path {
                Some(path) => {
                    let rules = RuleFileConfig::load(path)?;
                    Arc::new(RuleSet::from_config(&rules).with_context(|| format!("rule file {path}"))?)
                }
                None => Arc::new(stack),
            };
            let cache = Arc::new(ScanCache::new(Duration::from_secs(cfg.cache_ttl_secs)));

            let symbols = if symbols.is_empty() {
                load_universe(&*clients.symbols, venue, cfg.top_n, Some(cache.as_ref())).await?
            } else {
                symbols.into_iter().map(|s| s.to_uppercase()).collect()
            };

            let scanner = Scanner::new(clients.candles, condition)
                .with_limits(limits)
                .with_candle_limit(cfg.candle_limit)
                .only_pulse(cfg.only_pulse)
                .with_cache(cache);

            let mut report = scanner.scan(&symbols).await?;
            report.results.sort_by(|a, b| a.symbol.cmp(&b.symbol));
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Backtest {
            symbol,
            allow_short,
        } => {
            let config = BacktestConfig {
                base_limit: cfg.backtest_base_limit,
                sim: SimConfig {
                    initial_balance: cfg.backtest_initial_balance,
                    allow_short,
                    ..SimConfig::default()
                },
            };
            let symbol = symbol.to_uppercase();
            match run_backtest(&*clients.candles, &symbol, &stack, &config).await? {
                Some(report) => println!("{}", serde_json::to_string_pretty(&report)?),
                None => warn!(symbol = %symbol, "Not enough history to backtest"),
            }
        }
    }

    Ok(())
}
