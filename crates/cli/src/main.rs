use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use mexcbot_core::*;
use mexcbot_data::dump::{write_rows, OutputFormat};
use mexcbot_data::{MemoryTickerStore, PostgresTickerStore};
use mexcbot_engine::{Poller, PollerConfig, TradeRequest, Trader};
use mexcbot_exchange::{AccountClient, MarketDataClient};
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "mexcbot")]
#[command(about = "MEXC spot ticker collector, table dumper and signed order client")]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(flatten)]
    db: DbArgs,

    #[command(flatten)]
    exchange: ExchangeArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DbArgs {
    #[arg(long, env = "POSTGRES_HOST")]
    pg_host: Option<String>,

    #[arg(long, env = "POSTGRES_PORT", default_value_t = 5432)]
    pg_port: u16,

    #[arg(long, env = "POSTGRES_NAME")]
    pg_name: Option<String>,

    #[arg(long, env = "POSTGRES_USER")]
    pg_user: Option<String>,

    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pg_password: Option<String>,

    /// Table holding the latest snapshot per symbol
    #[arg(long, env = "TABLE_NAME")]
    table: Option<String>,
}

impl DbArgs {
    fn config(&self) -> Result<DatabaseConfig, ConfigError> {
        DatabaseConfig::from_parts(
            self.pg_host.clone(),
            self.pg_port,
            self.pg_name.clone(),
            self.pg_user.clone(),
            self.pg_password.clone(),
            self.table.clone(),
        )
    }
}

#[derive(Args)]
struct ExchangeArgs {
    /// REST base URL of the exchange
    #[arg(long, env = "MEXC_API_BASE")]
    api_base: Option<String>,

    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    /// Send orders for execution. When false they go to the test endpoint.
    #[arg(
        long,
        env = "LIVE_TRADING",
        action = ArgAction::Set,
        default_value = "false",
        value_parser = parse_bool
    )]
    live_trading: bool,
}

impl ExchangeArgs {
    fn config(&self) -> ExchangeConfig {
        ExchangeConfig::new(
            self.api_base.clone(),
            self.api_key.clone(),
            self.api_secret.clone(),
            self.live_trading,
        )
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Poll 24h tickers into the database until Ctrl-C
    Collect {
        /// Seconds to wait between two polls
        #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = 3)]
        interval_secs: u64,

        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,

        /// Keep snapshots in memory instead of writing to Postgres
        #[arg(long)]
        dry_run: bool,
    },

    /// Print every stored row
    Dump {
        /// Output format (text, csv, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Fetch current 24h tickers
    Tickers {
        /// Only show this symbol (e.g. "BTCUSDT")
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Show non-zero account balances
    Balance,

    /// Spend a share of the free quote balance on one order
    Trade {
        /// Trading pair (e.g. "BTCUSDT")
        #[arg(short, long)]
        symbol: String,

        /// BUY or SELL
        #[arg(long, default_value = "BUY")]
        side: Side,

        /// LIMIT or MARKET
        #[arg(long = "type", default_value = "MARKET")]
        order_type: OrderType,

        /// Limit price (required for LIMIT orders)
        #[arg(long)]
        price: Option<Decimal>,

        /// Share of the free quote balance to spend, in (0, 1]
        #[arg(long, default_value = "0.5")]
        allocation: Decimal,

        /// Quote asset the budget is drawn from
        #[arg(long, default_value = "USDT")]
        quote: String,
    },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let exchange = cli.exchange.config();

    match cli.command {
        Commands::Collect {
            interval_secs,
            max_cycles,
            dry_run,
        } => {
            let market = MarketDataClient::from_config(&exchange)?;
            let config = PollerConfig {
                interval: Duration::from_secs(interval_secs),
                max_cycles,
            };
            if dry_run {
                collect(market, MemoryTickerStore::new(), config).await?;
            } else {
                let db = cli.db.config()?;
                let store = PostgresTickerStore::connect_lazy(&db, acquire_timeout(config.interval));
                collect(market, store, config).await?;
            }
        }
        Commands::Dump { format } => {
            let db = cli.db.config()?;
            let store = PostgresTickerStore::connect(&db)
                .await
                .with_context(|| format!("Connecting to {}:{}/{}", db.host, db.port, db.name))?;
            let rows = store.load_all().await?;
            write_rows(std::io::stdout().lock(), &rows, format, &db.table)?;
        }
        Commands::Tickers { symbol } => {
            let market = MarketDataClient::from_config(&exchange)?;
            let tickers = match symbol {
                Some(symbol) => match market.fetch_ticker(&symbol).await? {
                    Some(t) => vec![t],
                    None => anyhow::bail!("Symbol not found: {symbol}"),
                },
                None => market.fetch_tickers().await?,
            };
            print_tickers(&tickers);
        }
        Commands::Balance => {
            let credentials = exchange.require_credentials()?.clone();
            let account = AccountClient::new(&exchange.base_url, credentials)?;
            let balances = account.get_balances().await?;
            print_balances(&balances);
        }
        Commands::Trade {
            symbol,
            side,
            order_type,
            price,
            allocation,
            quote,
        } => {
            let credentials = exchange.require_credentials()?.clone();
            let market = MarketDataClient::from_config(&exchange)?;
            let account = AccountClient::new(&exchange.base_url, credentials)?;
            let trader = Trader::new(market, account, exchange.live_trading);

            let mut request = TradeRequest::new(&symbol, side, order_type)
                .with_allocation(allocation)
                .with_quote_asset(&quote);
            if let Some(price) = price {
                request = request.with_price(price);
            }

            let outcome = trader.execute(&request).await?;

            let sep = "=".repeat(60);
            println!("\n{sep}");
            if outcome.live {
                println!("  ORDER PLACED");
            } else {
                println!("  TEST ORDER ACCEPTED (LIVE_TRADING=false, not executed)");
            }
            println!("{sep}");
            println!("  Symbol:          {}", outcome.order.symbol);
            println!("  Side / Type:     {} {}", outcome.order.side, outcome.order.order_type);
            println!("  Free {:<10} {}", format!("{}:", request.quote_asset), outcome.available);
            println!("  Budget:          {}", outcome.budget);
            println!("  Quantity:        {}", outcome.order.rounded_quantity());
            if let Some(price) = outcome.order.price {
                println!("  Price:           {price}");
            }
            println!("{sep}");
            println!("{}", serde_json::to_string_pretty(&outcome.confirmation)?);
        }
    }

    Ok(())
}

async fn collect<M, S>(market: M, store: S, config: PollerConfig) -> Result<()>
where
    M: MarketDataSource,
    S: TickerStore,
{
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, stopping after the current cycle");
            let _ = shutdown_tx.send(true);
        }
    });

    let poller = Poller::new(market, store, config);
    let stats = poller.run(shutdown_rx).await;

    tracing::info!(
        cycles = stats.cycles,
        failures = stats.fetch_failures + stats.store_failures,
        rows = stats.rows_written,
        "Collection finished"
    );
    Ok(())
}

/// How long one cycle may wait for a database connection: half the poll
/// interval, between 250 ms and 10 s.
fn acquire_timeout(interval: Duration) -> Duration {
    (interval / 2).clamp(Duration::from_millis(250), Duration::from_secs(10))
}

fn print_tickers(tickers: &[TickerSnapshot]) {
    println!(
        "{:<16} {:>18} {:>10} {:>18} {:>18} {:>20}",
        "SYMBOL", "LAST", "CHANGE", "HIGH", "LOW", "VOLUME"
    );
    for t in tickers {
        println!(
            "{:<16} {:>18} {:>10} {:>18} {:>18} {:>20}",
            t.symbol, t.last_price, t.price_change_percent, t.high_price, t.low_price, t.volume
        );
    }
    println!("({} symbols)", tickers.len());
}

fn print_balances(balances: &[Balance]) {
    let held: Vec<&Balance> = balances
        .iter()
        .filter(|b| !b.free.is_zero() || !b.locked.is_zero())
        .collect();
    if held.is_empty() {
        println!("No balances held.");
        return;
    }
    println!("{:<10} {:>24} {:>24}", "ASSET", "FREE", "LOCKED");
    for b in held {
        println!("{:<10} {:>24} {:>24}", b.asset, b.free, b.locked);
    }
}
