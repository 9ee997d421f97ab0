use analytics::{PortfolioValuation, PositionStatus};
use anyhow::{Context, Result, bail};
use api_client::FinnhubClient;
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{Config, StoreBackend, init_tracing, load_config};
use core_types::{Account, OrderSide, SystemClock};
use database::{InMemoryLedger, LedgerStore, PgLedger, connect, run_migrations};
use engine::{Brokerage, LimitOrderWatcher};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// The main entry point for the Tradebook brokerage simulator.
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file, if there is one.
    dotenvy::dotenv().ok();

    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = load_config().context("Failed to load configuration")?;
    if let Some(backend) = cli.backend {
        config.database.backend = backend;
    }
    let _log_guard = init_tracing(&config.logging)?;

    let brokerage = Arc::new(build_brokerage(&config).await?);
    if cli.ignore_market_hours {
        brokerage.set_market_hours_enforcement(false);
    }
    let out = Output { json: cli.json };

    // Execute the appropriate command
    match cli.command {
        Commands::Register { username, password } => {
            let account = brokerage.register(&username, &password).await?;
            out.account(&account)
        }
        Commands::Login(auth) => {
            let account = auth.login(&brokerage).await?;
            out.account(&account)
        }
        Commands::Buy(args) => handle_market_order(&brokerage, &out, args, OrderSide::Buy).await,
        Commands::Sell(args) => handle_market_order(&brokerage, &out, args, OrderSide::Sell).await,
        Commands::Limit(args) => {
            let account = args.auth.login(&brokerage).await?;
            let order = brokerage
                .create_limit_order(
                    account.id,
                    &args.ticker,
                    args.side.into(),
                    args.shares,
                    args.price,
                )
                .await?;
            if out.json {
                return out.print_json(&order);
            }
            println!(
                "Limit order #{} placed: {} {} {} @ ${:.2}",
                order.id, order.side, order.shares, order.ticker, order.limit_price
            );
            Ok(())
        }
        Commands::Cancel { auth, order_id } => {
            let account = auth.login(&brokerage).await?;
            let pending = brokerage.pending_limit_orders(account.id).await?;
            if !pending.iter().any(|o| o.id == order_id) {
                bail!("No pending limit order #{order_id} on this account");
            }
            let order = brokerage.cancel_limit_order(order_id).await?;
            if out.json {
                return out.print_json(&order);
            }
            println!("Limit order #{} cancelled", order.id);
            Ok(())
        }
        Commands::Orders(auth) => {
            let account = auth.login(&brokerage).await?;
            let orders = brokerage.pending_limit_orders(account.id).await?;
            if out.json {
                return out.print_json(&orders);
            }
            let mut table = new_table(&["ID", "Side", "Ticker", "Shares", "Limit", "Placed"]);
            for o in &orders {
                table.add_row(vec![
                    o.id.to_string(),
                    o.side.to_string(),
                    o.ticker.clone(),
                    o.shares.to_string(),
                    money(o.limit_price),
                    o.created_at.format("%Y-%m-%d %H:%M").to_string(),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::CheckLimits => {
            let executed = brokerage.check_limit_orders().await?;
            println!("{executed} limit order(s) executed");
            Ok(())
        }
        Commands::WatchLimits { every } => handle_watch(brokerage, every).await,
        Commands::Portfolio(auth) => {
            let account = auth.login(&brokerage).await?;
            let valuation = brokerage.portfolio(account.id).await?;
            out.portfolio(&valuation)
        }
        Commands::Analytics(auth) => {
            let account = auth.login(&brokerage).await?;
            let positions = brokerage.portfolio_analytics(account.id).await?;
            if out.json {
                return out.print_json(&positions);
            }
            let mut table = new_table(&[
                "Ticker", "Shares", "Avg Cost", "Price", "Value", "Unrealized", "Move %", "Weight %",
            ]);
            for p in &positions {
                let price = if p.priced {
                    money(p.mark_price)
                } else {
                    format!("{} (cost)", money(p.mark_price))
                };
                table.add_row(vec![
                    p.ticker.clone(),
                    p.shares.to_string(),
                    money(p.avg_cost),
                    price,
                    money(p.position_value),
                    money(p.unrealized_pnl),
                    format!("{:.2}", p.move_pct),
                    format!("{:.2}", p.weight_pct),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::Stats(auth) => {
            let account = auth.login(&brokerage).await?;
            let stats = brokerage.trading_stats(account.id).await?;
            if out.json {
                return out.print_json(&stats);
            }
            let mut table = new_table(&["Metric", "Value"]);
            table.add_row(vec!["Total trades".to_string(), stats.total_trades.to_string()]);
            table.add_row(vec!["Wins / losses".to_string(), format!("{} / {}", stats.wins, stats.losses)]);
            table.add_row(vec!["Win rate".to_string(), format!("{:.2}%", stats.win_rate_pct)]);
            table.add_row(vec!["Biggest gain".to_string(), money(stats.biggest_gain)]);
            table.add_row(vec!["Biggest loss".to_string(), money(stats.biggest_loss)]);
            table.add_row(vec![
                "Most traded".to_string(),
                stats.most_traded_ticker.clone().unwrap_or_else(|| "-".to_string()),
            ]);
            table.add_row(vec!["Total volume".to_string(), money(stats.total_volume)]);
            table.add_row(vec!["Invested".to_string(), money(stats.total_invested)]);
            table.add_row(vec!["Returned".to_string(), money(stats.total_returned)]);
            table.add_row(vec!["Net P&L".to_string(), money(stats.net_pnl)]);
            table.add_row(vec!["Return".to_string(), format!("{:.2}%", stats.return_pct)]);
            println!("{table}");
            Ok(())
        }
        Commands::Pnl(auth) => {
            let account = auth.login(&brokerage).await?;
            let pnl = brokerage.realized_pnl(account.id).await?;
            if out.json {
                return out.print_json(&pnl);
            }
            let mut table = new_table(&[
                "Ticker", "Bought", "Buy Total", "Sold", "Sell Total", "P&L", "P&L %", "Status",
            ]);
            for row in &pnl {
                table.add_row(vec![
                    row.ticker.clone(),
                    row.buy_shares.to_string(),
                    money(row.buy_total),
                    row.sell_shares.to_string(),
                    money(row.sell_total),
                    money(row.pnl),
                    row.pnl_pct
                        .map(|p| format!("{p:.2}"))
                        .unwrap_or_else(|| "-".to_string()),
                    match row.status {
                        PositionStatus::Open => "open".to_string(),
                        PositionStatus::Closed => "closed".to_string(),
                    },
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::History(auth) => {
            let account = auth.login(&brokerage).await?;
            let trades = brokerage.trade_history(account.id).await?;
            if out.json {
                return out.print_json(&trades);
            }
            let mut table = new_table(&["ID", "Time", "Side", "Ticker", "Shares", "Price", "Total", "Source"]);
            for t in &trades {
                table.add_row(vec![
                    t.id.to_string(),
                    t.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    t.side.to_string(),
                    t.ticker.clone(),
                    t.shares.to_string(),
                    money(t.price),
                    money(t.total),
                    t.source.as_str().to_string(),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::Cash(auth) => {
            let account = auth.login(&brokerage).await?;
            let rows = brokerage.cash_history(account.id).await?;
            if out.json {
                return out.print_json(&rows);
            }
            let mut table = new_table(&["Trade", "Time", "Side", "Ticker", "Amount", "Cash After"]);
            for row in &rows {
                table.add_row(vec![
                    row.trade_id.to_string(),
                    row.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    row.side.to_string(),
                    row.ticker.clone(),
                    money(row.amount),
                    money(row.cash_after),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::Leaderboard => {
            let board = brokerage.leaderboard().await?;
            if out.json {
                return out.print_json(&board);
            }
            let mut table = new_table(&["Rank", "User", "Total Value", "Profit"]);
            for entry in &board {
                table.add_row(vec![
                    entry.rank.to_string(),
                    entry.username.clone(),
                    money(entry.total_value),
                    money(entry.profit),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::Alerts(auth) => {
            let account = auth.login(&brokerage).await?;
            let alerts = brokerage.alerts(account.id).await?;
            if out.json {
                return out.print_json(&alerts);
            }
            let mut table = new_table(&["ID", "Time", "Ticker", "From", "To", "Change %"]);
            for a in &alerts {
                table.add_row(vec![
                    a.id.to_string(),
                    a.triggered_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    a.ticker.clone(),
                    money(a.original_price),
                    money(a.current_price),
                    format!("{:.2}", a.change_percent),
                ]);
            }
            println!("{table}");
            Ok(())
        }
        Commands::ReadAlert { auth, alert_id } => {
            let account = auth.login(&brokerage).await?;
            let unread = brokerage.alerts(account.id).await?;
            if !unread.iter().any(|a| a.id == alert_id) {
                bail!("No unread alert #{alert_id} on this account");
            }
            brokerage.mark_alert_read(alert_id).await?;
            println!("Alert #{alert_id} marked as read");
            Ok(())
        }
        Commands::MarketStatus => {
            let status = brokerage.market_status();
            if out.json {
                return out.print_json(&status);
            }
            println!("{}", status.message);
            println!(
                "Market hours enforcement: {}",
                on_off(brokerage.market_hours_enforcement())
            );
            Ok(())
        }
        Commands::MarketHours => {
            println!(
                "Market hours enforcement: {}",
                on_off(brokerage.market_hours_enforcement())
            );
            Ok(())
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// A simulated stock brokerage: market and limit orders against live quotes.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Overrides the configured ledger backend.
    #[arg(long, global = true, value_enum)]
    backend: Option<StoreBackend>,

    /// Accept market orders outside trading hours for this run.
    #[arg(long, global = true)]
    ignore_market_hours: bool,

    /// Print machine-readable JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a new account funded with the starting capital.
    Register {
        #[arg(long)]
        username: String,
        #[arg(long, env = "TRADEBOOK_PASSWORD")]
        password: String,
    },
    /// Check credentials and show the account.
    Login(AuthArgs),
    /// Buy shares at the current market price.
    Buy(MarketOrderArgs),
    /// Sell shares at the current market price.
    Sell(MarketOrderArgs),
    /// Place a limit order.
    Limit(LimitOrderArgs),
    /// Cancel a pending limit order.
    Cancel {
        #[command(flatten)]
        auth: AuthArgs,
        #[arg(long)]
        order_id: i64,
    },
    /// List pending limit orders.
    Orders(AuthArgs),
    /// Run one limit-order matching pass over every account.
    CheckLimits,
    /// Keep matching limit orders until interrupted.
    WatchLimits {
        /// Seconds between matching passes.
        #[arg(long, default_value_t = 60)]
        every: u64,
    },
    /// Cash, positions and total value.
    Portfolio(AuthArgs),
    /// Unrealized P&L and weights of open positions.
    Analytics(AuthArgs),
    /// Win rate, volume and return.
    Stats(AuthArgs),
    /// Realized P&L per ticker.
    Pnl(AuthArgs),
    /// All trades, newest first.
    History(AuthArgs),
    /// Running cash balance after each trade.
    Cash(AuthArgs),
    /// All accounts ranked by total value.
    Leaderboard,
    /// Unread price alerts.
    Alerts(AuthArgs),
    /// Mark a price alert as read.
    ReadAlert {
        #[command(flatten)]
        auth: AuthArgs,
        #[arg(long)]
        alert_id: i64,
    },
    /// Whether the market is open, and when it next opens.
    MarketStatus,
    /// Show whether market orders are restricted to trading hours.
    MarketHours,
}

#[derive(Args)]
struct AuthArgs {
    #[arg(long)]
    username: String,
    #[arg(long, env = "TRADEBOOK_PASSWORD")]
    password: String,
}

impl AuthArgs {
    async fn login(&self, brokerage: &Brokerage) -> Result<Account> {
        Ok(brokerage.login(&self.username, &self.password).await?)
    }
}

#[derive(Args)]
struct MarketOrderArgs {
    #[command(flatten)]
    auth: AuthArgs,
    /// The ticker symbol (e.g., "AAPL").
    #[arg(long)]
    ticker: String,
    #[arg(long)]
    shares: i64,
}

#[derive(Args)]
struct LimitOrderArgs {
    #[command(flatten)]
    auth: AuthArgs,
    #[arg(long, value_enum)]
    side: Side,
    /// The ticker symbol (e.g., "AAPL").
    #[arg(long)]
    ticker: String,
    #[arg(long)]
    shares: i64,
    /// Trigger price in dollars.
    #[arg(long)]
    price: Decimal,
}

#[derive(Clone, Copy, ValueEnum)]
enum Side {
    Buy,
    Sell,
}

impl From<Side> for OrderSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Buy => OrderSide::Buy,
            Side::Sell => OrderSide::Sell,
        }
    }
}

// ==============================================================================
// Wiring
// ==============================================================================

async fn build_brokerage(config: &Config) -> Result<Brokerage> {
    let store: Arc<dyn LedgerStore> = match config.database.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory ledger; nothing is kept after exit");
            Arc::new(InMemoryLedger::new())
        }
        StoreBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("database.url or DATABASE_URL must be set for the postgres backend")?;
            let pool = connect(url)
                .await
                .context("Failed to connect to the database")?;
            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            Arc::new(PgLedger::new(pool))
        }
    };

    let oracle = Arc::new(
        FinnhubClient::from_config(&config.oracle).context("Failed to build the quote client")?,
    );
    Ok(Brokerage::from_config(config, store, oracle, Arc::new(SystemClock))?)
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn handle_market_order(
    brokerage: &Brokerage,
    out: &Output,
    args: MarketOrderArgs,
    side: OrderSide,
) -> Result<()> {
    let account = args.auth.login(brokerage).await?;
    let result = brokerage
        .market_order(account.id, &args.ticker, side, args.shares)
        .await?;
    if out.json {
        return out.print_json(&result);
    }

    let verb = match side {
        OrderSide::Buy => "Bought",
        OrderSide::Sell => "Sold",
    };
    println!(
        "{verb} {} {} @ ${:.2} (commission ${:.2}, total ${:.2})",
        result.trade.shares, result.trade.ticker, result.price, result.commission, result.amount
    );
    println!("Cash remaining: {}", money(result.cash_after));
    if let Some(alert) = &result.alert {
        println!(
            "Price alert: {} moved {:.2}% since your last trade (${:.2} -> ${:.2})",
            alert.ticker, alert.change_percent, alert.original_price, alert.current_price
        );
    }
    Ok(())
}

/// Runs the limit-order watcher until Ctrl-C.
async fn handle_watch(brokerage: Arc<Brokerage>, every: u64) -> Result<()> {
    if every == 0 {
        bail!("--every must be at least 1 second");
    }
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watcher = LimitOrderWatcher::new(brokerage, Duration::from_secs(every));
    let handle = tokio::spawn(watcher.run(shutdown_rx));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    tracing::info!("Shutdown requested");
    shutdown_tx.send(true).ok();

    let executed = handle.await.context("Watcher task failed")?;
    println!("{executed} limit order(s) executed");
    Ok(())
}

// ==============================================================================
// Output
// ==============================================================================

struct Output {
    json: bool,
}

impl Output {
    fn print_json<T: Serialize>(&self, value: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    fn account(&self, account: &Account) -> Result<()> {
        if self.json {
            return self.print_json(account);
        }
        println!(
            "Account #{} '{}': cash {} (opened {})",
            account.id,
            account.username,
            money(account.cash),
            account.created_at.format("%Y-%m-%d")
        );
        Ok(())
    }

    fn portfolio(&self, valuation: &PortfolioValuation) -> Result<()> {
        if self.json {
            return self.print_json(valuation);
        }
        let mut table = new_table(&["Ticker", "Shares", "Price", "Value", "Cost Basis", "P&L"]);
        for p in &valuation.positions {
            table.add_row(vec![
                p.ticker.clone(),
                p.shares.to_string(),
                p.price.map(money).unwrap_or_else(|| "n/a".to_string()),
                money(p.market_value),
                money(p.cost_basis),
                money(p.profit_loss),
            ]);
        }
        println!("{table}");
        println!("Cash:        {}", money(valuation.cash));
        println!("Positions:   {}", money(valuation.positions_value));
        println!("Total value: {}", money(valuation.total_value));
        println!("Profit:      {}", money(valuation.profit));
        Ok(())
    }
}

fn new_table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header.to_vec());
    table
}

fn money(value: Decimal) -> String {
    if value.is_sign_negative() {
        format!("-${:.2}", value.abs())
    } else {
        format!("${value:.2}")
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
