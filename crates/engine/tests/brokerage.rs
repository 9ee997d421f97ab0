//! Facade-level tests: accounts, reports, alerts and the limit-order watcher,
//! all against the in-memory ledger and a static oracle.

use api_client::StaticPriceOracle;
use chrono::{DateTime, Duration, TimeZone, Utc};
use configuration::Config;
use core_types::{AccountId, FixedClock, OrderSide};
use database::InMemoryLedger;
use engine::{Brokerage, BrokerageError, LimitOrderWatcher};
use executor::{ExecutorError, MarketCalendar, TradingContext, TradingParams};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::watch;

/// Tuesday 2024-01-02, 10:00 in New York.
fn market_open() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 15, 0, 0).unwrap()
}

struct Harness {
    oracle: Arc<StaticPriceOracle>,
    clock: Arc<FixedClock>,
    brokerage: Arc<Brokerage>,
}

impl Harness {
    fn new() -> Self {
        let oracle = Arc::new(StaticPriceOracle::new());
        let clock = Arc::new(FixedClock::new(market_open()));
        let ctx = TradingContext::new(
            Arc::new(InMemoryLedger::new()),
            oracle.clone(),
            clock.clone(),
            MarketCalendar::default(),
            TradingParams::default(),
            true,
        );
        Self {
            oracle,
            clock,
            brokerage: Arc::new(Brokerage::new(Arc::new(ctx))),
        }
    }

    async fn register(&self, username: &str) -> AccountId {
        self.brokerage.register(username, "hunter22").await.unwrap().id
    }
}

#[tokio::test]
async fn test_register_and_login() {
    let h = Harness::new();
    let account = h.brokerage.register("  ada ", "hunter22").await.unwrap();
    assert_eq!(account.username, "ada");
    assert_eq!(account.cash, dec!(10000.00));
    assert_ne!(account.password_hash, "hunter22");

    let logged_in = h.brokerage.login("ada", "hunter22").await.unwrap();
    assert_eq!(logged_in.id, account.id);

    assert!(matches!(
        h.brokerage.login("ada", "wrong-password").await,
        Err(BrokerageError::Auth)
    ));
    assert!(matches!(
        h.brokerage.login("nobody", "hunter22").await,
        Err(BrokerageError::Auth)
    ));
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_input() {
    let h = Harness::new();
    h.register("ada").await;

    assert!(matches!(
        h.brokerage.register("ada", "another1").await,
        Err(BrokerageError::UsernameTaken(name)) if name == "ada"
    ));
    assert!(matches!(
        h.brokerage.register("grace", "abc").await,
        Err(BrokerageError::InvalidCredentials(_))
    ));
    assert!(matches!(
        h.brokerage.register("", "hunter22").await,
        Err(BrokerageError::InvalidCredentials(_))
    ));
    assert!(matches!(
        h.brokerage.register("bad name", "hunter22").await,
        Err(BrokerageError::InvalidCredentials(_))
    ));
}

#[tokio::test]
async fn test_portfolio_marks_positions_to_market() {
    let h = Harness::new();
    let id = h.register("ada").await;
    h.oracle.set_price("AAPL", dec!(100));
    h.brokerage
        .market_order(id, "aapl", OrderSide::Buy, 10)
        .await
        .unwrap();

    h.oracle.set_price("AAPL", dec!(110));
    let valuation = h.brokerage.portfolio(id).await.unwrap();
    assert_eq!(valuation.cash, dec!(8990));
    assert_eq!(valuation.positions.len(), 1);
    assert_eq!(valuation.positions[0].ticker, "AAPL");
    assert_eq!(valuation.positions_value, dec!(1100));
    assert_eq!(valuation.total_value, dec!(10090));
    assert_eq!(valuation.profit, dec!(90));

    let unrealized = h.brokerage.portfolio_analytics(id).await.unwrap();
    assert_eq!(unrealized.len(), 1);
    assert_eq!(unrealized[0].unrealized_pnl, dec!(90));
    assert_eq!(unrealized[0].weight_pct, dec!(100));
}

#[tokio::test]
async fn test_unpriced_position_is_worth_zero() {
    let h = Harness::new();
    let id = h.register("ada").await;
    h.oracle.set_price("XYZ", dec!(50));
    h.brokerage
        .market_order(id, "XYZ", OrderSide::Buy, 2)
        .await
        .unwrap();

    h.oracle.remove_price("XYZ");
    let valuation = h.brokerage.portfolio(id).await.unwrap();
    assert_eq!(valuation.positions[0].price, None);
    assert_eq!(valuation.positions_value, dec!(0));
    assert_eq!(valuation.total_value, valuation.cash);
}

#[tokio::test]
async fn test_leaderboard_ranks_by_value_then_id() {
    let h = Harness::new();
    let ada = h.register("ada").await;
    let bob = h.register("bob").await;
    let cy = h.register("cy").await;

    h.oracle.set_price("AAPL", dec!(100));
    h.brokerage
        .market_order(cy, "AAPL", OrderSide::Buy, 10)
        .await
        .unwrap();
    h.oracle.set_price("AAPL", dec!(200));

    let board = h.brokerage.leaderboard().await.unwrap();
    let order: Vec<AccountId> = board.iter().map(|e| e.account_id).collect();
    assert_eq!(order, vec![cy, ada, bob]);
    assert_eq!(
        board.iter().map(|e| e.rank).collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(board[0].total_value, dec!(10990));
    assert_eq!(board[1].profit, dec!(0));
}

#[tokio::test]
async fn test_alerts_are_listed_and_marked_read() {
    let h = Harness::new();
    let id = h.register("ada").await;
    h.oracle.set_price("AAPL", dec!(100));
    h.brokerage
        .market_order(id, "AAPL", OrderSide::Buy, 1)
        .await
        .unwrap();
    assert!(h.brokerage.alerts(id).await.unwrap().is_empty());

    h.oracle.set_price("AAPL", dec!(106));
    let result = h
        .brokerage
        .market_order(id, "AAPL", OrderSide::Buy, 1)
        .await
        .unwrap();
    assert!(result.alert.is_some());

    let alerts = h.brokerage.alerts(id).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].change_percent, dec!(6.00));

    h.brokerage.mark_alert_read(alerts[0].id).await.unwrap();
    assert!(h.brokerage.alerts(id).await.unwrap().is_empty());

    assert!(matches!(
        h.brokerage.mark_alert_read(9_999).await,
        Err(BrokerageError::AlertNotFound(9_999))
    ));
}

#[tokio::test]
async fn test_trade_and_cash_history() {
    let h = Harness::new();
    let id = h.register("ada").await;
    h.oracle.set_price("AAPL", dec!(100));
    h.brokerage
        .market_order(id, "AAPL", OrderSide::Buy, 5)
        .await
        .unwrap();
    h.clock.advance(Duration::minutes(5));
    h.brokerage
        .market_order(id, "AAPL", OrderSide::Sell, 2)
        .await
        .unwrap();

    let history = h.brokerage.trade_history(id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].side, OrderSide::Sell);
    assert_eq!(history[1].side, OrderSide::Buy);

    let cash = h.brokerage.cash_history(id).await.unwrap();
    assert_eq!(cash.len(), 2);
    // 10000 - 505, then + 198.
    assert_eq!(cash[0].cash_after, dec!(9495));
    assert_eq!(cash[1].cash_after, dec!(9693));
    let account = h.brokerage.account(id).await.unwrap();
    assert_eq!(cash[1].cash_after, account.cash);

    let pnl = h.brokerage.realized_pnl(id).await.unwrap();
    assert_eq!(pnl.len(), 1);
    assert_eq!(pnl[0].pnl, dec!(198) - dec!(505));

    let stats = h.brokerage.trading_stats(id).await.unwrap();
    assert_eq!(stats.total_trades, 2);
    assert_eq!(stats.most_traded_ticker.as_deref(), Some("AAPL"));
}

#[tokio::test]
async fn test_reports_for_unknown_account() {
    let h = Harness::new();
    assert!(matches!(
        h.brokerage.portfolio(42).await,
        Err(BrokerageError::AccountNotFound(42))
    ));
    assert!(matches!(
        h.brokerage.trade_history(42).await,
        Err(BrokerageError::AccountNotFound(42))
    ));
    assert!(matches!(
        h.brokerage.alerts(42).await,
        Err(BrokerageError::AccountNotFound(42))
    ));
    assert!(matches!(
        h.brokerage.pending_limit_orders(42).await,
        Err(BrokerageError::AccountNotFound(42))
    ));
}

#[tokio::test]
async fn test_market_status_and_enforcement_toggle() {
    let h = Harness::new();
    let id = h.register("ada").await;
    h.oracle.set_price("AAPL", dec!(100));
    assert!(h.brokerage.market_status().is_open);

    // Saturday 2024-01-06.
    h.clock.set(Utc.with_ymd_and_hms(2024, 1, 6, 15, 0, 0).unwrap());
    let status = h.brokerage.market_status();
    assert!(!status.is_open);
    assert_eq!(
        status.next_open,
        Utc.with_ymd_and_hms(2024, 1, 8, 14, 30, 0).unwrap()
    );

    assert!(matches!(
        h.brokerage.market_order(id, "AAPL", OrderSide::Buy, 1).await,
        Err(BrokerageError::Executor(ExecutorError::MarketClosed { .. }))
    ));

    h.brokerage.set_market_hours_enforcement(false);
    assert!(!h.brokerage.market_hours_enforcement());
    h.brokerage
        .market_order(id, "AAPL", OrderSide::Buy, 1)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_from_config_uses_configured_capital() {
    let mut config = Config::default();
    config.trading.starting_capital = dec!(2500);
    config.market_hours.enforce = false;

    let brokerage = Brokerage::from_config(
        &config,
        Arc::new(InMemoryLedger::new()),
        Arc::new(StaticPriceOracle::new()),
        Arc::new(FixedClock::new(market_open())),
    )
    .unwrap();

    let account = brokerage.register("ada", "hunter22").await.unwrap();
    assert_eq!(account.cash, dec!(2500));
    assert!(!brokerage.market_hours_enforcement());
}

#[tokio::test]
async fn test_watcher_fills_orders_until_shutdown() {
    let h = Harness::new();
    let id = h.register("ada").await;
    h.oracle.set_price("AAPL", dec!(95));
    h.brokerage
        .create_limit_order(id, "AAPL", OrderSide::Buy, 10, dec!(100))
        .await
        .unwrap();

    let (tx, rx) = watch::channel(false);
    let watcher = LimitOrderWatcher::new(h.brokerage.clone(), std::time::Duration::from_millis(10));
    let handle = tokio::spawn(watcher.run(rx));

    for _ in 0..100 {
        if h.brokerage.pending_limit_orders(id).await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    tx.send(true).unwrap();

    assert_eq!(handle.await.unwrap(), 1);
    assert_eq!(h.brokerage.account(id).await.unwrap().cash, dec!(9050));
}
