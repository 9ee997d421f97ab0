use crate::error::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Account, AccountId, AlertId, LimitOrder, NewLimitOrder, NewPriceAlert, NewTrade, OrderId,
    PriceAlert, Trade,
};
use rust_decimal::Decimal;

/// Durable record of accounts, trades, limit orders and alerts.
///
/// Trades are append-only. The only way cash changes is together with a trade
/// append, through [`LedgerStore::record_trade`] or [`LedgerStore::fill_limit_order`],
/// and both are compare-and-set on the cash value the caller read.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Fails with `Conflict` when the username is already taken.
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        cash: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<Account, DbError>;

    async fn find_account(&self, account_id: AccountId) -> Result<Option<Account>, DbError>;

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError>;

    async fn list_accounts(&self) -> Result<Vec<Account>, DbError>;

    /// All trades of an account, in append order (`id`).
    async fn trades_for_account(&self, account_id: AccountId) -> Result<Vec<Trade>, DbError>;

    /// The account's most recent trade of `ticker`, if any.
    async fn last_trade_for_ticker(
        &self,
        account_id: AccountId,
        ticker: &str,
    ) -> Result<Option<Trade>, DbError>;

    /// Appends a trade and sets the account's cash to `cash_after` in one atomic step.
    ///
    /// Fails with `Conflict` if the stored cash is no longer `expected_cash`,
    /// and with `NotFound` if the account does not exist.
    async fn record_trade(
        &self,
        trade: NewTrade,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<Trade, DbError>;

    async fn create_limit_order(&self, order: NewLimitOrder) -> Result<LimitOrder, DbError>;

    async fn find_limit_order(&self, order_id: OrderId) -> Result<Option<LimitOrder>, DbError>;

    /// Pending orders in creation order, optionally for one account only.
    async fn pending_limit_orders(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<LimitOrder>, DbError>;

    /// Moves a pending order to `cancelled`. Returns `false` if it was not pending.
    async fn cancel_limit_order(&self, order_id: OrderId) -> Result<bool, DbError>;

    /// Executes a pending order: marks it `executed` at `trade.executed_at`,
    /// appends the trade and updates cash, all or nothing.
    ///
    /// Returns `Ok(None)` without touching anything when the order is no longer
    /// pending. Cash is compare-and-set exactly as in `record_trade`.
    async fn fill_limit_order(
        &self,
        order_id: OrderId,
        trade: NewTrade,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<Option<Trade>, DbError>;

    async fn save_alert(&self, alert: NewPriceAlert) -> Result<PriceAlert, DbError>;

    /// Alerts of an account, newest first.
    async fn alerts_for_account(
        &self,
        account_id: AccountId,
        unread_only: bool,
    ) -> Result<Vec<PriceAlert>, DbError>;

    /// Returns `false` if no such alert exists.
    async fn mark_alert_read(&self, alert_id: AlertId) -> Result<bool, DbError>;
}
