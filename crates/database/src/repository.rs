use crate::DbError;
use crate::store::LedgerStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{
    Account, AccountId, AlertId, LimitOrder, NewLimitOrder, NewPriceAlert, NewTrade, OrderId,
    PriceAlert, Trade,
};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{FromRow, Transaction};

/// The Postgres-backed `LedgerStore`. Multi-row writes run in one transaction.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
}

// This struct represents a row fetched from the accounts table.
#[derive(FromRow, Debug, Clone)]
pub struct DbAccount {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub cash: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<DbAccount> for Account {
    fn from(row: DbAccount) -> Self {
        Account {
            id: row.id,
            username: row.username,
            password_hash: row.password_hash,
            cash: row.cash,
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow, Debug, Clone)]
pub struct DbTrade {
    pub id: i64,
    pub account_id: i64,
    pub ticker: String,
    pub side: String,
    pub shares: i64,
    pub price: Decimal,
    pub total: Decimal,
    pub source: String,
    pub executed_at: DateTime<Utc>,
}

impl TryFrom<DbTrade> for Trade {
    type Error = DbError;

    fn try_from(row: DbTrade) -> Result<Self, Self::Error> {
        Ok(Trade {
            id: row.id,
            account_id: row.account_id,
            side: row.side.parse().map_err(corrupt("trade", row.id))?,
            source: row.source.parse().map_err(corrupt("trade", row.id))?,
            ticker: row.ticker,
            shares: row.shares,
            price: row.price,
            total: row.total,
            executed_at: row.executed_at,
        })
    }
}

#[derive(FromRow, Debug, Clone)]
pub struct DbLimitOrder {
    pub id: i64,
    pub account_id: i64,
    pub ticker: String,
    pub side: String,
    pub shares: i64,
    pub limit_price: Decimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbLimitOrder> for LimitOrder {
    type Error = DbError;

    fn try_from(row: DbLimitOrder) -> Result<Self, Self::Error> {
        Ok(LimitOrder {
            id: row.id,
            account_id: row.account_id,
            side: row.side.parse().map_err(corrupt("limit order", row.id))?,
            status: row.status.parse().map_err(corrupt("limit order", row.id))?,
            ticker: row.ticker,
            shares: row.shares,
            limit_price: row.limit_price,
            created_at: row.created_at,
            executed_at: row.executed_at,
        })
    }
}

#[derive(FromRow, Debug, Clone)]
pub struct DbPriceAlert {
    pub id: i64,
    pub account_id: i64,
    pub ticker: String,
    pub original_price: Decimal,
    pub current_price: Decimal,
    pub change_percent: Decimal,
    pub triggered_at: DateTime<Utc>,
    pub read: bool,
}

impl From<DbPriceAlert> for PriceAlert {
    fn from(row: DbPriceAlert) -> Self {
        PriceAlert {
            id: row.id,
            account_id: row.account_id,
            ticker: row.ticker,
            original_price: row.original_price,
            current_price: row.current_price,
            change_percent: row.change_percent,
            triggered_at: row.triggered_at,
            read: row.read,
        }
    }
}

fn corrupt<E: std::fmt::Display>(table: &'static str, id: i64) -> impl Fn(E) -> DbError {
    move |e| DbError::Corrupt(format!("{table} {id}: {e}"))
}

const ACCOUNT_COLUMNS: &str = "id, username, password_hash, cash, created_at";
const TRADE_COLUMNS: &str = "id, account_id, ticker, side, shares, price, total, source, executed_at";
const ORDER_COLUMNS: &str =
    "id, account_id, ticker, side, shares, limit_price, status, created_at, executed_at";
const ALERT_COLUMNS: &str =
    "id, account_id, ticker, original_price, current_price, change_percent, triggered_at, read";

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Compare-and-set of an account's cash inside `tx`.
    async fn swap_cash(
        tx: &mut Transaction<'_, Postgres>,
        account_id: AccountId,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<(), DbError> {
        let updated = sqlx::query("UPDATE accounts SET cash = $1 WHERE id = $2 AND cash = $3")
            .bind(cash_after)
            .bind(account_id)
            .bind(expected_cash)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        if updated == 1 {
            return Ok(());
        }

        let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM accounts WHERE id = $1")
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await?;
        match exists {
            Some(_) => Err(DbError::Conflict(format!(
                "cash of account {account_id} changed since it was read"
            ))),
            None => Err(DbError::NotFound),
        }
    }

    async fn insert_trade(
        tx: &mut Transaction<'_, Postgres>,
        trade: &NewTrade,
    ) -> Result<Trade, DbError> {
        let query = format!(
            "INSERT INTO trades (account_id, ticker, side, shares, price, total, source, executed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {TRADE_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbTrade>(&query)
            .bind(trade.account_id)
            .bind(&trade.ticker)
            .bind(trade.side.as_str())
            .bind(trade.shares)
            .bind(trade.price)
            .bind(trade.total)
            .bind(trade.source.as_str())
            .bind(trade.executed_at)
            .fetch_one(&mut **tx)
            .await?;
        row.try_into()
    }
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn create_account(
        &self,
        username: &str,
        password_hash: &str,
        cash: Decimal,
        created_at: DateTime<Utc>,
    ) -> Result<Account, DbError> {
        let query = format!(
            "INSERT INTO accounts (username, password_hash, cash, created_at) \
             VALUES ($1, $2, $3, $4) ON CONFLICT (username) DO NOTHING RETURNING {ACCOUNT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbAccount>(&query)
            .bind(username)
            .bind(password_hash)
            .bind(cash)
            .bind(created_at)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Account::from)
            .ok_or_else(|| DbError::Conflict(format!("username '{username}' is taken")))
    }

    async fn find_account(&self, account_id: AccountId) -> Result<Option<Account>, DbError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query_as::<_, DbAccount>(&query)
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }

    async fn find_account_by_username(&self, username: &str) -> Result<Option<Account>, DbError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = $1");
        let row = sqlx::query_as::<_, DbAccount>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Account::from))
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, DbError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts ORDER BY id");
        let rows = sqlx::query_as::<_, DbAccount>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Account::from).collect())
    }

    async fn trades_for_account(&self, account_id: AccountId) -> Result<Vec<Trade>, DbError> {
        let query = format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE account_id = $1 ORDER BY id"
        );
        let rows = sqlx::query_as::<_, DbTrade>(&query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Trade::try_from).collect()
    }

    async fn last_trade_for_ticker(
        &self,
        account_id: AccountId,
        ticker: &str,
    ) -> Result<Option<Trade>, DbError> {
        let query = format!(
            "SELECT {TRADE_COLUMNS} FROM trades WHERE account_id = $1 AND ticker = $2 \
             ORDER BY id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, DbTrade>(&query)
            .bind(account_id)
            .bind(ticker)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Trade::try_from).transpose()
    }

    async fn record_trade(
        &self,
        trade: NewTrade,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<Trade, DbError> {
        let mut tx: Transaction<Postgres> = self.pool.begin().await?;
        Self::swap_cash(&mut tx, trade.account_id, expected_cash, cash_after).await?;
        let trade = Self::insert_trade(&mut tx, &trade).await?;
        tx.commit().await?;
        Ok(trade)
    }

    async fn create_limit_order(&self, order: NewLimitOrder) -> Result<LimitOrder, DbError> {
        let query = format!(
            "INSERT INTO limit_orders (account_id, ticker, side, shares, limit_price, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, 'pending', $6) RETURNING {ORDER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbLimitOrder>(&query)
            .bind(order.account_id)
            .bind(&order.ticker)
            .bind(order.side.as_str())
            .bind(order.shares)
            .bind(order.limit_price)
            .bind(order.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => DbError::NotFound,
                other => DbError::ConnectionError(other),
            })?;
        row.try_into()
    }

    async fn find_limit_order(&self, order_id: OrderId) -> Result<Option<LimitOrder>, DbError> {
        let query = format!("SELECT {ORDER_COLUMNS} FROM limit_orders WHERE id = $1");
        let row = sqlx::query_as::<_, DbLimitOrder>(&query)
            .bind(order_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(LimitOrder::try_from).transpose()
    }

    async fn pending_limit_orders(
        &self,
        account_id: Option<AccountId>,
    ) -> Result<Vec<LimitOrder>, DbError> {
        let query = format!(
            "SELECT {ORDER_COLUMNS} FROM limit_orders \
             WHERE status = 'pending' AND ($1::BIGINT IS NULL OR account_id = $1) ORDER BY id"
        );
        let rows = sqlx::query_as::<_, DbLimitOrder>(&query)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(LimitOrder::try_from).collect()
    }

    async fn cancel_limit_order(&self, order_id: OrderId) -> Result<bool, DbError> {
        let updated = sqlx::query(
            "UPDATE limit_orders SET status = 'cancelled' WHERE id = $1 AND status = 'pending'",
        )
        .bind(order_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(updated == 1)
    }

    async fn fill_limit_order(
        &self,
        order_id: OrderId,
        trade: NewTrade,
        expected_cash: Decimal,
        cash_after: Decimal,
    ) -> Result<Option<Trade>, DbError> {
        let mut tx: Transaction<Postgres> = self.pool.begin().await?;

        let claimed = sqlx::query(
            "UPDATE limit_orders SET status = 'executed', executed_at = $1 \
             WHERE id = $2 AND status = 'pending'",
        )
        .bind(trade.executed_at)
        .bind(order_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if claimed == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        Self::swap_cash(&mut tx, trade.account_id, expected_cash, cash_after).await?;
        let trade = Self::insert_trade(&mut tx, &trade).await?;
        tx.commit().await?;
        Ok(Some(trade))
    }

    async fn save_alert(&self, alert: NewPriceAlert) -> Result<PriceAlert, DbError> {
        let query = format!(
            "INSERT INTO price_alerts (account_id, ticker, original_price, current_price, change_percent, triggered_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ALERT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, DbPriceAlert>(&query)
            .bind(alert.account_id)
            .bind(&alert.ticker)
            .bind(alert.original_price)
            .bind(alert.current_price)
            .bind(alert.change_percent)
            .bind(alert.triggered_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.into())
    }

    async fn alerts_for_account(
        &self,
        account_id: AccountId,
        unread_only: bool,
    ) -> Result<Vec<PriceAlert>, DbError> {
        let query = format!(
            "SELECT {ALERT_COLUMNS} FROM price_alerts \
             WHERE account_id = $1 AND (NOT $2 OR read = FALSE) ORDER BY triggered_at DESC, id DESC"
        );
        let rows = sqlx::query_as::<_, DbPriceAlert>(&query)
            .bind(account_id)
            .bind(unread_only)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(PriceAlert::from).collect())
    }

    async fn mark_alert_read(&self, alert_id: AlertId) -> Result<bool, DbError> {
        let updated = sqlx::query("UPDATE price_alerts SET read = TRUE WHERE id = $1")
            .bind(alert_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(updated == 1)
    }
}
