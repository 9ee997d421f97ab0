use chrono::{DateTime, Utc};
use core_types::{AccountId, CoreError, OrderId};
use database::DbError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons an order is rejected. Every rejection happens before any mutation.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Invalid order: {0}")]
    InvalidInput(String),

    #[error("Market is closed. Opens {hint}")]
    MarketClosed { next_open: DateTime<Utc>, hint: String },

    #[error("Could not get a price for {0}")]
    UnknownTicker(String),

    #[error("Insufficient funds. You need ${shortfall} more (required {required}, available {available})")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
        shortfall: Decimal,
    },

    #[error("You only own {owned} shares of {ticker}, cannot sell {requested}")]
    InsufficientShares {
        ticker: String,
        requested: i64,
        owned: i64,
    },

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Limit order {0} not found")]
    OrderNotFound(OrderId),

    #[error("Limit order {0} already executed or cancelled")]
    OrderNotPending(OrderId),

    #[error("Ledger store error: {0}")]
    Store(#[from] DbError),
}

impl From<CoreError> for ExecutorError {
    fn from(e: CoreError) -> Self {
        ExecutorError::InvalidInput(e.to_string())
    }
}
