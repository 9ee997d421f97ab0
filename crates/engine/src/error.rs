use core_types::{AccountId, AlertId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerageError {
    #[error("Invalid username or password")]
    Auth,

    #[error("Username '{0}' is already taken")]
    UsernameTaken(String),

    #[error("Invalid registration: {0}")]
    InvalidCredentials(String),

    #[error("Account {0} not found")]
    AccountNotFound(AccountId),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Alert {0} not found")]
    AlertNotFound(AlertId),

    #[error("Configuration error: {0}")]
    Configuration(#[from] configuration::ConfigError),

    #[error(transparent)]
    Executor(#[from] executor::ExecutorError),

    #[error("Database error: {0}")]
    Database(#[from] database::DbError),

    #[error("Analytics error: {0}")]
    Analytics(#[from] analytics::AnalyticsError),

    #[error(transparent)]
    Core(#[from] core_types::CoreError),
}
