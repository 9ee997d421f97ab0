use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid database connection settings: {0}")]
    ConnectionConfigError(String),

    #[error("Database operation failed: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("The requested data was not found in the database.")]
    NotFound,

    /// A write lost a race: a unique key was taken or the row changed since it was read.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    #[error("Stored data is corrupt: {0}")]
    Corrupt(String),
}
