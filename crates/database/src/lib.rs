//! # Tradebook Database Crate
//!
//! This crate is the ledger's "permanent archive": accounts, the append-only
//! trade log, limit orders and price alerts.
//!
//! ## Architectural Principles
//!
//! - **Adapter behind a trait:** Callers only see [`LedgerStore`]. The Postgres
//!   implementation and the in-memory one are interchangeable.
//! - **Atomic writes:** Every operation that moves cash also appends the trade
//!   that explains it, in one transaction, compare-and-set on the cash read.
//! - **Asynchronous & Pooled:** The Postgres backend uses a connection pool
//!   (`PgPool`) for concurrent access.
//!
//! ## Public API
//!
//! - `connect` / `run_migrations`: open the pool and bring the schema up to date.
//! - `LedgerStore`: the storage interface used by the execution paths.
//! - `PgLedger` / `InMemoryLedger`: the two backends.
//! - `DbError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod memory;
pub mod repository;
pub mod store;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use memory::InMemoryLedger;
pub use repository::PgLedger;
pub use store::LedgerStore;
