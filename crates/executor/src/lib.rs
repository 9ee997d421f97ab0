//! # Tradebook Executor Crate
//!
//! This crate turns order requests into ledger entries. It owns the rules that
//! keep an account consistent: cash never goes negative, positions never go
//! short, and no limit order executes twice.
//!
//! ## Architectural Principles
//!
//! - **Derive, don't store:** Positions are recomputed from the trade log on
//!   every request (`portfolio`). There is no position table to drift.
//! - **Serialise per account:** Each read-validate-append sequence runs under
//!   that account's lock (`locks`), and the store applies it atomically with a
//!   compare-and-set on cash.
//! - **Quote outside the lock:** Oracle calls happen before the lock is taken.
//!
//! ## Public API
//!
//! - `ExecutionEngine`: market orders, commission, market-hours gate.
//! - `LimitOrderMatcher`: resting orders and the matching pass.
//! - `MarketCalendar`: the regular session of the exchange.
//! - `TradingContext`: the store, oracle, clock and policy shared by both paths.
//! - `ExecutorError`: the specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod alerts;
pub mod calendar;
pub mod engine;
pub mod error;
pub mod limit;
pub mod locks;
pub mod portfolio;

// Re-export the key components to provide a clean, public-facing API.
pub use calendar::{MarketCalendar, MarketStatus};
pub use engine::{ExecutionEngine, ExecutionResult, MarketHoursPolicy, TradingContext, TradingParams};
pub use error::ExecutorError;
pub use limit::LimitOrderMatcher;
pub use locks::AccountLocks;
pub use portfolio::{Holding, open_positions, owned_shares, positions};
