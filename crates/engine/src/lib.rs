//! # Tradebook Engine
//!
//! The brokerage facade. It wires the ledger store, the price oracle, the
//! executor and the analytics engine into one `Brokerage` that front ends
//! (the CLI today) drive.
//!
//! ## Public API
//!
//! - `Brokerage`: accounts, orders, reports, alerts and the market-hours toggle.
//! - `LimitOrderWatcher`: periodic driver for the limit-order matching pass.
//! - `BrokerageError`: the specific error types that can be returned from this crate.

pub mod accounts;
pub mod brokerage;
pub mod error;
pub mod watcher;

pub use brokerage::Brokerage;
pub use error::BrokerageError;
pub use watcher::LimitOrderWatcher;
