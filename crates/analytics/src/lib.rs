//! # Tradebook Analytics Engine
//!
//! Read-side derivations over an account's trade log: realized and unrealized
//! P&L, win rate, portfolio valuation and weights, the leaderboard and the
//! running cash ledger.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** No I/O. Callers fetch trades and prices and pass them in.
//! - **Stateless Calculation:** The `AnalyticsEngine` keeps nothing between calls.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: The main struct that contains the calculation logic.
//! - `report`: The serializable structs it produces.
//! - `AnalyticsError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod engine;
pub mod error;
pub mod report;

// Re-export the key components to create a clean, public-facing API.
pub use engine::AnalyticsEngine;
pub use error::AnalyticsError;
pub use report::{
    CashMovement, LeaderboardEntry, PortfolioValuation, PositionStatus, PositionValue, TickerPnl,
    TradingStats, UnrealizedPosition,
};
