//! Shared vocabulary of the ledger: accounts, trades, limit orders and alerts,
//! plus the small helpers every other crate leans on (ticker normalisation, clocks).

pub mod clock;
pub mod enums;
pub mod error;
pub mod structs;
pub mod ticker;

// Re-export the core types to provide a clean public API.
pub use clock::{Clock, FixedClock, SystemClock};
pub use enums::{LimitOrderStatus, OrderSide, TradeSource};
pub use error::CoreError;
pub use structs::{
    Account, AccountId, AlertId, LimitOrder, NewLimitOrder, NewPriceAlert, NewTrade, OrderId,
    PriceAlert, Trade, TradeId,
};
pub use ticker::normalize_ticker;
