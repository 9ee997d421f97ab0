use chrono::{DateTime, Utc};
use core_types::{AccountId, OrderSide, TradeId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Realized result of all trading in one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerPnl {
    pub ticker: String,
    pub buy_shares: i64,
    pub buy_total: Decimal,
    pub sell_shares: i64,
    pub sell_total: Decimal,
    /// `sell_total - buy_total`.
    pub pnl: Decimal,
    /// `pnl` relative to `buy_total`, in percent. `None` when nothing was bought.
    pub pnl_pct: Option<Decimal>,
    pub status: PositionStatus,
}

/// Account-level trading statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingStats {
    pub total_trades: usize,
    /// Tickers with sales whose sell total exceeds their buy total.
    pub wins: usize,
    pub losses: usize,
    /// `wins / (wins + losses) * 100`, zero when nothing was sold.
    pub win_rate_pct: Decimal,
    /// Largest positive per-ticker P&L, zero if none.
    pub biggest_gain: Decimal,
    /// Magnitude of the most negative per-ticker P&L, zero if none.
    pub biggest_loss: Decimal,
    pub most_traded_ticker: Option<String>,
    /// Sum of every trade total, buys and sells.
    pub total_volume: Decimal,
    pub total_invested: Decimal,
    pub total_returned: Decimal,
    pub net_pnl: Decimal,
    /// `net_pnl` relative to the starting capital, in percent.
    pub return_pct: Decimal,
}

impl TradingStats {
    pub fn empty() -> Self {
        Self {
            total_trades: 0,
            wins: 0,
            losses: 0,
            win_rate_pct: Decimal::ZERO,
            biggest_gain: Decimal::ZERO,
            biggest_loss: Decimal::ZERO,
            most_traded_ticker: None,
            total_volume: Decimal::ZERO,
            total_invested: Decimal::ZERO,
            total_returned: Decimal::ZERO,
            net_pnl: Decimal::ZERO,
            return_pct: Decimal::ZERO,
        }
    }
}

/// Mark-to-market view of one open position. When the oracle had no price
/// the position is marked at its average cost and `priced` is false.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnrealizedPosition {
    pub ticker: String,
    pub shares: i64,
    pub avg_cost: Decimal,
    pub mark_price: Decimal,
    pub priced: bool,
    pub position_value: Decimal,
    pub cost_basis: Decimal,
    pub unrealized_pnl: Decimal,
    /// Mark price relative to average cost, in percent.
    pub move_pct: Decimal,
    /// Share of the total marked position value, in percent.
    pub weight_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionValue {
    pub ticker: String,
    pub shares: i64,
    pub price: Option<Decimal>,
    /// `price * shares`, or zero when unpriced.
    pub market_value: Decimal,
    pub cost_basis: Decimal,
    pub profit_loss: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioValuation {
    pub cash: Decimal,
    pub positions: Vec<PositionValue>,
    pub positions_value: Decimal,
    pub total_value: Decimal,
    /// `total_value` minus the starting capital.
    pub profit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub account_id: AccountId,
    pub username: String,
    pub total_value: Decimal,
    pub profit: Decimal,
}

/// One row of an account's cash ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashMovement {
    pub trade_id: TradeId,
    pub executed_at: DateTime<Utc>,
    pub ticker: String,
    pub side: OrderSide,
    pub shares: i64,
    pub price: Decimal,
    pub amount: Decimal,
    pub cash_after: Decimal,
}
