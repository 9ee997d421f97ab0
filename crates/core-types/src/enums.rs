use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = CoreError;

    /// Accepts `buy`/`sell` in any letter case, which is how the API layer receives them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(OrderSide::Buy),
            "sell" => Ok(OrderSide::Sell),
            other => Err(CoreError::InvalidInput(
                "side".to_string(),
                format!("expected 'buy' or 'sell', got '{other}'"),
            )),
        }
    }
}

/// Lifecycle of a resting limit order. `Executed` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LimitOrderStatus {
    Pending,
    Executed,
    Cancelled,
}

impl LimitOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitOrderStatus::Pending => "pending",
            LimitOrderStatus::Executed => "executed",
            LimitOrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LimitOrderStatus::Pending)
    }
}

impl fmt::Display for LimitOrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitOrderStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(LimitOrderStatus::Pending),
            "executed" => Ok(LimitOrderStatus::Executed),
            "cancelled" => Ok(LimitOrderStatus::Cancelled),
            other => Err(CoreError::InvalidInput(
                "status".to_string(),
                format!("unknown limit order status '{other}'"),
            )),
        }
    }
}

/// Which execution path produced a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSource {
    Market,
    Limit,
}

impl TradeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSource::Market => "market",
            TradeSource::Limit => "limit",
        }
    }
}

impl FromStr for TradeSource {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "market" => Ok(TradeSource::Market),
            "limit" => Ok(TradeSource::Limit),
            other => Err(CoreError::InvalidInput(
                "source".to_string(),
                format!("unknown trade source '{other}'"),
            )),
        }
    }
}
