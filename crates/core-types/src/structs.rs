use crate::enums::{LimitOrderStatus, OrderSide, TradeSource};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub type AccountId = i64;
pub type TradeId = i64;
pub type OrderId = i64;
pub type AlertId = i64;

/// A brokerage account. Cash is only ever changed together with a trade append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub cash: Decimal,
    pub created_at: DateTime<Utc>,
}

/// An executed trade as it is about to be appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
    pub account_id: AccountId,
    pub ticker: String,
    pub side: OrderSide,
    pub shares: i64,
    pub price: Decimal,
    /// Gross cash moved: cost including commission for buys, proceeds net of commission for sells.
    pub total: Decimal,
    pub source: TradeSource,
    pub executed_at: DateTime<Utc>,
}

/// An immutable ledger entry. The ordered trade log of an account is the single
/// source of truth for its positions and P&L.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub account_id: AccountId,
    pub ticker: String,
    pub side: OrderSide,
    pub shares: i64,
    pub price: Decimal,
    pub total: Decimal,
    pub source: TradeSource,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    pub fn from_new(id: TradeId, new: NewTrade) -> Self {
        Self {
            id,
            account_id: new.account_id,
            ticker: new.ticker,
            side: new.side,
            shares: new.shares,
            price: new.price,
            total: new.total,
            source: new.source,
            executed_at: new.executed_at,
        }
    }

    /// Share delta this trade applies to its ticker's position.
    pub fn signed_shares(&self) -> i64 {
        match self.side {
            OrderSide::Buy => self.shares,
            OrderSide::Sell => -self.shares,
        }
    }

    /// Cash delta this trade applied to the account.
    pub fn cash_delta(&self) -> Decimal {
        match self.side {
            OrderSide::Buy => -self.total,
            OrderSide::Sell => self.total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLimitOrder {
    pub account_id: AccountId,
    pub ticker: String,
    pub side: OrderSide,
    pub shares: i64,
    pub limit_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A standing instruction to trade once the quoted price reaches `limit_price` or better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrder {
    pub id: OrderId,
    pub account_id: AccountId,
    pub ticker: String,
    pub side: OrderSide,
    pub shares: i64,
    pub limit_price: Decimal,
    pub status: LimitOrderStatus,
    pub created_at: DateTime<Utc>,
    pub executed_at: Option<DateTime<Utc>>,
}

impl LimitOrder {
    pub fn from_new(id: OrderId, new: NewLimitOrder) -> Self {
        Self {
            id,
            account_id: new.account_id,
            ticker: new.ticker,
            side: new.side,
            shares: new.shares,
            limit_price: new.limit_price,
            status: LimitOrderStatus::Pending,
            created_at: new.created_at,
            executed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == LimitOrderStatus::Pending
    }

    /// Buy orders trigger at or below the limit, sell orders at or above it.
    pub fn is_triggered_by(&self, price: Decimal) -> bool {
        match self.side {
            OrderSide::Buy => price <= self.limit_price,
            OrderSide::Sell => price >= self.limit_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPriceAlert {
    pub account_id: AccountId,
    pub ticker: String,
    pub original_price: Decimal,
    pub current_price: Decimal,
    pub change_percent: Decimal,
    pub triggered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceAlert {
    pub id: AlertId,
    pub account_id: AccountId,
    pub ticker: String,
    pub original_price: Decimal,
    pub current_price: Decimal,
    pub change_percent: Decimal,
    pub triggered_at: DateTime<Utc>,
    pub read: bool,
}

impl PriceAlert {
    pub fn from_new(id: AlertId, new: NewPriceAlert) -> Self {
        Self {
            id,
            account_id: new.account_id,
            ticker: new.ticker,
            original_price: new.original_price,
            current_price: new.current_price,
            change_percent: new.change_percent,
            triggered_at: new.triggered_at,
            read: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn order(side: OrderSide, limit_price: Decimal) -> LimitOrder {
        LimitOrder::from_new(
            1,
            NewLimitOrder {
                account_id: 7,
                ticker: "AAPL".to_string(),
                side,
                shares: 5,
                limit_price,
                created_at: Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap(),
            },
        )
    }

    #[test]
    fn new_limit_orders_start_pending() {
        let order = order(OrderSide::Buy, dec!(50));
        assert!(order.is_pending());
        assert!(order.executed_at.is_none());
    }

    #[test]
    fn buy_limit_triggers_at_or_below_limit() {
        let order = order(OrderSide::Buy, dec!(50));
        assert!(order.is_triggered_by(dec!(49)));
        assert!(order.is_triggered_by(dec!(50)));
        assert!(!order.is_triggered_by(dec!(50.01)));
    }

    #[test]
    fn sell_limit_triggers_at_or_above_limit() {
        let order = order(OrderSide::Sell, dec!(50));
        assert!(order.is_triggered_by(dec!(50)));
        assert!(order.is_triggered_by(dec!(61.5)));
        assert!(!order.is_triggered_by(dec!(49.99)));
    }

    #[test]
    fn trade_deltas_follow_side() {
        let buy = Trade::from_new(
            1,
            NewTrade {
                account_id: 1,
                ticker: "MSFT".to_string(),
                side: OrderSide::Buy,
                shares: 10,
                price: dec!(100),
                total: dec!(1010),
                source: TradeSource::Market,
                executed_at: Utc::now(),
            },
        );
        assert_eq!(buy.signed_shares(), 10);
        assert_eq!(buy.cash_delta(), dec!(-1010));

        let sell = Trade { side: OrderSide::Sell, total: dec!(1089), ..buy };
        assert_eq!(sell.signed_shares(), -10);
        assert_eq!(sell.cash_delta(), dec!(1089));
    }
}
