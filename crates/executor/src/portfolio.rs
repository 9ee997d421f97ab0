use core_types::{OrderSide, Trade};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// The position in one ticker, derived from an account's trade log.
///
/// `cost_basis` is the net cash spent on the ticker (buy totals minus sell
/// totals). `bought_*` and `sold_*` are cumulative and survive a full close,
/// which is what realized P&L needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Holding {
    pub ticker: String,
    pub shares: i64,
    pub cost_basis: Decimal,
    pub bought_shares: i64,
    pub bought_cost: Decimal,
    pub sold_shares: i64,
    pub sold_proceeds: Decimal,
}

impl Holding {
    fn new(ticker: &str) -> Self {
        Self {
            ticker: ticker.to_string(),
            ..Self::default()
        }
    }

    /// Weighted average cost of every share ever bought, commission included.
    pub fn avg_cost(&self) -> Decimal {
        if self.bought_shares == 0 {
            return Decimal::ZERO;
        }
        self.bought_cost / Decimal::from(self.bought_shares)
    }

    pub fn is_open(&self) -> bool {
        self.shares > 0
    }

    fn apply(&mut self, trade: &Trade) {
        match trade.side {
            OrderSide::Buy => {
                self.shares += trade.shares;
                self.bought_shares += trade.shares;
                self.bought_cost += trade.total;
                self.cost_basis += trade.total;
            }
            OrderSide::Sell => {
                if trade.shares > self.shares {
                    tracing::warn!(
                        trade_id = trade.id,
                        ticker = %trade.ticker,
                        held = self.shares,
                        sold = trade.shares,
                        "Ignoring sell that would make the position negative"
                    );
                    return;
                }
                self.shares -= trade.shares;
                self.sold_shares += trade.shares;
                self.sold_proceeds += trade.total;
                self.cost_basis -= trade.total;
            }
        }
    }
}

/// Folds a trade log into per-ticker holdings, closed tickers included.
///
/// Trades are applied in ledger append order (`id`) regardless of the order
/// they are passed in.
pub fn positions(trades: &[Trade]) -> BTreeMap<String, Holding> {
    let mut ordered: Vec<&Trade> = trades.iter().collect();
    ordered.sort_by_key(|t| t.id);

    let mut holdings: BTreeMap<String, Holding> = BTreeMap::new();
    for trade in ordered {
        holdings
            .entry(trade.ticker.clone())
            .or_insert_with(|| Holding::new(&trade.ticker))
            .apply(trade);
    }
    holdings
}

/// Only the tickers currently held.
pub fn open_positions(trades: &[Trade]) -> BTreeMap<String, Holding> {
    positions(trades)
        .into_iter()
        .filter(|(_, holding)| holding.is_open())
        .collect()
}

/// Shares of `ticker` currently held.
pub fn owned_shares(trades: &[Trade], ticker: &str) -> i64 {
    positions(trades)
        .get(ticker)
        .map(|holding| holding.shares)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::TradeSource;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn trade(id: i64, ticker: &str, side: OrderSide, shares: i64, total: Decimal) -> Trade {
        Trade {
            id,
            account_id: 1,
            ticker: ticker.to_string(),
            side,
            shares,
            price: total / Decimal::from(shares),
            total,
            source: TradeSource::Market,
            executed_at: Utc.with_ymd_and_hms(2024, 3, 4, 15, 0, 0).unwrap()
                + Duration::seconds(id),
        }
    }

    #[test]
    fn test_buy_then_partial_sell() {
        let trades = vec![
            trade(1, "AAPL", OrderSide::Buy, 10, dec!(1010)),
            trade(2, "AAPL", OrderSide::Buy, 10, dec!(1212)),
            trade(3, "AAPL", OrderSide::Sell, 5, dec!(594)),
        ];
        let holding = &positions(&trades)["AAPL"];

        assert_eq!(holding.shares, 15);
        assert_eq!(holding.avg_cost(), dec!(111.1));
        assert_eq!(holding.cost_basis, dec!(1628));
        assert_eq!(holding.sold_proceeds, dec!(594));
    }

    #[test]
    fn test_closed_tickers_are_kept_but_not_open() {
        let trades = vec![
            trade(1, "AAPL", OrderSide::Buy, 10, dec!(1010)),
            trade(2, "AAPL", OrderSide::Sell, 10, dec!(1089)),
            trade(3, "MSFT", OrderSide::Buy, 1, dec!(400)),
        ];

        let all = positions(&trades);
        assert_eq!(all.len(), 2);
        assert_eq!(all["AAPL"].shares, 0);
        assert_eq!(all["AAPL"].cost_basis, dec!(-79));

        let open = open_positions(&trades);
        assert_eq!(open.keys().collect::<Vec<_>>(), vec!["MSFT"]);
    }

    #[test]
    fn test_trades_are_folded_in_append_order() {
        let trades = vec![
            trade(2, "AAPL", OrderSide::Sell, 10, dec!(1089)),
            trade(1, "AAPL", OrderSide::Buy, 10, dec!(1010)),
        ];
        assert_eq!(owned_shares(&trades, "AAPL"), 0);
        assert_eq!(positions(&trades)["AAPL"].sold_shares, 10);
    }

    #[test]
    fn test_oversell_is_ignored() {
        let trades = vec![
            trade(1, "AAPL", OrderSide::Buy, 3, dec!(300)),
            trade(2, "AAPL", OrderSide::Sell, 5, dec!(500)),
        ];
        assert_eq!(owned_shares(&trades, "AAPL"), 3);
        assert_eq!(owned_shares(&trades, "TSLA"), 0);
    }

    proptest! {
        #[test]
        fn prop_shares_never_negative(ops in prop::collection::vec((any::<bool>(), 1i64..50), 0..60)) {
            let trades: Vec<Trade> = ops
                .iter()
                .enumerate()
                .map(|(i, (is_buy, shares))| {
                    let side = if *is_buy { OrderSide::Buy } else { OrderSide::Sell };
                    trade(i as i64 + 1, "AAPL", side, *shares, Decimal::from(*shares) * dec!(10))
                })
                .collect();

            let holding = positions(&trades).remove("AAPL").unwrap_or_default();
            prop_assert!(holding.shares >= 0);
            prop_assert_eq!(holding.shares, holding.bought_shares - holding.sold_shares);
            prop_assert_eq!(holding.cost_basis, holding.bought_cost - holding.sold_proceeds);
        }
    }
}
