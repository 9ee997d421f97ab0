use crate::error::AnalyticsError;
use crate::report::{
    CashMovement, LeaderboardEntry, PortfolioValuation, PositionStatus, PositionValue, TickerPnl,
    TradingStats, UnrealizedPosition,
};
use core_types::{AccountId, OrderSide, Trade};
use executor::{Holding, positions};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};

/// A stateless calculator for deriving account analytics from the trade log.
///
/// Nothing is cached: every report is recomputed from the trades and prices
/// passed in.
#[derive(Debug, Default)]
pub struct AnalyticsEngine {}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-ticker realized P&L, including tickers that are still open.
    pub fn realized_pnl(&self, trades: &[Trade]) -> Vec<TickerPnl> {
        positions(trades)
            .into_values()
            .map(|holding| {
                let pnl = holding.sold_proceeds - holding.bought_cost;
                let pnl_pct = (!holding.bought_cost.is_zero())
                    .then(|| (pnl / holding.bought_cost * Decimal::ONE_HUNDRED).round_dp(2));
                TickerPnl {
                    status: if holding.is_open() {
                        PositionStatus::Open
                    } else {
                        PositionStatus::Closed
                    },
                    ticker: holding.ticker,
                    buy_shares: holding.bought_shares,
                    buy_total: holding.bought_cost,
                    sell_shares: holding.sold_shares,
                    sell_total: holding.sold_proceeds,
                    pnl,
                    pnl_pct,
                }
            })
            .collect()
    }

    pub fn trading_stats(&self, trades: &[Trade], starting_capital: Decimal) -> TradingStats {
        if trades.is_empty() {
            return TradingStats::empty();
        }

        let mut stats = TradingStats::empty();
        stats.total_trades = trades.len();

        // Only tickers with at least one sale count as a win or a loss.
        for ticker in self.realized_pnl(trades) {
            if ticker.sell_total <= Decimal::ZERO {
                continue;
            }
            if ticker.sell_total > ticker.buy_total {
                stats.wins += 1;
                stats.biggest_gain = stats.biggest_gain.max(ticker.pnl);
            } else {
                stats.losses += 1;
                stats.biggest_loss = stats.biggest_loss.max(-ticker.pnl);
            }
        }
        let decided = stats.wins + stats.losses;
        if decided > 0 {
            stats.win_rate_pct = (Decimal::from(stats.wins) / Decimal::from(decided)
                * Decimal::ONE_HUNDRED)
                .round_dp(2);
        }

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for trade in trades {
            *counts.entry(trade.ticker.as_str()).or_default() += 1;
            stats.total_volume += trade.total;
            match trade.side {
                OrderSide::Buy => stats.total_invested += trade.total,
                OrderSide::Sell => stats.total_returned += trade.total,
            }
        }
        // Ties go to the alphabetically first ticker.
        stats.most_traded_ticker = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(ticker, _)| ticker.to_string());

        stats.net_pnl = stats.total_returned - stats.total_invested;
        if starting_capital > Decimal::ZERO {
            stats.return_pct = (stats.net_pnl / starting_capital * Decimal::ONE_HUNDRED).round_dp(2);
        }
        stats
    }

    /// Marks open positions to market, falling back to average cost for
    /// tickers without a price.
    pub fn unrealized(
        &self,
        holdings: &BTreeMap<String, Holding>,
        prices: &HashMap<String, Decimal>,
    ) -> Result<Vec<UnrealizedPosition>, AnalyticsError> {
        let mut marked = Vec::new();
        for holding in holdings.values().filter(|h| h.is_open()) {
            let price = checked_price(&holding.ticker, prices)?;
            let avg_cost = holding.avg_cost();
            let mark_price = price.unwrap_or(avg_cost);
            let position_value = value_of(mark_price, holding.shares)?;
            let move_pct = if avg_cost > Decimal::ZERO {
                ((mark_price - avg_cost) / avg_cost * Decimal::ONE_HUNDRED).round_dp(2)
            } else {
                Decimal::ZERO
            };
            marked.push(UnrealizedPosition {
                ticker: holding.ticker.clone(),
                shares: holding.shares,
                avg_cost,
                mark_price,
                priced: price.is_some(),
                position_value,
                cost_basis: holding.cost_basis,
                unrealized_pnl: position_value - holding.cost_basis,
                move_pct,
                weight_pct: Decimal::ZERO,
            });
        }

        let total: Decimal = marked.iter().map(|p| p.position_value).sum();
        if total > Decimal::ZERO {
            for position in &mut marked {
                position.weight_pct =
                    (position.position_value / total * Decimal::ONE_HUNDRED).round_dp(2);
            }
        }
        Ok(marked)
    }

    /// Cash plus open positions at current prices. A ticker without a price
    /// contributes nothing to the total.
    pub fn portfolio_valuation(
        &self,
        cash: Decimal,
        holdings: &BTreeMap<String, Holding>,
        prices: &HashMap<String, Decimal>,
        starting_capital: Decimal,
    ) -> Result<PortfolioValuation, AnalyticsError> {
        let mut positions = Vec::new();
        let mut positions_value = Decimal::ZERO;
        for holding in holdings.values().filter(|h| h.is_open()) {
            let price = checked_price(&holding.ticker, prices)?;
            let market_value = match price {
                Some(price) => value_of(price, holding.shares)?,
                None => {
                    tracing::debug!(ticker = %holding.ticker, "No price, position valued at zero");
                    Decimal::ZERO
                }
            };
            positions_value += market_value;
            positions.push(PositionValue {
                ticker: holding.ticker.clone(),
                shares: holding.shares,
                price,
                market_value,
                cost_basis: holding.cost_basis,
                profit_loss: market_value - holding.cost_basis,
            });
        }

        let total_value = cash + positions_value;
        Ok(PortfolioValuation {
            cash,
            positions,
            positions_value,
            total_value,
            profit: total_value - starting_capital,
        })
    }

    /// Ranks accounts by total value, highest first; ties go to the lower account id.
    pub fn leaderboard(
        &self,
        valuations: Vec<(AccountId, String, PortfolioValuation)>,
    ) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = valuations
            .into_iter()
            .map(|(account_id, username, valuation)| LeaderboardEntry {
                rank: 0,
                account_id,
                username,
                total_value: valuation.total_value,
                profit: valuation.profit,
            })
            .collect();
        entries.sort_by(|a, b| {
            b.total_value
                .cmp(&a.total_value)
                .then_with(|| a.account_id.cmp(&b.account_id))
        });
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.rank = i + 1;
        }
        entries
    }

    /// Running cash after every trade, oldest first.
    pub fn cash_history(&self, trades: &[Trade], starting_cash: Decimal) -> Vec<CashMovement> {
        let mut ordered: Vec<&Trade> = trades.iter().collect();
        ordered.sort_by_key(|t| t.id);

        let mut cash = starting_cash;
        ordered
            .into_iter()
            .map(|trade| {
                cash += trade.cash_delta();
                CashMovement {
                    trade_id: trade.id,
                    executed_at: trade.executed_at,
                    ticker: trade.ticker.clone(),
                    side: trade.side,
                    shares: trade.shares,
                    price: trade.price,
                    amount: trade.total,
                    cash_after: cash,
                }
            })
            .collect()
    }
}

fn checked_price(
    ticker: &str,
    prices: &HashMap<String, Decimal>,
) -> Result<Option<Decimal>, AnalyticsError> {
    match prices.get(ticker) {
        Some(&price) if price <= Decimal::ZERO => Err(AnalyticsError::InvalidPrice {
            ticker: ticker.to_string(),
            price,
        }),
        other => Ok(other.copied()),
    }
}

fn value_of(price: Decimal, shares: i64) -> Result<Decimal, AnalyticsError> {
    price
        .checked_mul(Decimal::from(shares))
        .ok_or_else(|| AnalyticsError::Calculation(format!("{price} x {shares} overflows")))
}
