use chrono::{DateTime, Utc};
use core_types::{AccountId, NewPriceAlert, Trade};
use rust_decimal::Decimal;

/// Compares an execution price with the account's previous trade of the same
/// ticker and builds an alert when the move reaches `threshold_pct` either way.
///
/// `previous` must be read before the new trade is appended.
pub fn evaluate_price_move(
    account_id: AccountId,
    ticker: &str,
    previous: Option<&Trade>,
    price: Decimal,
    threshold_pct: Decimal,
    now: DateTime<Utc>,
) -> Option<NewPriceAlert> {
    let original = previous?.price;
    if original <= Decimal::ZERO {
        return None;
    }

    let change = (price - original) / original * Decimal::ONE_HUNDRED;
    if change.abs() < threshold_pct {
        return None;
    }

    Some(NewPriceAlert {
        account_id,
        ticker: ticker.to_string(),
        original_price: original,
        current_price: price,
        change_percent: change.round_dp(2),
        triggered_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{OrderSide, TradeSource};
    use rust_decimal_macros::dec;

    fn previous(price: Decimal) -> Trade {
        Trade {
            id: 1,
            account_id: 1,
            ticker: "AAPL".to_string(),
            side: OrderSide::Buy,
            shares: 1,
            price,
            total: price,
            source: TradeSource::Market,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn test_first_trade_never_alerts() {
        assert!(evaluate_price_move(1, "AAPL", None, dec!(100), dec!(5), Utc::now()).is_none());
    }

    #[test]
    fn test_threshold_is_inclusive_both_ways() {
        let prev = previous(dec!(100));
        let up = evaluate_price_move(1, "AAPL", Some(&prev), dec!(105), dec!(5), Utc::now()).unwrap();
        assert_eq!(up.change_percent, dec!(5));
        assert_eq!(up.original_price, dec!(100));

        let down = evaluate_price_move(1, "AAPL", Some(&prev), dec!(95), dec!(5), Utc::now()).unwrap();
        assert_eq!(down.change_percent, dec!(-5));
    }

    #[test]
    fn test_small_moves_are_ignored() {
        let prev = previous(dec!(100));
        assert!(evaluate_price_move(1, "AAPL", Some(&prev), dec!(104.99), dec!(5), Utc::now()).is_none());
    }
}
