use rust_decimal::Decimal;
use serde::Deserialize;

/// The body of `GET /quote`. Finnhub reports unknown symbols as a quote of
/// all zeroes rather than an error status.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteResponse {
    /// Current price.
    #[serde(default)]
    pub c: Option<Decimal>,
    /// Previous close.
    #[serde(default)]
    pub pc: Option<Decimal>,
    /// Unix timestamp of the quote.
    #[serde(default)]
    pub t: Option<i64>,
}

impl QuoteResponse {
    /// The usable current price, rounded to cents. Zero or missing means no data.
    pub fn current_price(&self) -> Option<Decimal> {
        self.c
            .filter(|price| *price > Decimal::ZERO)
            .map(|price| price.round_dp(2))
    }
}
