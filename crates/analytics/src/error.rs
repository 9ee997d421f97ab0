use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum AnalyticsError {
    #[error("Price for {ticker} must be positive, got {price}")]
    InvalidPrice { ticker: String, price: Decimal },

    #[error("Error in calculation: {0}")]
    Calculation(String),
}
