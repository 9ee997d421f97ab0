use crate::error::CoreError;

const MAX_TICKER_LEN: usize = 16;

/// Canonical form of a ticker symbol: trimmed and upper-cased.
///
/// Positions, orders and alerts are all keyed by ticker, so every entry point
/// normalises before touching the ledger.
pub fn normalize_ticker(raw: &str) -> Result<String, CoreError> {
    let ticker = raw.trim().to_ascii_uppercase();

    if ticker.is_empty() {
        return Err(CoreError::InvalidInput(
            "ticker".to_string(),
            "ticker must not be empty".to_string(),
        ));
    }
    if ticker.len() > MAX_TICKER_LEN {
        return Err(CoreError::InvalidInput(
            "ticker".to_string(),
            format!("'{ticker}' is longer than {MAX_TICKER_LEN} characters"),
        ));
    }
    if !ticker
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(CoreError::InvalidInput(
            "ticker".to_string(),
            format!("'{ticker}' contains unsupported characters"),
        ));
    }

    Ok(ticker)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_uppercases() {
        assert_eq!(normalize_ticker("  brk.b ").unwrap(), "BRK.B");
    }

    #[test]
    fn rejects_empty_and_garbage() {
        assert!(normalize_ticker("   ").is_err());
        assert!(normalize_ticker("AA PL").is_err());
        assert!(normalize_ticker("ABCDEFGHIJKLMNOPQ").is_err());
    }
}
