use async_trait::async_trait;
use configuration::Oracle;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

pub mod error;
pub mod responses;

// --- Public API ---
pub use error::ApiError;
pub use responses::QuoteResponse;

/// The abstract source of current stock prices.
///
/// `Ok(None)` means the provider answered but has no usable price for the
/// ticker. Callers on the execution paths treat errors the same way.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, ticker: &str) -> Result<Option<Decimal>, ApiError>;
}

/// A `PriceOracle` backed by the Finnhub `/quote` endpoint.
#[derive(Clone)]
pub struct FinnhubClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FinnhubClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(oracle: &Oracle) -> Result<Self, ApiError> {
        Self::new(
            &oracle.base_url,
            &oracle.api_key,
            Duration::from_secs(oracle.timeout_secs),
        )
    }

    /// Fetches the raw quote for a symbol.
    pub async fn fetch_quote(&self, ticker: &str) -> Result<QuoteResponse, ApiError> {
        let url = format!("{}/quote", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("symbol", ticker), ("token", self.api_key.as_str())])
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        serde_json::from_str::<QuoteResponse>(&text)
            .map_err(|e| ApiError::Deserialization(format!("{e}. Original text: {text}")))
    }
}

#[async_trait]
impl PriceOracle for FinnhubClient {
    async fn get_price(&self, ticker: &str) -> Result<Option<Decimal>, ApiError> {
        let quote = self.fetch_quote(ticker).await?;
        let price = quote.current_price();
        tracing::debug!(ticker, ?price, "Fetched quote");
        Ok(price)
    }
}

/// An in-process oracle with settable prices, for offline runs and tests.
#[derive(Debug, Default)]
pub struct StaticPriceOracle {
    prices: RwLock<HashMap<String, Decimal>>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl StaticPriceOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prices<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        let oracle = Self::new();
        for (ticker, price) in prices {
            oracle.set_price(ticker, price);
        }
        oracle
    }

    pub fn set_price(&self, ticker: impl Into<String>, price: Decimal) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.insert(ticker.into(), price);
    }

    pub fn remove_price(&self, ticker: &str) {
        let mut prices = self.prices.write().unwrap_or_else(|e| e.into_inner());
        prices.remove(ticker);
    }

    /// Makes every subsequent lookup fail as if the provider were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn get_price(&self, ticker: &str) -> Result<Option<Decimal>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                status: 503,
                body: "price oracle unavailable".to_string(),
            });
        }
        let prices = self.prices.read().unwrap_or_else(|e| e.into_inner());
        Ok(prices
            .get(ticker)
            .copied()
            .filter(|price| *price > Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> FinnhubClient {
        FinnhubClient::new(&server.uri(), "test-key", Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn returns_current_price_rounded_to_cents() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .and(query_param("symbol", "AAPL"))
            .and(query_param("token", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"c":187.456,"d":1.2,"dp":0.65,"h":188,"l":185,"o":186,"pc":186.25,"t":1709568000}"#,
            ))
            .mount(&server)
            .await;

        let price = client_for(&server).await.get_price("AAPL").await.unwrap();
        assert_eq!(price, Some(dec!(187.46)));
    }

    #[tokio::test]
    async fn zero_quote_means_no_price() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"c":0,"d":null,"dp":null,"h":0,"l":0,"o":0,"pc":0,"t":0}"#,
            ))
            .mount(&server)
            .await;

        let price = client_for(&server).await.get_price("NOPE").await.unwrap();
        assert_eq!(price, None);
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(429).set_body_string("API limit reached"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_price("AAPL").await.unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 429, .. }));
    }

    #[tokio::test]
    async fn malformed_body_is_a_deserialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/quote"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.get_price("AAPL").await.unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[tokio::test]
    async fn static_oracle_serves_and_fails_on_demand() {
        let oracle = StaticPriceOracle::with_prices([("MSFT", dec!(410.10))]);
        assert_eq!(oracle.get_price("MSFT").await.unwrap(), Some(dec!(410.10)));
        assert_eq!(oracle.get_price("AAPL").await.unwrap(), None);

        oracle.set_failing(true);
        assert!(oracle.get_price("MSFT").await.is_err());
        assert_eq!(oracle.calls(), 3);
    }
}
