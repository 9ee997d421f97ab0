use chrono::NaiveTime;
use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
///
/// Every section is optional in `config.toml`; missing values fall back to the
/// defaults of a fresh paper-trading account on a US exchange.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub trading: Trading,
    #[serde(default)]
    pub market_hours: MarketHours,
    #[serde(default)]
    pub oracle: Oracle,
    #[serde(default)]
    pub database: Database,
    #[serde(default)]
    pub logging: Logging,
}

/// Money rules applied by the execution paths.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Trading {
    /// Cash credited to every newly registered account.
    pub starting_capital: Decimal,
    /// Commission charged on market orders. 0.01 corresponds to 1%.
    pub commission_pct: Decimal,
    /// Absolute price move, in percent, that raises a price alert.
    pub alert_threshold_pct: Decimal,
}

impl Default for Trading {
    fn default() -> Self {
        Self {
            starting_capital: dec!(10000.00),
            commission_pct: dec!(0.01),
            alert_threshold_pct: dec!(5),
        }
    }
}

/// Regular trading session of the exchange, in its civil timezone.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketHours {
    pub timezone: String,
    /// Session open, `HH:MM`, inclusive.
    pub open: String,
    /// Session close, `HH:MM`, exclusive.
    pub close: String,
    /// Initial value of the market-hours enforcement toggle.
    pub enforce: bool,
}

impl Default for MarketHours {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            open: "09:30".to_string(),
            close: "16:00".to_string(),
            enforce: true,
        }
    }
}

impl MarketHours {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::ValidationError(format!("unknown timezone '{}'", self.timezone))
        })
    }

    pub fn open_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_session_time("market_hours.open", &self.open)
    }

    pub fn close_time(&self) -> Result<NaiveTime, ConfigError> {
        parse_session_time("market_hours.close", &self.close)
    }
}

fn parse_session_time(field: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| {
        ConfigError::ValidationError(format!("{field} must be HH:MM, got '{value}': {e}"))
    })
}

/// Connection details for the quote provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Oracle {
    pub base_url: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for Oracle {
    fn default() -> Self {
        Self {
            base_url: "https://finnhub.io/api/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local ledger, lost on exit.
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Database {
    pub backend: StoreBackend,
    /// Postgres connection string. `DATABASE_URL` takes precedence when set.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Logging {
    /// Default `EnvFilter` directive; `RUST_LOG` wins when present.
    pub level: String,
    /// When set, a daily-rolling log file is written here as well.
    pub directory: Option<String>,
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Config {
    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.trading;
        if t.starting_capital <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "trading.starting_capital must be positive".to_string(),
            ));
        }
        if t.commission_pct < Decimal::ZERO || t.commission_pct >= Decimal::ONE {
            return Err(ConfigError::ValidationError(
                "trading.commission_pct must be in [0, 1)".to_string(),
            ));
        }
        if t.alert_threshold_pct <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(
                "trading.alert_threshold_pct must be positive".to_string(),
            ));
        }

        self.market_hours.tz()?;
        if self.market_hours.open_time()? >= self.market_hours.close_time()? {
            return Err(ConfigError::ValidationError(
                "market_hours.open must be earlier than market_hours.close".to_string(),
            ));
        }

        if self.oracle.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "oracle.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.database.backend == StoreBackend::Postgres && self.database.url.is_none() {
            return Err(ConfigError::ValidationError(
                "database.url (or DATABASE_URL) is required for the postgres backend".to_string(),
            ));
        }

        Ok(())
    }
}
