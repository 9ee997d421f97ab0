// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use error::ConfigError;
pub use logging::init_tracing;
pub use settings::{Config, Database, Logging, MarketHours, Oracle, StoreBackend, Trading};

const ENV_PREFIX: &str = "TRADEBOOK";

/// Loads the application configuration.
///
/// Sources, lowest precedence first: built-in defaults, an optional
/// `config.toml` in the working directory, `TRADEBOOK__SECTION__KEY`
/// environment variables and finally `DATABASE_URL`.
pub fn load_config() -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name("config.toml").required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let mut config = builder.try_deserialize::<Config>()?;
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database.url = Some(url);
    }

    config.validate()?;
    Ok(config)
}

/// Parses a TOML document into a validated `Config`, without consulting the environment.
pub fn config_from_toml(toml: &str) -> Result<Config, ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_document_yields_defaults() {
        let config = config_from_toml("").unwrap();
        assert_eq!(config.trading.starting_capital, dec!(10000));
        assert_eq!(config.trading.commission_pct, dec!(0.01));
        assert_eq!(config.trading.alert_threshold_pct, dec!(5));
        assert_eq!(config.market_hours.timezone, "America/New_York");
        assert!(config.market_hours.enforce);
        assert_eq!(config.oracle.timeout_secs, 5);
        assert_eq!(config.database.backend, StoreBackend::Memory);
    }

    #[test]
    fn sections_override_defaults() {
        let config = config_from_toml(
            r#"
            [trading]
            commission_pct = "0.005"

            [market_hours]
            timezone = "Europe/London"
            open = "08:00"
            close = "16:30"
            enforce = false

            [database]
            backend = "postgres"
            url = "postgres://localhost/tradebook"
            "#,
        )
        .unwrap();

        assert_eq!(config.trading.commission_pct, dec!(0.005));
        assert_eq!(config.trading.starting_capital, dec!(10000));
        assert!(!config.market_hours.enforce);
        assert_eq!(config.market_hours.tz().unwrap(), chrono_tz::Europe::London);
        assert_eq!(config.database.backend, StoreBackend::Postgres);
    }

    #[test]
    fn rejects_inverted_session() {
        let err = config_from_toml("[market_hours]\nopen = \"16:00\"\nclose = \"09:30\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_unknown_timezone() {
        let err = config_from_toml("[market_hours]\ntimezone = \"Mars/Olympus\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn rejects_full_commission() {
        let err = config_from_toml("[trading]\ncommission_pct = \"1\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn postgres_backend_requires_url() {
        let err = config_from_toml("[database]\nbackend = \"postgres\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
