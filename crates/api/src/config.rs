//! Application configuration loaded from environment variables.

use std::time::Duration;

use common::CurrencyCode;
use services::shipping::VIACEP_BASE_URL;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `APP_ENV`: `development` exposes internal error messages in responses
/// - `LOG_FORMAT`: `pretty` (default) or `json`
/// - `DEFAULT_CURRENCY`: currency of new carts (default `BRL`)
/// - `PAYMENT_PROCESSING_DELAY_MS`: simulated gateway latency (default `500`)
/// - `PAYMENT_RNG_SEED`: seeds order references for reproducible runs
/// - `POSTAL_LOOKUP_URL`: ViaCEP-compatible endpoint
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub app_env: String,
    pub log_format: LogFormat,
    pub default_currency: CurrencyCode,
    pub payment_processing_delay: Duration,
    pub payment_rng_seed: Option<u64>,
    pub postal_lookup_url: String,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => defaults.log_format,
            Some(format) if format == "pretty" => LogFormat::Pretty,
            Some(format) if format == "json" => LogFormat::Json,
            Some(format) => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT",
                    value: format,
                });
            }
        };
        let default_currency = match var("DEFAULT_CURRENCY") {
            Some(code) => CurrencyCode::parse(&code).map_err(|_| ConfigError::Invalid {
                key: "DEFAULT_CURRENCY",
                value: code,
            })?,
            None => defaults.default_currency,
        };

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parse(&var, "PORT")?.unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            app_env: var("APP_ENV").unwrap_or(defaults.app_env),
            log_format,
            default_currency,
            payment_processing_delay: parse(&var, "PAYMENT_PROCESSING_DELAY_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.payment_processing_delay),
            payment_rng_seed: parse(&var, "PAYMENT_RNG_SEED")?,
            postal_lookup_url: var("POSTAL_LOOKUP_URL").unwrap_or(defaults.postal_lookup_url),
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }
}

fn parse<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    var(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid { key, value })
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            app_env: "production".to_string(),
            log_format: LogFormat::Pretty,
            default_currency: CurrencyCode::BRL,
            payment_processing_delay: Duration::from_millis(500),
            payment_rng_seed: None,
            postal_lookup_url: VIACEP_BASE_URL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert_eq!(config.default_currency, CurrencyCode::BRL);
        assert_eq!(config.payment_processing_delay, Duration::from_millis(500));
        assert!(config.payment_rng_seed.is_none());
        assert!(!config.is_development());
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("APP_ENV", "Development"),
            ("LOG_FORMAT", "JSON"),
            ("DEFAULT_CURRENCY", "usd"),
            ("PAYMENT_PROCESSING_DELAY_MS", "0"),
            ("PAYMENT_RNG_SEED", "42"),
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert!(config.is_development());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.default_currency.as_str(), "USD");
        assert!(config.payment_processing_delay.is_zero());
        assert_eq!(config.payment_rng_seed, Some(42));
    }

    #[test]
    fn test_invalid_values_are_reported() {
        assert_eq!(
            from_pairs(&[("PORT", "http")]).unwrap_err(),
            ConfigError::Invalid {
                key: "PORT",
                value: "http".to_string()
            }
        );
        assert!(from_pairs(&[("DEFAULT_CURRENCY", "REAL")]).is_err());
        assert!(from_pairs(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
