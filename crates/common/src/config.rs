use std::str::FromStr;

use crate::{Error, Result, Venue};

/// All process configuration, loaded from environment variables at startup.
/// Every variable is optional; a value that is present but malformed is an error.
#[derive(Debug, Clone)]
pub struct Config {
    // Scan
    pub venue: Venue,
    pub top_n: usize,
    pub candle_limit: usize,
    pub use_rsi: bool,
    pub use_adx: bool,
    pub only_pulse: bool,

    /// Rule-list TOML file. When unset the fixed trend stack is used.
    pub rules_path: Option<String>,

    // Cache
    pub cache_ttl_secs: u64,

    // Backtest
    pub backtest_base_limit: usize,
    pub backtest_initial_balance: f64,
}

impl Config {
    /// Load configuration from the environment, reading `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        Ok(Config {
            venue: parsed_env("SCAN_VENUE")?.unwrap_or(Venue::Binance),
            top_n: parsed_env("SCAN_TOP_N")?.unwrap_or(75),
            candle_limit: parsed_env("SCAN_CANDLE_LIMIT")?.unwrap_or(150),
            use_rsi: bool_env("SCAN_USE_RSI")?.unwrap_or(false),
            use_adx: bool_env("SCAN_USE_ADX")?.unwrap_or(false),
            only_pulse: bool_env("SCAN_ONLY_PULSE")?.unwrap_or(false),
            rules_path: optional_env("SCAN_RULES_PATH"),
            cache_ttl_secs: parsed_env("SCAN_CACHE_TTL_SECS")?.unwrap_or(300),
            backtest_base_limit: parsed_env("BACKTEST_BASE_LIMIT")?.unwrap_or(1000),
            backtest_initial_balance: parsed_env("BACKTEST_INITIAL_BALANCE")?.unwrap_or(10_000.0),
        })
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    optional_env(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| Error::Config(format!("{key}='{raw}': {e}")))
        })
        .transpose()
}

fn bool_env(key: &str) -> Result<Option<bool>> {
    optional_env(key)
        .map(|raw| parse_bool(&raw).ok_or_else(|| Error::Config(format!("{key} must be a boolean, got '{raw}'"))))
        .transpose()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_accepts_common_spellings() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
