use thiserror::Error;

use crate::{Timeframe, Venue};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Exchange API error: {0}")]
    Exchange(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid {timeframe} series for {symbol}: {reason}")]
    InvalidSeries {
        symbol: String,
        timeframe: Timeframe,
        reason: String,
    },

    #[error("Unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Timed out fetching {timeframe} candles for {symbol}")]
    Timeout { symbol: String, timeframe: Timeframe },

    #[error("Venue {venue} unreachable: all {failed} symbol fetches failed")]
    VenueUnreachable { venue: Venue, failed: usize },

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
