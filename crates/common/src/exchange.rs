use async_trait::async_trait;

use crate::{Candle, Result, Timeframe, Venue};

/// Read-only access to historical OHLCV data on one venue.
///
/// The REST clients in `crates/engine` implement this. Implementations
/// must be stateless per request: the scanner shares one handle across all
/// concurrent symbol tasks.
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// The venue this source reads from.
    fn venue(&self) -> Venue;

    /// Fetch up to `limit` most recent candles, oldest first.
    ///
    /// Callers validate ordering themselves; a non-ascending response is
    /// treated as a failed fetch.
    async fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>>;
}

/// Lists the tradable universe of a venue, most liquid first.
#[async_trait]
pub trait SymbolSource: Send + Sync {
    async fn top_symbols(&self, limit: usize) -> Result<Vec<String>>;
}
