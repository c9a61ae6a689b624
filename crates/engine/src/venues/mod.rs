//! Public market-data REST adapters, one per venue.

pub mod binance;
pub mod bybit;

pub use binance::BinanceClient;
pub use bybit::BybitClient;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::debug;

use common::{CandleSource, Error, Result, SymbolSource, Venue};

/// Candle and symbol access for one venue, sharing a single HTTP client.
#[derive(Clone)]
pub struct VenueClients {
    pub candles: Arc<dyn CandleSource>,
    pub symbols: Arc<dyn SymbolSource>,
}

/// Build the public REST adapter for `venue`.
pub fn connect(venue: Venue, timeout: Duration) -> Result<VenueClients> {
    let http = http_client(timeout)?;
    Ok(match venue {
        Venue::Binance => {
            let client = Arc::new(BinanceClient::new(http));
            VenueClients {
                candles: client.clone(),
                symbols: client,
            }
        }
        Venue::Bybit => {
            let client = Arc::new(BybitClient::new(http));
            VenueClients {
                candles: client.clone(),
                symbols: client,
            }
        }
    })
}

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .use_rustls_tls()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Http(e.to_string()))
}

/// GET `url` and decode a JSON body, mapping non-2xx replies to `Error::Exchange`.
async fn get_json<T: DeserializeOwned>(http: &Client, url: &str) -> Result<T> {
    debug!(url = %url, "GET");
    let resp = http
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = resp.status();
    let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
    if !status.is_success() {
        return Err(Error::Exchange(format!("HTTP {status}: {body}")));
    }
    Ok(serde_json::from_str(&body)?)
}

/// Venues quote prices as JSON strings, sometimes as numbers.
fn number(value: &serde_json::Value) -> Result<f64> {
    match value {
        serde_json::Value::String(s) => s
            .parse()
            .map_err(|_| Error::Exchange(format!("bad number '{s}'"))),
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| Error::Exchange(format!("bad number {n}"))),
        other => Err(Error::Exchange(format!("expected number, got {other}"))),
    }
}

fn millis(value: &serde_json::Value) -> Result<chrono::DateTime<chrono::Utc>> {
    let ms = match value {
        serde_json::Value::String(s) => s.parse::<i64>().ok(),
        serde_json::Value::Number(n) => n.as_i64(),
        _ => None,
    }
    .ok_or_else(|| Error::Exchange(format!("bad timestamp {value}")))?;
    chrono::DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| Error::Exchange(format!("timestamp {ms} out of range")))
}

/// Sort `(symbol, volume)` pairs by descending volume and keep the first `limit`.
fn top_by_volume(mut pairs: Vec<(String, f64)>, limit: usize) -> Vec<String> {
    pairs.sort_by(|a, b| b.1.total_cmp(&a.1));
    pairs.into_iter().take(limit).map(|(s, _)| s).collect()
}
