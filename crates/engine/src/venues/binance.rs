use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use common::{Candle, CandleSource, Error, Result, SymbolSource, Timeframe, Venue};

use super::{get_json, millis, number, top_by_volume};

const BASE_URL: &str = "https://fapi.binance.com";
/// Largest page `/fapi/v1/klines` serves.
const MAX_KLINES: usize = 1500;

/// Public USDT-margined futures market data on Binance. No credentials needed.
pub struct BinanceClient {
    http: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }
}

/// Row layout: `[open_time, open, high, low, close, volume, close_time, ...]`.
fn parse_kline(row: &[Value]) -> Result<Candle> {
    if row.len() < 6 {
        return Err(Error::Exchange(format!("short kline row: {} fields", row.len())));
    }
    Ok(Candle {
        open_time: millis(&row[0])?,
        open: number(&row[1])?,
        high: number(&row[2])?,
        low: number(&row[3])?,
        close: number(&row[4])?,
        volume: number(&row[5])?,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    quote_volume: String,
}

fn usdt_pairs(tickers: Vec<Ticker24h>) -> Vec<(String, f64)> {
    tickers
        .into_iter()
        .filter(|t| t.symbol.ends_with("USDT"))
        .filter_map(|t| t.quote_volume.parse().ok().map(|v| (t.symbol, v)))
        .collect()
}

#[async_trait]
impl CandleSource for BinanceClient {
    fn venue(&self) -> Venue {
        Venue::Binance
    }

    async fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/fapi/v1/klines?symbol={symbol}&interval={}&limit={}",
            self.base_url,
            timeframe.as_str(),
            limit.min(MAX_KLINES)
        );
        let rows: Vec<Vec<Value>> = get_json(&self.http, &url).await?;
        rows.iter().map(|r| parse_kline(r)).collect()
    }
}

#[async_trait]
impl SymbolSource for BinanceClient {
    async fn top_symbols(&self, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/fapi/v1/ticker/24hr", self.base_url);
        let tickers: Vec<Ticker24h> = get_json(&self.http, &url).await?;
        Ok(top_by_volume(usdt_pairs(tickers), limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_kline_row() {
        let row = json!([
            1_704_067_200_000i64,
            "42000.1",
            "42100.0",
            "41950.5",
            "42050.0",
            "123.4",
            1_704_068_099_999i64,
            "5190000.0",
            1000,
            "60.0",
            "2520000.0",
            "0"
        ]);
        let candle = parse_kline(row.as_array().unwrap()).unwrap();
        assert_eq!(candle.open_time.timestamp(), 1_704_067_200);
        assert_eq!(candle.high, 42100.0);
        assert_eq!(candle.volume, 123.4);
    }

    #[test]
    fn rejects_short_row() {
        let row = json!([1_704_067_200_000i64, "1.0"]);
        assert!(parse_kline(row.as_array().unwrap()).is_err());
    }

    #[test]
    fn keeps_only_usdt_pairs() {
        let tickers: Vec<Ticker24h> = serde_json::from_value(json!([
            {"symbol": "BTCUSDT", "quoteVolume": "900", "lastPrice": "1"},
            {"symbol": "ETHBUSD", "quoteVolume": "5000"},
            {"symbol": "ETHUSDT", "quoteVolume": "1200"}
        ]))
        .unwrap();
        assert_eq!(top_by_volume(usdt_pairs(tickers), 10), vec!["ETHUSDT", "BTCUSDT"]);
    }
}
