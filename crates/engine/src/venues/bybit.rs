use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use common::{Candle, CandleSource, Error, Result, SymbolSource, Timeframe, Venue};

use super::{get_json, millis, number, top_by_volume};

const BASE_URL: &str = "https://api.bybit.com";
/// Largest page `/v5/market/kline` serves.
const MAX_KLINES: usize = 1000;

/// Public linear-perpetual market data on Bybit (v5 API).
pub struct BybitClient {
    http: Client,
    base_url: String,
}

impl BybitClient {
    pub fn new(http: Client) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
        }
    }
}

fn interval(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1",
        Timeframe::M5 => "5",
        Timeframe::M15 => "15",
        Timeframe::M30 => "30",
        Timeframe::H1 => "60",
        Timeframe::H4 => "240",
        Timeframe::D1 => "D",
    }
}

/// Every v5 reply wraps its payload with a return code. Error replies carry
/// an empty `result` object, so the payload is only decoded once `retCode` is 0.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope {
    ret_code: i64,
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

impl Envelope {
    fn into_result<T: DeserializeOwned>(self) -> Result<T> {
        if self.ret_code != 0 {
            return Err(Error::Exchange(format!(
                "bybit retCode {}: {}",
                self.ret_code, self.ret_msg
            )));
        }
        if self.result.is_null() {
            return Err(Error::Exchange("bybit reply without result".into()));
        }
        Ok(serde_json::from_value(self.result)?)
    }
}

#[derive(Debug, Deserialize)]
struct KlineList {
    list: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct TickerList {
    list: Vec<Ticker>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker {
    symbol: String,
    #[serde(rename = "turnover24h")]
    turnover_24h: String,
}

/// Bybit lists klines newest first; the result is reversed to oldest first.
fn parse_klines(list: KlineList) -> Result<Vec<Candle>> {
    let mut candles = list
        .list
        .iter()
        .map(|row| {
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
        })
        .collect::<Result<Vec<_>>>()?;
    candles.reverse();
    Ok(candles)
}

#[async_trait]
impl CandleSource for BybitClient {
    fn venue(&self) -> Venue {
        Venue::Bybit
    }

    async fn fetch(&self, symbol: &str, timeframe: Timeframe, limit: usize) -> Result<Vec<Candle>> {
        let url = format!(
            "{}/v5/market/kline?category=linear&symbol={symbol}&interval={}&limit={}",
            self.base_url,
            interval(timeframe),
            limit.min(MAX_KLINES)
        );
        let reply: Envelope = get_json(&self.http, &url).await?;
        parse_klines(reply.into_result()?)
    }
}

#[async_trait]
impl SymbolSource for BybitClient {
    async fn top_symbols(&self, limit: usize) -> Result<Vec<String>> {
        let url = format!("{}/v5/market/tickers?category=linear", self.base_url);
        let reply: Envelope = get_json(&self.http, &url).await?;
        let tickers: TickerList = reply.into_result()?;
        let pairs = tickers
            .list
            .into_iter()
            .filter(|t| t.symbol.ends_with("USDT"))
            .filter_map(|t| t.turnover_24h.parse().ok().map(|v| (t.symbol, v)))
            .collect();
        Ok(top_by_volume(pairs, limit))
    }
}
