use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One OHLCV bar. `open_time` marks the start of the bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Why this bar is malformed, if it is.
    fn defect(&self) -> Option<&'static str> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Some("non-finite field");
        }
        if self.high < self.open.max(self.close) {
            return Some("high below open/close");
        }
        if self.low > self.open.min(self.close) {
            return Some("low above open/close");
        }
        if self.volume < 0.0 {
            return Some("negative volume");
        }
        None
    }
}

/// Bar interval of a candle series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Timeframe {
    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "1m" => Ok(Timeframe::M1),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "4h" => Ok(Timeframe::H4),
            "1d" => Ok(Timeframe::D1),
            other => Err(Error::Config(format!("unknown timeframe '{other}'"))),
        }
    }
}

/// An immutable, validated run of candles for one (symbol, timeframe) pair.
///
/// Construction checks every bar and rejects anything that is not strictly
/// ascending by `open_time`. Sources are never re-sorted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    symbol: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(symbol: impl Into<String>, timeframe: Timeframe, candles: Vec<Candle>) -> Result<Self> {
        let symbol = symbol.into();
        let invalid = |reason: String| Error::InvalidSeries {
            symbol: symbol.clone(),
            timeframe,
            reason,
        };

        for (i, candle) in candles.iter().enumerate() {
            if let Some(defect) = candle.defect() {
                return Err(invalid(format!("candle {i}: {defect}")));
            }
        }
        if let Some(i) = candles
            .windows(2)
            .position(|w| w[1].open_time <= w[0].open_time)
        {
            return Err(invalid(format!(
                "open time not strictly ascending at index {}",
                i + 1
            )));
        }

        Ok(Self {
            symbol,
            timeframe,
            candles,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }
}

/// Exchange the scan runs against. Each venue has its own throughput budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Binance,
    Bybit,
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::Binance => write!(f, "binance"),
            Venue::Bybit => write!(f, "bybit"),
        }
    }
}

impl FromStr for Venue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Ok(Venue::Binance),
            "bybit" => Ok(Venue::Bybit),
            other => Err(Error::Config(format!(
                "venue must be 'binance' or 'bybit', got '{other}'"
            ))),
        }
    }
}

/// Direction of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Long,
    Short,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Side inferred by a strategy. `Neutral` means no trend was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Long,
    Short,
    #[default]
    Neutral,
}

impl Bias {
    pub fn side(self) -> Option<Side> {
        match self {
            Bias::Long => Some(Side::Long),
            Bias::Short => Some(Side::Short),
            Bias::Neutral => None,
        }
    }
}

impl From<Side> for Bias {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => Bias::Long,
            Side::Short => Bias::Short,
        }
    }
}

impl std::fmt::Display for Bias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Bias::Long => write!(f, "LONG"),
            Bias::Short => write!(f, "SHORT"),
            Bias::Neutral => write!(f, "NEUTRAL"),
        }
    }
}

/// Shape of a passing trend-stack setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SetupType {
    /// Price has pulled back through its own EMA21, against the trade direction.
    Pulse,
    Momentum,
}

/// One named pass/fail check inside a scan result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
}

impl Check {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
        }
    }
}

/// Outcome of evaluating one symbol with one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub symbol: String,
    pub side: Bias,
    pub checks: Vec<Check>,
    /// Latest base-timeframe close.
    pub price: f64,
    pub rsi: Option<f64>,
    pub adx: Option<f64>,
    pub setup: Option<SetupType>,
    /// Indicator values the strategy read, keyed by label (e.g. `RVOL(30)`).
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
    pub pass: bool,
}

impl ScanResult {
    pub fn new(symbol: impl Into<String>, price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            side: Bias::Neutral,
            checks: Vec::new(),
            price,
            rsi: None,
            adx: None,
            setup: None,
            indicators: BTreeMap::new(),
            pass: false,
        }
    }

    pub fn check(&self, name: &str) -> Option<bool> {
        self.checks.iter().find(|c| c.name == name).map(|c| c.passed)
    }
}

/// Round to two decimals, as reported in scan snapshots.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn candle(minute: i64, close: f64) -> Candle {
        Candle {
            open_time: Utc.timestamp_opt(1_700_000_000 + minute * 60, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
        }
    }

    #[test]
    fn series_accepts_ascending_candles() {
        let series = CandleSeries::new("BTCUSDT", Timeframe::M15, vec![candle(0, 1.0), candle(15, 2.0)])
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![1.0, 2.0]);
    }

    #[test]
    fn series_rejects_duplicate_open_time() {
        let err = CandleSeries::new("BTCUSDT", Timeframe::M15, vec![candle(0, 1.0), candle(0, 2.0)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidSeries { .. }), "got {err}");
    }

    #[test]
    fn series_rejects_descending_candles() {
        let result = CandleSeries::new("BTCUSDT", Timeframe::M15, vec![candle(15, 1.0), candle(0, 2.0)]);
        assert!(result.is_err());
    }

    #[test]
    fn series_rejects_high_below_close() {
        let mut bad = candle(0, 10.0);
        bad.high = 9.0;
        assert!(CandleSeries::new("X", Timeframe::H1, vec![bad]).is_err());
    }

    #[test]
    fn series_rejects_negative_volume() {
        let mut bad = candle(0, 10.0);
        bad.volume = -1.0;
        assert!(CandleSeries::new("X", Timeframe::H1, vec![bad]).is_err());
    }

    #[test]
    fn timeframe_parses_and_displays() {
        assert_eq!("4h".parse::<Timeframe>().unwrap(), Timeframe::H4);
        assert_eq!(Timeframe::M15.to_string(), "15m");
        assert_eq!(Timeframe::H4.duration(), Duration::hours(4));
        assert!("2h".parse::<Timeframe>().is_err());
    }

    #[test]
    fn venue_parse_is_case_insensitive() {
        assert_eq!("Bybit".parse::<Venue>().unwrap(), Venue::Bybit);
        assert!("kraken".parse::<Venue>().is_err());
    }

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(61.236), 61.24);
        assert_eq!(round2(49.994), 49.99);
    }
}
