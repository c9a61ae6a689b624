//! Indicator library and the indicator frame built from it.
//!
//! Every function here is pure: it takes columns of a candle series and
//! returns a column of the same length, `NaN` where the indicator is not yet
//! defined.

pub mod adx;
pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod volume;

pub use adx::{adx, AdxSeries};
pub use bollinger::bb_width;
pub use ema::{ema, wilder};
pub use rsi::rsi;
pub use volume::rvol;

use chrono::{DateTime, Utc};

use common::{CandleSeries, Timeframe};

pub const EMA_FAST: usize = 21;
pub const EMA_MID: usize = 50;
pub const EMA_SLOW: usize = 100;
pub const RSI_PERIOD: usize = 14;
pub const ADX_PERIOD: usize = 14;
pub const RVOL_PERIOD: usize = 30;
pub const BB_LENGTH: usize = 20;
pub const BB_MULT: f64 = 2.0;

/// Simple moving average over `period` samples, `NaN` until the window is full.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 {
        return vec![f64::NAN; values.len()];
    }
    (0..values.len())
        .map(|i| {
            if i + 1 < period {
                f64::NAN
            } else {
                values[i + 1 - period..=i].iter().sum::<f64>() / period as f64
            }
        })
        .collect()
}

/// A candle series plus its derived indicator columns, index-aligned.
///
/// Built once from its source series and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    series: CandleSeries,
    pub ema21: Vec<f64>,
    pub ema50: Vec<f64>,
    pub ema100: Vec<f64>,
    pub rsi: Vec<f64>,
    pub adx: Vec<f64>,
    pub plus_di: Vec<f64>,
    pub minus_di: Vec<f64>,
    pub rvol: Vec<f64>,
    pub bb_width: Vec<f64>,
}

impl IndicatorFrame {
    pub fn new(series: CandleSeries) -> Self {
        let closes = series.closes();
        let highs = series.highs();
        let lows = series.lows();
        let volumes = series.volumes();
        let dmi = adx(&highs, &lows, &closes, ADX_PERIOD);

        Self {
            ema21: ema(&closes, EMA_FAST),
            ema50: ema(&closes, EMA_MID),
            ema100: ema(&closes, EMA_SLOW),
            rsi: rsi(&closes, RSI_PERIOD),
            adx: dmi.adx,
            plus_di: dmi.plus_di,
            minus_di: dmi.minus_di,
            rvol: rvol(&volumes, RVOL_PERIOD),
            bb_width: bb_width(&closes, BB_LENGTH, BB_MULT),
            series,
        }
    }

    pub fn series(&self) -> &CandleSeries {
        &self.series
    }

    pub fn symbol(&self) -> &str {
        self.series.symbol()
    }

    pub fn timeframe(&self) -> Timeframe {
        self.series.timeframe()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn row(&self, i: usize) -> Option<FrameRow> {
        let c = self.series.candles().get(i)?;
        Some(FrameRow {
            open_time: c.open_time,
            open: c.open,
            high: c.high,
            low: c.low,
            close: c.close,
            volume: c.volume,
            ema21: self.ema21[i],
            ema50: self.ema50[i],
            ema100: self.ema100[i],
            rsi: self.rsi[i],
            adx: self.adx[i],
            plus_di: self.plus_di[i],
            minus_di: self.minus_di[i],
            rvol: self.rvol[i],
            bb_width: self.bb_width[i],
        })
    }

    pub fn last_row(&self) -> Option<FrameRow> {
        self.len().checked_sub(1).and_then(|i| self.row(i))
    }

    pub fn rows(&self) -> impl Iterator<Item = FrameRow> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }
}

/// One candle of an [`IndicatorFrame`] with all its indicator values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameRow {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub ema21: f64,
    pub ema50: f64,
    pub ema100: f64,
    pub rsi: f64,
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub rvol: f64,
    pub bb_width: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use common::Candle;

    fn series(closes: &[f64]) -> CandleSeries {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let candles = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: start + Duration::minutes(15 * i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100.0,
            })
            .collect();
        CandleSeries::new("TESTUSDT", Timeframe::M15, candles).unwrap()
    }

    #[test]
    fn sma_is_undefined_until_window_full() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(out[1].is_nan());
        assert_eq!(out[2], 2.0);
        assert_eq!(out[3], 3.0);
    }

    #[test]
    fn frame_columns_match_series_length() {
        let frame = IndicatorFrame::new(series(&[10.0; 40]));
        assert_eq!(frame.len(), 40);
        for col in [
            &frame.ema21,
            &frame.ema50,
            &frame.ema100,
            &frame.rsi,
            &frame.adx,
            &frame.plus_di,
            &frame.minus_di,
            &frame.rvol,
            &frame.bb_width,
        ] {
            assert_eq!(col.len(), 40);
        }
    }

    #[test]
    fn flat_series_has_equal_emas() {
        let frame = IndicatorFrame::new(series(&[10.0; 10]));
        for row in frame.rows() {
            assert_eq!(row.ema21, row.ema50);
            assert_eq!(row.ema50, row.ema100);
        }
    }

    #[test]
    fn last_row_reflects_last_candle() {
        let frame = IndicatorFrame::new(series(&[1.0, 2.0, 3.0]));
        let row = frame.last_row().unwrap();
        assert_eq!(row.close, 3.0);
        assert!(row.rvol.is_nan());
    }
}
