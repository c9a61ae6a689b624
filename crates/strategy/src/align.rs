//! Multi-timeframe alignment without lookahead.

use chrono::{DateTime, TimeZone, Utc};

use common::{Candle, CandleSeries, Error, Result, Timeframe};

use crate::indicators::{FrameRow, IndicatorFrame};

/// One base candle joined with the last *closed* candle of each higher timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub base: FrameRow,
    /// Same order as the `higher` frames passed to [`align`].
    pub higher: Vec<FrameRow>,
}

impl AlignedRow {
    pub fn open_time(&self) -> DateTime<Utc> {
        self.base.open_time
    }
}

/// As-of join of `base` against each frame in `higher`.
///
/// For a base candle opening at T, the higher bar containing T (the last one
/// with `open_time <= T`) may still be forming, so the bar *before* it is
/// attached. Base rows with no such previous bar are dropped. Each higher
/// cursor only moves forward, so attached indices are non-decreasing in T.
pub fn align(base: &IndicatorFrame, higher: &[&IndicatorFrame]) -> Vec<AlignedRow> {
    let mut cursors = vec![0usize; higher.len()];
    let mut rows = Vec::with_capacity(base.len());

    'base: for base_row in base.rows() {
        let t = base_row.open_time;
        let mut attached = Vec::with_capacity(higher.len());

        for (frame, cursor) in higher.iter().zip(cursors.iter_mut()) {
            let candles = frame.series().candles();
            while *cursor < candles.len() && candles[*cursor].open_time <= t {
                *cursor += 1;
            }
            // `cursor` bars have opened by T; the last of them may be open.
            let Some(closed) = cursor.checked_sub(2) else {
                continue 'base;
            };
            match frame.row(closed) {
                Some(row) => attached.push(row),
                None => continue 'base,
            }
        }

        rows.push(AlignedRow {
            base: base_row,
            higher: attached,
        });
    }

    rows
}

/// Aggregate `series` into `timeframe` buckets anchored at the Unix epoch.
///
/// open = first, high = max, low = min, close = last, volume = sum. Buckets
/// with no source candles produce nothing.
pub fn resample(series: &CandleSeries, timeframe: Timeframe) -> Result<CandleSeries> {
    if timeframe.minutes() < series.timeframe().minutes() {
        return Err(Error::Config(format!(
            "cannot resample {} down to {}",
            series.timeframe(),
            timeframe
        )));
    }

    let bucket_secs = timeframe.minutes() * 60;
    let mut out: Vec<Candle> = Vec::new();
    let mut current_bucket: Option<i64> = None;

    for c in series.candles() {
        let bucket = c.open_time.timestamp().div_euclid(bucket_secs) * bucket_secs;
        match (current_bucket, out.last_mut()) {
            (Some(b), Some(agg)) if b == bucket => {
                agg.high = agg.high.max(c.high);
                agg.low = agg.low.min(c.low);
                agg.close = c.close;
                agg.volume += c.volume;
            }
            _ => {
                let open_time = Utc
                    .timestamp_opt(bucket, 0)
                    .single()
                    .ok_or_else(|| Error::Other(format!("timestamp {bucket} out of range")))?;
                out.push(Candle {
                    open_time,
                    ..*c
                });
                current_bucket = Some(bucket);
            }
        }
    }

    CandleSeries::new(series.symbol(), timeframe, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn start() -> DateTime<Utc> {
        // 2024-01-01T00:00:00Z, aligned to every bucket size used here
        Utc.timestamp_opt(1_704_067_200, 0).unwrap()
    }

    fn candles(tf: Timeframe, closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Candle {
                open_time: start() + tf.duration() * i as i32,
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1.0,
            })
            .collect()
    }

    fn frame(tf: Timeframe, closes: &[f64]) -> IndicatorFrame {
        IndicatorFrame::new(CandleSeries::new("X", tf, candles(tf, closes)).unwrap())
    }

    #[test]
    fn attaches_previous_closed_bar() {
        let base = frame(Timeframe::M15, &(0..12).map(|i| i as f64 + 1.0).collect::<Vec<_>>());
        let hourly = frame(Timeframe::H1, &[100.0, 200.0, 300.0]);
        let rows = align(&base, &[&hourly]);

        // The first hour has no closed predecessor → its 4 base rows are dropped.
        assert_eq!(rows.len(), 8);
        // 01:00..01:45 see the 00:00 bar, 02:00..02:45 see the 01:00 bar.
        assert_eq!(rows[0].open_time(), start() + Duration::hours(1));
        assert_eq!(rows[0].higher[0].close, 100.0);
        assert_eq!(rows[3].higher[0].close, 100.0);
        assert_eq!(rows[4].higher[0].close, 200.0);
    }

    #[test]
    fn attached_bar_has_closed_by_base_time() {
        let base = frame(Timeframe::M15, &vec![1.0; 40]);
        let hourly = frame(Timeframe::H1, &vec![2.0; 10]);
        for row in align(&base, &[&hourly]) {
            let h = row.higher[0];
            assert!(h.open_time + Timeframe::H1.duration() <= row.open_time());
        }
    }

    #[test]
    fn mutating_open_higher_bar_does_not_change_rows() {
        let base = frame(Timeframe::M15, &vec![1.0; 12]);
        let hourly = frame(Timeframe::H1, &[10.0, 20.0, 30.0]);
        let mut altered = candles(Timeframe::H1, &[10.0, 20.0, 30.0]);
        // The 02:00 bar is still open at every base time before 03:00.
        altered[2].close = 9_999.0;
        altered[2].high = 10_000.0;
        let altered = IndicatorFrame::new(CandleSeries::new("X", Timeframe::H1, altered).unwrap());

        // Debug output compares NaN warm-up values as equal, `==` would not.
        assert_eq!(
            format!("{:?}", align(&base, &[&hourly])),
            format!("{:?}", align(&base, &[&altered]))
        );
    }

    #[test]
    fn attached_index_is_monotone() {
        let base = frame(Timeframe::M15, &vec![1.0; 64]);
        let hourly = frame(Timeframe::H1, &(0..16).map(|i| i as f64).collect::<Vec<_>>());
        let four = frame(Timeframe::H4, &(0..4).map(|i| i as f64).collect::<Vec<_>>());
        let rows = align(&base, &[&four, &hourly]);
        assert!(!rows.is_empty());
        for pair in rows.windows(2) {
            assert!(pair[1].higher[0].open_time >= pair[0].higher[0].open_time);
            assert!(pair[1].higher[1].open_time >= pair[0].higher[1].open_time);
        }
    }

    #[test]
    fn no_higher_frames_keeps_every_row() {
        let base = frame(Timeframe::M15, &[1.0, 2.0, 3.0]);
        let rows = align(&base, &[]);
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.higher.is_empty()));
    }

    #[test]
    fn resample_aggregates_ohlcv() {
        let mut raw = candles(Timeframe::M15, &[1.0, 4.0, 2.0, 3.0, 5.0]);
        raw[1].high = 9.0;
        raw[2].low = 0.1;
        let series = CandleSeries::new("X", Timeframe::M15, raw).unwrap();
        let hourly = resample(&series, Timeframe::H1).unwrap();

        assert_eq!(hourly.len(), 2);
        let first = hourly.candles()[0];
        assert_eq!(first.open_time, start());
        assert_eq!(first.open, 1.0);
        assert_eq!(first.high, 9.0);
        assert_eq!(first.low, 0.1);
        assert_eq!(first.close, 3.0);
        assert_eq!(first.volume, 4.0);
        assert_eq!(hourly.candles()[1].close, 5.0);
    }

    #[test]
    fn resample_rejects_finer_target() {
        let series = CandleSeries::new("X", Timeframe::H1, candles(Timeframe::H1, &[1.0])).unwrap();
        assert!(resample(&series, Timeframe::M15).is_err());
    }
}
