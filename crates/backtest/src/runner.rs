use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{CandleSeries, CandleSource, Result};
use strategy::{align, resample, IndicatorFrame, TrendStack};

use crate::simulator::{simulate, BacktestReport, SimConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Base-timeframe bars to fetch. Higher timeframes are resampled from these.
    pub base_limit: usize,
    pub sim: SimConfig,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            base_limit: 1000,
            sim: SimConfig::default(),
        }
    }
}

/// Fetch one symbol's base series, derive its higher timeframes and replay
/// the trend stack over it.
///
/// Returns `Ok(None)` when the history is too short to produce a single
/// aligned row. Fetch and validation errors propagate.
pub async fn run_backtest(
    source: &dyn CandleSource,
    symbol: &str,
    stack: &TrendStack,
    config: &BacktestConfig,
) -> Result<Option<BacktestReport>> {
    let tf = stack.config();
    let candles = source.fetch(symbol, tf.base, config.base_limit).await?;
    let base_series = CandleSeries::new(symbol, tf.base, candles)?;

    if base_series.len() < tf.min_bars {
        debug!(symbol = %symbol, bars = base_series.len(), required = tf.min_bars, "Not enough history to backtest");
        return Ok(None);
    }

    let highest = IndicatorFrame::new(resample(&base_series, tf.highest)?);
    let middle = IndicatorFrame::new(resample(&base_series, tf.middle)?);
    let base = IndicatorFrame::new(base_series);

    let rows = align(&base, &[&highest, &middle]);
    if rows.is_empty() {
        debug!(symbol = %symbol, "No aligned rows to backtest");
        return Ok(None);
    }

    let report = simulate(symbol, &rows, stack, config.sim.clone());
    info!(
        symbol = %symbol,
        rows = rows.len(),
        trades = report.summary.trades,
        win_rate = report.summary.win_rate,
        final_balance = report.summary.final_balance,
        "Backtest complete"
    );
    Ok(Some(report))
}
