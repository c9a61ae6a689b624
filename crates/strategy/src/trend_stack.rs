use serde::{Deserialize, Serialize};

use common::{round2, Bias, Check, ScanResult, SetupType, Side, Timeframe};

use crate::align::AlignedRow;
use crate::indicators::FrameRow;
use crate::{Condition, FrameSet, Verdict, MIN_BARS};

/// Parameters of the fixed multi-timeframe EMA stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendStackConfig {
    pub highest: Timeframe,
    pub middle: Timeframe,
    pub base: Timeframe,
    /// Require RSI above (LONG) / below (SHORT) `rsi_threshold` on the base timeframe.
    pub use_rsi: bool,
    /// Require ADX above `adx_threshold` and the matching DI on top.
    pub use_adx: bool,
    pub rsi_threshold: f64,
    pub adx_threshold: f64,
    pub min_bars: usize,
}

impl Default for TrendStackConfig {
    fn default() -> Self {
        Self {
            highest: Timeframe::H4,
            middle: Timeframe::H1,
            base: Timeframe::M15,
            use_rsi: false,
            use_adx: false,
            rsi_threshold: 50.0,
            adx_threshold: 20.0,
            min_bars: MIN_BARS,
        }
    }
}

/// Top-down EMA trend filter across three timeframes.
///
/// Stages run in order and stop at the first failure:
/// 1. highest: 21 > 50 > 100 with close above 21 (LONG), or the mirror (SHORT)
/// 2. middle: 21 vs 50 agrees with the side
/// 3. base: 21 vs 50 agrees and close is beyond the 50
/// 4. optional RSI filter, 5. optional ADX/DMI filter
#[derive(Debug, Clone)]
pub struct TrendStack {
    config: TrendStackConfig,
    name: String,
}

impl TrendStack {
    pub fn new(config: TrendStackConfig) -> Self {
        let name = format!(
            "EMA stack {}/{}/{}",
            config.highest, config.middle, config.base
        );
        Self { config, name }
    }

    pub fn config(&self) -> &TrendStackConfig {
        &self.config
    }

    fn stack_check_names(&self) -> [String; 3] {
        [
            format!("{} EMA Stack", self.config.highest),
            format!("{} EMA Stack", self.config.middle),
            format!("{} EMA Stack", self.config.base),
        ]
    }

    /// Run every stage on one row per timeframe.
    pub fn evaluate_rows(
        &self,
        symbol: &str,
        highest: &FrameRow,
        middle: &FrameRow,
        base: &FrameRow,
    ) -> ScanResult {
        let cfg = &self.config;
        let mut result = ScanResult::new(symbol, base.close);
        result.checks = self
            .stack_check_names()
            .into_iter()
            .map(|name| Check::new(name, false))
            .collect();
        record(
            &mut result,
            cfg.highest,
            highest,
            &[
                ("EMA21", highest.ema21),
                ("EMA50", highest.ema50),
                ("EMA100", highest.ema100),
            ],
        );

        // ── Stage 1: highest timeframe sets the side ─────────────────────────
        let side = if highest.ema21 > highest.ema50
            && highest.ema50 > highest.ema100
            && highest.close > highest.ema21
        {
            Side::Long
        } else if highest.ema21 < highest.ema50
            && highest.ema50 < highest.ema100
            && highest.close < highest.ema21
        {
            Side::Short
        } else {
            return result;
        };
        result.side = Bias::from(side);
        result.checks[0].passed = true;

        // ── Stage 2: middle timeframe, its own EMAs ──────────────────────────
        record(
            &mut result,
            cfg.middle,
            middle,
            &[("EMA21", middle.ema21), ("EMA50", middle.ema50)],
        );
        let middle_ok = match side {
            Side::Long => middle.ema21 > middle.ema50,
            Side::Short => middle.ema21 < middle.ema50,
        };
        if !middle_ok {
            return result;
        }
        result.checks[1].passed = true;

        // ── Stage 3: base timeframe ──────────────────────────────────────────
        record(
            &mut result,
            cfg.base,
            base,
            &[("EMA21", base.ema21), ("EMA50", base.ema50)],
        );
        let base_ok = match side {
            Side::Long => base.ema21 > base.ema50 && base.close > base.ema50,
            Side::Short => base.ema21 < base.ema50 && base.close < base.ema50,
        };
        if !base_ok {
            return result;
        }
        result.checks[2].passed = true;

        let rsi = round2(base.rsi);
        let adx = round2(base.adx);
        result.rsi = rsi.is_finite().then_some(rsi);
        result.adx = adx.is_finite().then_some(adx);
        let pulled_back = match side {
            Side::Long => base.close < base.ema21,
            Side::Short => base.close > base.ema21,
        };
        result.setup = Some(if pulled_back {
            SetupType::Pulse
        } else {
            SetupType::Momentum
        });

        // ── Stage 4: RSI filter ──────────────────────────────────────────────
        if cfg.use_rsi {
            let ok = match side {
                Side::Long => rsi > cfg.rsi_threshold,
                Side::Short => rsi < cfg.rsi_threshold,
            };
            result.checks.push(Check::new(format!("RSI ({})", cfg.base), ok));
            if !ok {
                return result;
            }
        }

        // ── Stage 5: ADX / DMI filter ────────────────────────────────────────
        if cfg.use_adx {
            let direction_ok = match side {
                Side::Long => base.plus_di > base.minus_di,
                Side::Short => base.minus_di > base.plus_di,
            };
            let ok = adx > cfg.adx_threshold && direction_ok;
            result.checks.push(Check::new(format!("ADX ({})", cfg.base), ok));
            if !ok {
                return result;
            }
        }

        result.pass = true;
        result
    }

    /// Evaluate an aligned backtest row: `row.higher` must hold the highest
    /// then the middle timeframe. Returns `None` for rows without both.
    pub fn evaluate_aligned(&self, symbol: &str, row: &AlignedRow) -> Option<ScanResult> {
        match row.higher.as_slice() {
            [highest, middle, ..] => Some(self.evaluate_rows(symbol, highest, middle, &row.base)),
            _ => None,
        }
    }
}

/// Store measured values under `"<name> (<timeframe>)"`, skipping undefined ones.
fn record(result: &mut ScanResult, timeframe: Timeframe, row: &FrameRow, values: &[(&str, f64)]) {
    result
        .indicators
        .insert(format!("Close ({timeframe})"), row.close);
    for &(name, value) in values {
        if value.is_finite() {
            result.indicators.insert(format!("{name} ({timeframe})"), value);
        }
    }
}

impl Condition for TrendStack {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframes(&self) -> Vec<Timeframe> {
        vec![self.config.highest, self.config.middle, self.config.base]
    }

    fn fingerprint(&self) -> String {
        let c = &self.config;
        format!(
            "trend-stack:{}/{}/{}:rsi={}@{}:adx={}@{}:min={}",
            c.highest,
            c.middle,
            c.base,
            c.use_rsi,
            c.rsi_threshold,
            c.use_adx,
            c.adx_threshold,
            c.min_bars
        )
    }

    fn evaluate(&self, symbol: &str, frames: &FrameSet) -> Verdict {
        let latest = |timeframe: Timeframe| {
            let frame = frames.require(timeframe, self.config.min_bars.max(1))?;
            frame.last_row().ok_or(Verdict::Insufficient {
                timeframe,
                bars: 0,
                required: self.config.min_bars,
            })
        };
        let rows = latest(self.config.highest).and_then(|h| {
            let m = latest(self.config.middle)?;
            let b = latest(self.config.base)?;
            Ok((h, m, b))
        });

        match rows {
            Ok((h, m, b)) => Verdict::Evaluated(self.evaluate_rows(symbol, &h, &m, &b)),
            Err(insufficient) => insufficient,
        }
    }
}
