//! Declarative rule-list strategy.
//!
//! Every rule compares one indicator's latest value on the base timeframe
//! against a threshold. A symbol passes when all rules hold.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use common::{round2, Bias, Check, CandleSeries, Error, Result, ScanResult, Timeframe};

use crate::config::{RuleConfig, RuleFileConfig};
use crate::indicators::{
    adx, bb_width, rsi, rvol, ADX_PERIOD, BB_LENGTH, BB_MULT, RSI_PERIOD, RVOL_PERIOD,
};
use crate::{Condition, FrameSet, Verdict, MIN_BARS};

// ─── Indicators ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorKind {
    Rvol,
    Rsi,
    Adx,
    BbWidth,
}

impl IndicatorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            IndicatorKind::Rvol => "RVOL",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Adx => "ADX",
            IndicatorKind::BbWidth => "BB_WIDTH",
        }
    }

    fn param_keys(self) -> &'static [&'static str] {
        match self {
            IndicatorKind::Rvol | IndicatorKind::Rsi | IndicatorKind::Adx => &["period"],
            IndicatorKind::BbWidth => &["length", "mult"],
        }
    }
}

impl FromStr for IndicatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "RVOL" => Ok(IndicatorKind::Rvol),
            "RSI" => Ok(IndicatorKind::Rsi),
            "ADX" => Ok(IndicatorKind::Adx),
            "BB_WIDTH" => Ok(IndicatorKind::BbWidth),
            _ => Err(Error::UnknownIndicator(s.to_string())),
        }
    }
}

/// A parameterised indicator a rule can read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Indicator {
    Rvol { period: usize },
    Rsi { period: usize },
    Adx { period: usize },
    BbWidth { length: usize, mult: f64 },
}

impl Indicator {
    pub fn kind(&self) -> IndicatorKind {
        match self {
            Indicator::Rvol { .. } => IndicatorKind::Rvol,
            Indicator::Rsi { .. } => IndicatorKind::Rsi,
            Indicator::Adx { .. } => IndicatorKind::Adx,
            Indicator::BbWidth { .. } => IndicatorKind::BbWidth,
        }
    }

    /// Build from a rule's parameter table, applying defaults for missing keys.
    pub fn from_params(kind: IndicatorKind, cfg: &RuleConfig) -> Result<Self> {
        if let Some(key) = cfg.params.keys().find(|k| !kind.param_keys().contains(&k.as_str())) {
            return Err(Error::InvalidRule(format!(
                "{}: unknown parameter '{key}'",
                kind.as_str()
            )));
        }

        let indicator = match kind {
            IndicatorKind::Rvol => Indicator::Rvol {
                period: cfg.param_usize("period", RVOL_PERIOD)?,
            },
            IndicatorKind::Rsi => Indicator::Rsi {
                period: cfg.param_usize("period", RSI_PERIOD)?,
            },
            IndicatorKind::Adx => Indicator::Adx {
                period: cfg.param_usize("period", ADX_PERIOD)?,
            },
            IndicatorKind::BbWidth => Indicator::BbWidth {
                length: cfg.param_usize("length", BB_LENGTH)?,
                mult: cfg.param_f64("mult", BB_MULT)?,
            },
        };

        match indicator {
            Indicator::Rvol { period: 0 }
            | Indicator::Rsi { period: 0 }
            | Indicator::Adx { period: 0 }
            | Indicator::BbWidth { length: 0, .. } => Err(Error::InvalidRule(format!(
                "{}: period must be at least 1",
                kind.as_str()
            ))),
            Indicator::BbWidth { mult, .. } if !mult.is_finite() => Err(Error::InvalidRule(
                format!("BB_WIDTH: mult must be finite, got {mult}"),
            )),
            ok => Ok(ok),
        }
    }

    /// Bars needed before the latest value is meaningful.
    pub fn warmup(&self) -> usize {
        match *self {
            Indicator::Rvol { period } => period,
            Indicator::Rsi { period } => period + 1,
            Indicator::Adx { period } => period * 2,
            Indicator::BbWidth { length, .. } => length,
        }
    }

    /// Full indicator column over `series`.
    pub fn compute(&self, series: &CandleSeries) -> Vec<f64> {
        match *self {
            Indicator::Rvol { period } => rvol(&series.volumes(), period),
            Indicator::Rsi { period } => rsi(&series.closes(), period),
            Indicator::Adx { period } => {
                adx(&series.highs(), &series.lows(), &series.closes(), period).adx
            }
            Indicator::BbWidth { length, mult } => bb_width(&series.closes(), length, mult),
        }
    }

    pub fn label(&self) -> String {
        match *self {
            Indicator::Rvol { period } => format!("RVOL({period})"),
            Indicator::Rsi { period } => format!("RSI({period})"),
            Indicator::Adx { period } => format!("ADX({period})"),
            Indicator::BbWidth { length, mult } => format!("BB_WIDTH({length},{mult})"),
        }
    }
}

// ─── Comparators ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Gt,
    Lt,
    Ge,
    Le,
}

impl Comparator {
    pub fn apply(self, value: f64, threshold: f64) -> bool {
        match self {
            Comparator::Gt => value > threshold,
            Comparator::Lt => value < threshold,
            Comparator::Ge => value >= threshold,
            Comparator::Le => value <= threshold,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Comparator::Gt => ">",
            Comparator::Lt => "<",
            Comparator::Ge => ">=",
            Comparator::Le => "<=",
        }
    }
}

impl FromStr for Comparator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            ">" => Ok(Comparator::Gt),
            "<" => Ok(Comparator::Lt),
            ">=" | "≥" => Ok(Comparator::Ge),
            "<=" | "≤" => Ok(Comparator::Le),
            other => Err(Error::InvalidRule(format!("unknown operator '{other}'"))),
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Rules ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub indicator: Indicator,
    pub comparator: Comparator,
    pub threshold: f64,
}

impl Rule {
    pub fn from_config(cfg: &RuleConfig) -> Result<Self> {
        let kind: IndicatorKind = cfg.indicator.parse()?;
        let indicator = Indicator::from_params(kind, cfg)?;
        let comparator: Comparator = cfg.operator.parse()?;
        if !cfg.threshold.is_finite() {
            return Err(Error::InvalidRule(format!(
                "{}: threshold must be finite, got {}",
                kind.as_str(),
                cfg.threshold
            )));
        }
        Ok(Self {
            indicator,
            comparator,
            threshold: cfg.threshold,
        })
    }

    /// Check name, e.g. `RVOL(30) > 1`.
    pub fn describe(&self) -> String {
        format!("{} {} {}", self.indicator.label(), self.comparator, self.threshold)
    }
}

/// All-of rule list against one base timeframe.
#[derive(Debug, Clone)]
pub struct RuleSet {
    base: Timeframe,
    rules: Vec<Rule>,
    name: String,
}

impl RuleSet {
    pub fn new(base: Timeframe, rules: Vec<Rule>) -> Self {
        let name = format!("rule list {base} ({} rules)", rules.len());
        Self { base, rules, name }
    }

    /// Build every rule, failing on the first malformed one.
    pub fn from_config(cfg: &RuleFileConfig) -> Result<Self> {
        let rules = cfg
            .rules
            .iter()
            .map(Rule::from_config)
            .collect::<Result<Vec<_>>>()?;
        debug!(base = %cfg.base_timeframe, rules = rules.len(), "Built rule set");
        Ok(Self::new(cfg.base_timeframe, rules))
    }

    pub fn base(&self) -> Timeframe {
        self.base
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Bars of the base timeframe needed to evaluate every rule.
    pub fn required_bars(&self) -> usize {
        self.rules
            .iter()
            .map(|r| r.indicator.warmup())
            .fold(MIN_BARS, usize::max)
    }
}

impl Condition for RuleSet {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeframes(&self) -> Vec<Timeframe> {
        vec![self.base]
    }

    fn fingerprint(&self) -> String {
        let rules: Vec<String> = self
            .rules
            .iter()
            .map(|r| format!("{}{}{}", r.indicator.label(), r.comparator, r.threshold))
            .collect();
        format!("rules:{}:{}", self.base, rules.join(","))
    }

    fn evaluate(&self, symbol: &str, frames: &FrameSet) -> Verdict {
        let required = self.required_bars();
        let frame = match frames.require(self.base, required) {
            Ok(frame) => frame,
            Err(insufficient) => return insufficient,
        };
        let Some(latest) = frame.last_row() else {
            return Verdict::Insufficient {
                timeframe: self.base,
                bars: 0,
                required,
            };
        };
        let insufficient = Verdict::Insufficient {
            timeframe: self.base,
            bars: frame.len(),
            required,
        };
        if latest.ema50.is_nan() {
            return insufficient;
        }

        let mut result = ScanResult::new(symbol, latest.close);
        // Side comes from price vs EMA50, independent of what the rules test.
        result.side = if latest.close > latest.ema50 {
            Bias::Long
        } else {
            Bias::Short
        };
        let rsi = round2(latest.rsi);
        let adx = round2(latest.adx);
        result.rsi = rsi.is_finite().then_some(rsi);
        result.adx = adx.is_finite().then_some(adx);
        result.indicators.insert(format!("EMA50 ({})", self.base), latest.ema50);

        for rule in &self.rules {
            let value = rule
                .indicator
                .compute(frame.series())
                .last()
                .copied()
                .unwrap_or(f64::NAN);
            if value.is_nan() {
                return insufficient;
            }
            result.indicators.insert(rule.indicator.label(), value);
            result
                .checks
                .push(Check::new(rule.describe(), rule.comparator.apply(value, rule.threshold)));
        }

        result.pass = result.checks.iter().all(|c| c.passed);
        Verdict::Evaluated(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::Candle;
    use std::collections::HashMap;

    use crate::IndicatorFrame;

    fn rule_cfg(indicator: &str, op: &str, threshold: f64) -> RuleConfig {
        RuleConfig {
            indicator: indicator.into(),
            operator: op.into(),
            threshold,
            params: HashMap::new(),
        }
    }

    fn frames_with_volumes(volumes: &[f64]) -> FrameSet {
        let start = Utc.timestamp_opt(1_704_067_200, 0).unwrap();
        let candles = volumes
            .iter()
            .enumerate()
            .map(|(i, &volume)| {
                let close = 100.0 + i as f64;
                Candle {
                    open_time: start + Timeframe::M15.duration() * i as i32,
                    open: close - 1.0,
                    high: close + 0.5,
                    low: close - 1.5,
                    close,
                    volume,
                }
            })
            .collect();
        let series = CandleSeries::new("TESTUSDT", Timeframe::M15, candles).unwrap();
        FrameSet::new(vec![IndicatorFrame::new(series)])
    }

    #[test]
    fn low_rvol_fails_regardless_of_rsi() {
        let set = RuleSet::from_config(&RuleFileConfig {
            base_timeframe: Timeframe::M15,
            rules: vec![rule_cfg("RVOL", ">", 1.0), rule_cfg("RSI", "<", 70.0)],
        })
        .unwrap();

        // 39 bars at 100, then v with v / ((2900 + v) / 30) = 0.8.
        let mut volumes = vec![100.0; 39];
        volumes.push(2_320.0 / 29.2);
        let frames = frames_with_volumes(&volumes);

        let Verdict::Evaluated(result) = set.evaluate("TESTUSDT", &frames) else {
            panic!("expected evaluation");
        };
        let rvol = result.indicators["RVOL(30)"];
        assert!((rvol - 0.8).abs() < 1e-9, "rvol = {rvol}");
        assert_eq!(result.check("RVOL(30) > 1"), Some(false));
        assert!(!result.pass);
    }

    #[test]
    fn all_rules_holding_passes() {
        let set = RuleSet::new(
            Timeframe::M15,
            vec![Rule {
                indicator: Indicator::Rvol { period: 30 },
                comparator: Comparator::Ge,
                threshold: 1.0,
            }],
        );
        let frames = frames_with_volumes(&vec![50.0; 40]);
        let verdict = set.evaluate("X", &frames);
        assert!(verdict.passed());
    }

    #[test]
    fn empty_rule_list_passes_with_context() {
        let set = RuleSet::from_config(&RuleFileConfig::parse("").unwrap()).unwrap();
        let Verdict::Evaluated(result) = set.evaluate("X", &frames_with_volumes(&vec![1.0; 25]))
        else {
            panic!("expected evaluation");
        };
        assert!(result.pass);
        assert!(result.checks.is_empty());
        assert_eq!(result.price, 124.0);
        assert_eq!(result.side, Bias::Long);
    }

    #[test]
    fn rvol_warmup_sets_required_bars() {
        let set = RuleSet::new(
            Timeframe::M15,
            vec![Rule {
                indicator: Indicator::Rvol { period: 30 },
                comparator: Comparator::Gt,
                threshold: 1.0,
            }],
        );
        assert_eq!(set.required_bars(), 30);
        assert_eq!(
            set.evaluate("X", &frames_with_volumes(&vec![1.0; 29])),
            Verdict::Insufficient {
                timeframe: Timeframe::M15,
                bars: 29,
                required: 30
            }
        );
    }

    #[test]
    fn undefined_latest_value_is_insufficient() {
        // Zero volume makes the RVOL denominator zero.
        let set = RuleSet::new(
            Timeframe::M15,
            vec![Rule {
                indicator: Indicator::Rvol { period: 30 },
                comparator: Comparator::Gt,
                threshold: 1.0,
            }],
        );
        assert!(matches!(
            set.evaluate("X", &frames_with_volumes(&vec![0.0; 40])),
            Verdict::Insufficient { bars: 40, .. }
        ));
    }

    #[test]
    fn unknown_indicator_is_rejected_at_build() {
        let err = RuleSet::from_config(&RuleFileConfig {
            base_timeframe: Timeframe::M15,
            rules: vec![rule_cfg("MACD", ">", 0.0)],
        })
        .unwrap_err();
        assert!(matches!(err, Error::UnknownIndicator(name) if name == "MACD"));
    }

    #[test]
    fn malformed_rules_are_rejected() {
        assert!(Rule::from_config(&rule_cfg("RSI", "=>", 50.0)).is_err());
        assert!(Rule::from_config(&rule_cfg("RSI", "<", f64::NAN)).is_err());

        let mut zero = rule_cfg("RSI", "<", 70.0);
        zero.params.insert("period".into(), toml::Value::Integer(0));
        assert!(Rule::from_config(&zero).is_err());

        let mut typo = rule_cfg("RVOL", ">", 1.0);
        typo.params.insert("perid".into(), toml::Value::Integer(10));
        assert!(matches!(Rule::from_config(&typo), Err(Error::InvalidRule(_))));
    }

    #[test]
    fn unicode_operators_parse() {
        assert_eq!("≥".parse::<Comparator>().unwrap(), Comparator::Ge);
        assert_eq!("≤".parse::<Comparator>().unwrap(), Comparator::Le);
        assert!(Comparator::Ge.apply(1.0, 1.0));
        assert!(!Comparator::Gt.apply(1.0, 1.0));
    }

    #[test]
    fn fingerprint_changes_with_threshold() {
        let a = RuleSet::from_config(&RuleFileConfig {
            base_timeframe: Timeframe::M15,
            rules: vec![rule_cfg("RSI", "<", 70.0)],
        })
        .unwrap();
        let b = RuleSet::from_config(&RuleFileConfig {
            base_timeframe: Timeframe::M15,
            rules: vec![rule_cfg("RSI", "<", 65.0)],
        })
        .unwrap();
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_eq!(a.fingerprint(), "rules:15m:RSI(14)<70");
    }
}
