pub mod align;
pub mod config;
pub mod indicators;
pub mod rules;
pub mod trend_stack;

pub use align::{align, resample, AlignedRow};
pub use config::{RuleConfig, RuleFileConfig};
pub use indicators::{FrameRow, IndicatorFrame};
pub use rules::{Comparator, Indicator, IndicatorKind, Rule, RuleSet};
pub use trend_stack::{TrendStack, TrendStackConfig};

use common::{ScanResult, Timeframe};

/// Least history any strategy evaluates on, per timeframe.
pub const MIN_BARS: usize = 20;

/// What a strategy concluded about one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Not enough usable history on `timeframe`. Retry later; this is not a failed check.
    Insufficient {
        timeframe: Timeframe,
        bars: usize,
        required: usize,
    },
    /// The strategy ran. `ScanResult::pass` says whether the symbol qualified.
    Evaluated(ScanResult),
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Evaluated(r) if r.pass)
    }
}

/// The indicator frames fetched for one symbol, one per timeframe.
#[derive(Debug, Clone, Default)]
pub struct FrameSet {
    frames: Vec<IndicatorFrame>,
}

impl FrameSet {
    pub fn new(frames: Vec<IndicatorFrame>) -> Self {
        Self { frames }
    }

    pub fn push(&mut self, frame: IndicatorFrame) {
        self.frames.push(frame);
    }

    pub fn get(&self, timeframe: Timeframe) -> Option<&IndicatorFrame> {
        self.frames.iter().find(|f| f.timeframe() == timeframe)
    }

    /// The frame for `timeframe` if it holds at least `required` bars.
    pub fn require(&self, timeframe: Timeframe, required: usize) -> Result<&IndicatorFrame, Verdict> {
        match self.get(timeframe) {
            Some(frame) if frame.len() >= required => Ok(frame),
            other => Err(Verdict::Insufficient {
                timeframe,
                bars: other.map_or(0, |f| f.len()),
                required,
            }),
        }
    }
}

/// A pass/fail screen over one symbol's candle history.
///
/// `TrendStack` and `RuleSet` implement this; the scanner only sees the trait.
pub trait Condition: Send + Sync {
    /// Human-readable name shown in logs.
    fn name(&self) -> &str;

    /// Timeframes the strategy reads, highest first.
    fn timeframes(&self) -> Vec<Timeframe>;

    /// Stable identifier of this configuration, used as a cache key.
    fn fingerprint(&self) -> String;

    /// Evaluate the latest bar of each required timeframe.
    fn evaluate(&self, symbol: &str, frames: &FrameSet) -> Verdict;
}
