use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use common::Side;
use strategy::{AlignedRow, FrameRow, TrendStack};

/// Trade management parameters for a replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    /// Distance from entry to the stop (e.g. 0.02 = 2%).
    pub stop_loss_pct: f64,
    /// Distance from entry to the target (e.g. 0.04 = 4%).
    pub take_profit_pct: f64,
    pub initial_balance: f64,
    /// Take SHORT signals too. Off by default: the reference replay is long-only.
    pub allow_short: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
            initial_balance: 10_000.0,
            allow_short: false,
        }
    }
}

/// The single open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl Position {
    fn open(side: Side, entry_time: DateTime<Utc>, entry_price: f64, cfg: &SimConfig) -> Self {
        let (stop_loss, take_profit) = match side {
            Side::Long => (
                entry_price * (1.0 - cfg.stop_loss_pct),
                entry_price * (1.0 + cfg.take_profit_pct),
            ),
            Side::Short => (
                entry_price * (1.0 + cfg.stop_loss_pct),
                entry_price * (1.0 - cfg.take_profit_pct),
            ),
        };
        Self {
            side,
            entry_time,
            entry_price,
            stop_loss,
            take_profit,
        }
    }

    /// Exit touched by a candle's range. The stop wins when both are touched.
    fn exit_on(&self, high: f64, low: f64) -> Option<(ExitKind, f64)> {
        let (stopped, hit_target) = match self.side {
            Side::Long => (low <= self.stop_loss, high >= self.take_profit),
            Side::Short => (high >= self.stop_loss, low <= self.take_profit),
        };
        if stopped {
            Some((ExitKind::Stop, self.stop_loss))
        } else if hit_target {
            Some((ExitKind::Target, self.take_profit))
        } else {
            None
        }
    }

    fn return_pct(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Long => (exit_price - self.entry_price) / self.entry_price * 100.0,
            Side::Short => (self.entry_price - exit_price) / self.entry_price * 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitKind {
    Stop,
    Target,
}

/// One closed position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: Side,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub exit_kind: ExitKind,
    /// Realised return in percent.
    pub pct: f64,
    /// Account balance after this trade.
    pub balance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    /// Percent of trades with a strictly positive return.
    pub win_rate: f64,
    pub final_balance: f64,
    pub return_pct: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub symbol: String,
    pub config: SimConfig,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    pub summary: Summary,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Flat,
    InPosition(Position),
}

/// Single-position trade state machine, fed one candle at a time in time order.
///
/// While flat, an entry signal opens a position at the candle's close. While
/// in a position, entry signals are ignored and each later candle is checked
/// against the stop, then the target. A candle that closes a position never
/// opens a new one.
#[derive(Debug, Clone)]
pub struct Simulator {
    config: SimConfig,
    state: State,
    balance: f64,
    trades: Vec<Trade>,
    equity: Vec<EquityPoint>,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            balance: config.initial_balance,
            config,
            state: State::Flat,
            trades: Vec::new(),
            equity: Vec::new(),
        }
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            State::InPosition(p) => Some(p),
            State::Flat => None,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// Process one candle. `signal` is the strategy's verdict at its close.
    pub fn step(&mut self, candle: &FrameRow, signal: Option<Side>) {
        match self.state {
            State::InPosition(position) => {
                if let Some((exit_kind, exit_price)) = position.exit_on(candle.high, candle.low) {
                    let pct = position.return_pct(exit_price);
                    self.balance += self.balance * (pct / 100.0);
                    debug!(
                        side = ?position.side,
                        entry = position.entry_price,
                        exit = exit_price,
                        kind = ?exit_kind,
                        pct,
                        "Position closed"
                    );
                    self.trades.push(Trade {
                        side: position.side,
                        entry_time: position.entry_time,
                        exit_time: candle.open_time,
                        entry_price: position.entry_price,
                        exit_price,
                        exit_kind,
                        pct,
                        balance: self.balance,
                    });
                    self.state = State::Flat;
                }
            }
            State::Flat => {
                let side = signal.filter(|s| *s == Side::Long || self.config.allow_short);
                if let Some(side) = side {
                    let position = Position::open(side, candle.open_time, candle.close, &self.config);
                    debug!(side = ?side, entry = candle.close, "Position opened");
                    self.state = State::InPosition(position);
                }
            }
        }

        self.equity.push(EquityPoint {
            time: candle.open_time,
            balance: self.balance,
        });
    }

    /// Close the books. An open position at the end is left unrealised.
    pub fn finish(self, symbol: &str) -> BacktestReport {
        let trades = self.trades.len();
        let wins = self.trades.iter().filter(|t| t.pct > 0.0).count();
        let win_rate = if trades > 0 {
            wins as f64 / trades as f64 * 100.0
        } else {
            0.0
        };
        let initial = self.config.initial_balance;
        let return_pct = if initial > 0.0 {
            (self.balance - initial) / initial * 100.0
        } else {
            0.0
        };

        BacktestReport {
            symbol: symbol.to_string(),
            summary: Summary {
                trades,
                wins,
                losses: trades - wins,
                win_rate,
                final_balance: self.balance,
                return_pct,
            },
            config: self.config,
            trades: self.trades,
            equity: self.equity,
        }
    }
}

/// Replay `stack` over aligned rows.
pub fn simulate(
    symbol: &str,
    rows: &[AlignedRow],
    stack: &TrendStack,
    config: SimConfig,
) -> BacktestReport {
    let mut sim = Simulator::new(config);
    for row in rows {
        // Only evaluate while flat; the verdict is ignored otherwise.
        let signal = if sim.position().is_none() {
            stack
                .evaluate_aligned(symbol, row)
                .filter(|r| r.pass)
                .and_then(|r| r.side.side())
        } else {
            None
        };
        sim.step(&row.base, signal);
    }
    sim.finish(symbol)
}
