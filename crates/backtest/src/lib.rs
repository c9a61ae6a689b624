pub mod runner;
pub mod simulator;

pub use runner::{run_backtest, BacktestConfig};
pub use simulator::{
    simulate, BacktestReport, EquityPoint, ExitKind, Position, SimConfig, Simulator, Summary,
    Trade,
};
