use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use trading_core::{ClosedTrade, LoggedDecision, TradeDecision};

/// Configuration for one backtest run.
///
/// `max_holding_days` and `stop_loss_percent` have no defaults on purpose:
/// they shape every exit and must come from explicit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_cash: Decimal,
    /// Proportional cost on both entry and exit notional, e.g. 0.001 = 0.1%.
    pub fee_rate: Decimal,
    /// Forced time-based exit after this many calendar days.
    pub max_holding_days: i64,
    /// Loss fraction of entry that triggers a stop exit, e.g. 0.05 = 5%.
    pub stop_loss_percent: f64,
}

/// A validated decision tagged with the persona that produced it.
///
/// Persona identity is an opaque label; the engine never inspects it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonaDecision {
    pub persona: String,
    pub decision: TradeDecision,
}

/// Run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Initialized,
    Running,
    Completed,
    Failed,
}

/// Marked-to-market equity at the end of one simulated day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: Decimal,
}

/// Everything a completed run produces: the persona-tagged decision log,
/// the closed-trade log, and the equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub starting_cash: Decimal,
    pub final_cash: Decimal,
    pub final_equity: Decimal,
    /// Positions still open when the run ended (not force-liquidated).
    pub open_positions: usize,
    /// Distinct persona labels seen in the input, sorted.
    pub personas: Vec<String>,
    pub decisions: Vec<LoggedDecision>,
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}
