use serde::{Deserialize, Serialize};

/// The three summary cards the dashboard renders. Field names are the
/// dashboard's contract, camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSummary {
    pub total_trades: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    /// Mean confidence across decisions; 0 if empty.
    pub avg_confidence: f64,
    /// Mean expected profit percentage across decisions; 0 if empty.
    pub avg_expected_profit: f64,
}

/// Realized performance over a closed-trade log, in percent, rounded to
/// two decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub win_rate: f64,
    pub avg_return: f64,
    pub max_loss: f64,
    pub max_gain: f64,
}
