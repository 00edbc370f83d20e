use trading_core::{ClosedTrade, TradeAction, TradeDecision};

use crate::models::{DecisionSummary, PerformanceMetrics};

/// Aggregate a decision log into the dashboard's summary cards.
pub fn summarize_decisions(decisions: &[TradeDecision]) -> DecisionSummary {
    let total = decisions.len();
    if total == 0 {
        return DecisionSummary {
            total_trades: 0,
            buy_count: 0,
            sell_count: 0,
            avg_confidence: 0.0,
            avg_expected_profit: 0.0,
        };
    }

    let buy_count = decisions
        .iter()
        .filter(|d| d.action == TradeAction::Buy)
        .count();
    let sell_count = decisions
        .iter()
        .filter(|d| d.action == TradeAction::Sell)
        .count();
    let avg_confidence =
        decisions.iter().map(|d| d.confidence).sum::<f64>() / total as f64;
    let avg_expected_profit = decisions
        .iter()
        .map(|d| d.expected_profit_percentage)
        .sum::<f64>()
        / total as f64;

    DecisionSummary {
        total_trades: total,
        buy_count,
        sell_count,
        avg_confidence,
        avg_expected_profit,
    }
}

/// Realized performance over a closed-trade log. Empty log yields zeros.
pub fn summarize_trades(trades: &[ClosedTrade]) -> PerformanceMetrics {
    if trades.is_empty() {
        return PerformanceMetrics {
            win_rate: 0.0,
            avg_return: 0.0,
            max_loss: 0.0,
            max_gain: 0.0,
        };
    }

    let returns: Vec<f64> = trades.iter().map(|t| t.return_percent()).collect();
    let winners = trades
        .iter()
        .filter(|t| t.realized_pnl > rust_decimal::Decimal::ZERO)
        .count();

    PerformanceMetrics {
        win_rate: round2(winners as f64 / trades.len() as f64 * 100.0),
        avg_return: round2(returns.iter().sum::<f64>() / returns.len() as f64),
        max_loss: round2(returns.iter().copied().fold(f64::INFINITY, f64::min)),
        max_gain: round2(returns.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use trading_core::{ExitReason, Side};

    fn decision(action: TradeAction, ticker: &str, confidence: f64, profit: f64) -> TradeDecision {
        TradeDecision {
            action,
            ticker: ticker.to_string(),
            amount: 10,
            expected_profit_percentage: profit,
            confidence,
            reasoning: String::new(),
            timestamp: NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
        }
    }

    fn trade(entry: rust_decimal::Decimal, exit: rust_decimal::Decimal) -> ClosedTrade {
        let pnl = (exit - entry) * dec!(10);
        ClosedTrade {
            ticker: "NVDA".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2025, 1, 10).unwrap(),
            entry_price: entry,
            exit_price: exit,
            quantity: 10,
            side: Side::Long,
            fees: dec!(2),
            realized_pnl: pnl,
            exit_reason: ExitReason::Target,
        }
    }

    #[test]
    fn test_dashboard_reference_summary() {
        let decisions = vec![
            decision(TradeAction::Buy, "NVDA", 0.85, 2.5),
            decision(TradeAction::Sell, "AAPL", 0.75, 1.8),
        ];
        let summary = summarize_decisions(&decisions);

        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.buy_count, 1);
        assert_eq!(summary.sell_count, 1);
        assert!((summary.avg_confidence - 0.80).abs() < 1e-9);
        assert!((summary.avg_expected_profit - 2.15).abs() < 1e-9);
    }

    #[test]
    fn test_empty_decision_log_yields_zeros() {
        let summary = summarize_decisions(&[]);
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.avg_confidence, 0.0);
        assert_eq!(summary.avg_expected_profit, 0.0);
    }

    #[test]
    fn test_hold_counts_toward_totals_only() {
        let decisions = vec![
            decision(TradeAction::Buy, "NVDA", 0.9, 3.0),
            decision(TradeAction::Hold, "MSFT", 0.5, 0.0),
        ];
        let summary = summarize_decisions(&decisions);
        assert_eq!(summary.total_trades, 2);
        assert_eq!(summary.buy_count, 1);
        assert_eq!(summary.sell_count, 0);
    }

    #[test]
    fn test_trade_metrics() {
        let trades = vec![
            trade(dec!(100), dec!(110)), // +10%
            trade(dec!(100), dec!(95)),  // -5%
            trade(dec!(200), dec!(210)), // +5%
        ];
        let metrics = summarize_trades(&trades);

        assert_eq!(metrics.win_rate, 66.67);
        assert_eq!(metrics.avg_return, 3.33);
        assert_eq!(metrics.max_loss, -5.0);
        assert_eq!(metrics.max_gain, 10.0);
    }

    #[test]
    fn test_empty_trade_log_yields_zeros() {
        let metrics = summarize_trades(&[]);
        assert_eq!(metrics.win_rate, 0.0);
        assert_eq!(metrics.avg_return, 0.0);
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let summary = summarize_decisions(&[decision(TradeAction::Buy, "NVDA", 0.85, 2.5)]);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("totalTrades").is_some());
        assert!(json.get("buyCount").is_some());
        assert!(json.get("avgExpectedProfit").is_some());
    }
}
