use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Action vocabulary the decision oracle is allowed to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Buy,
    Sell,
    Hold,
}

impl TradeAction {
    /// Parse a raw action string case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "BUY" => Some(TradeAction::Buy),
            "SELL" => Some(TradeAction::Sell),
            "HOLD" => Some(TradeAction::Hold),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
            TradeAction::Hold => "HOLD",
        }
    }
}

/// A validated trading decision. Immutable once produced by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeDecision {
    pub action: TradeAction,
    pub ticker: String,
    /// Number of shares. Always > 0.
    pub amount: u32,
    pub expected_profit_percentage: f64,
    /// In [0, 1]. Values outside the range are rejected by the validator.
    pub confidence: f64,
    pub reasoning: String,
    pub timestamp: NaiveDate,
}

/// One OHLCV point for a ticker/day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: f64,
}

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short. P&L = (exit - entry) * qty * sign.
    pub fn direction_sign(&self) -> i32 {
        match self {
            Side::Long => 1,
            Side::Short => -1,
        }
    }
}

/// An open position. Owned by the ledger; converted to a ClosedTrade on exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub entry_price: Decimal,
    pub quantity: u32,
    pub side: Side,
}

impl Position {
    /// Market value at the given price (entry basis + open P&L for shorts).
    pub fn market_value(&self, price: Decimal) -> Decimal {
        let qty = Decimal::from(self.quantity);
        match self.side {
            Side::Long => price * qty,
            Side::Short => (self.entry_price + (self.entry_price - price)) * qty,
        }
    }
}

/// Why a position was exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    /// Profit target reached.
    Target,
    /// Stop-loss threshold breached.
    Stop,
    /// Max holding period elapsed.
    TimeLimit,
    /// Closed by an explicit SELL decision.
    Manual,
}

/// A completed round trip. Append-only log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub ticker: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    pub quantity: u32,
    pub side: Side,
    /// Entry fee + exit fee.
    pub fees: Decimal,
    pub realized_pnl: Decimal,
    pub exit_reason: ExitReason,
}

impl ClosedTrade {
    /// Return on entry notional, in percent.
    pub fn return_percent(&self) -> f64 {
        use rust_decimal::prelude::ToPrimitive;
        let entry = self.entry_price.to_f64().unwrap_or(0.0);
        let exit = self.exit_price.to_f64().unwrap_or(0.0);
        if entry <= 0.0 {
            return 0.0;
        }
        ((exit - entry) / entry) * 100.0 * self.side.direction_sign() as f64
    }
}

/// What the engine did with a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "detail")]
pub enum DecisionOutcome {
    /// Opened or closed a position.
    Applied,
    /// HOLD, or a no-op by policy (e.g. BUY on an already-open ticker).
    Noop,
    /// Dropped with the ledger/validation reason.
    Rejected(String),
}

/// A decision as it appears in the run log: persona-tagged, with outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedDecision {
    pub persona: String,
    #[serde(flatten)]
    pub decision: TradeDecision,
    pub outcome: DecisionOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_action_parse_case_insensitive() {
        assert_eq!(TradeAction::parse("buy"), Some(TradeAction::Buy));
        assert_eq!(TradeAction::parse(" SELL "), Some(TradeAction::Sell));
        assert_eq!(TradeAction::parse("Hold"), Some(TradeAction::Hold));
        assert_eq!(TradeAction::parse("SHORT"), None);
    }

    #[test]
    fn test_direction_sign() {
        assert_eq!(Side::Long.direction_sign(), 1);
        assert_eq!(Side::Short.direction_sign(), -1);
    }

    #[test]
    fn test_position_market_value() {
        let pos = Position {
            ticker: "NVDA".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            entry_price: dec!(100),
            quantity: 10,
            side: Side::Long,
        };
        assert_eq!(pos.market_value(dec!(110)), dec!(1100));

        let short = Position { side: Side::Short, ..pos };
        // Short gains when price drops: 100 + (100 - 90) = 110 per share.
        assert_eq!(short.market_value(dec!(90)), dec!(1100));
    }

    #[test]
    fn test_closed_trade_return_percent() {
        let trade = ClosedTrade {
            ticker: "NVDA".to_string(),
            entry_date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            entry_price: dec!(100),
            exit_price: dec!(110),
            quantity: 10,
            side: Side::Long,
            fees: dec!(2.1),
            realized_pnl: dec!(97.9),
            exit_reason: ExitReason::Target,
        };
        assert!((trade.return_percent() - 10.0).abs() < 1e-9);
    }
}
