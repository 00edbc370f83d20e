use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use trading_core::{ClosedTrade, ExitReason, LedgerError, Position, Side};

/// Cash, open positions, and the closed-trade log for one backtest run.
///
/// At most one open position per ticker. Positions are stored in a
/// `BTreeMap` so iteration is always ticker-sorted; the engine's
/// reproducibility rides on this. Every operation validates fully
/// before mutating, so cash and position state never disagree.
pub struct PositionLedger {
    cash: Decimal,
    /// Proportional transaction cost applied on both entry and exit notional.
    fee_rate: Decimal,
    positions: BTreeMap<String, Position>,
    /// Entry fee per open ticker, charged against P&L when the leg closes.
    entry_fees: BTreeMap<String, Decimal>,
    closed_trades: Vec<ClosedTrade>,
}

impl PositionLedger {
    pub fn new(starting_cash: Decimal, fee_rate: Decimal) -> Self {
        Self {
            cash: starting_cash,
            fee_rate,
            positions: BTreeMap::new(),
            entry_fees: BTreeMap::new(),
            closed_trades: Vec::new(),
        }
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    /// Open positions, ticker-sorted.
    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, ticker: &str) -> Option<&Position> {
        self.positions.get(ticker)
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Open a position, debiting notional plus entry fee.
    ///
    /// Shorts reserve full collateral: same cash requirement as a long,
    /// no margin accounting.
    pub fn open(
        &mut self,
        ticker: &str,
        side: Side,
        quantity: u32,
        price: Decimal,
        date: NaiveDate,
    ) -> Result<&Position, LedgerError> {
        if self.positions.contains_key(ticker) {
            return Err(LedgerError::PositionExists(ticker.to_string()));
        }

        let notional = price * Decimal::from(quantity);
        let fee = notional * self.fee_rate;
        let required = notional + fee;
        if required > self.cash {
            return Err(LedgerError::InsufficientCash {
                ticker: ticker.to_string(),
                required,
                available: self.cash,
            });
        }

        self.cash -= required;
        self.entry_fees.insert(ticker.to_string(), fee);
        let position = Position {
            ticker: ticker.to_string(),
            entry_date: date,
            entry_price: price,
            quantity,
            side,
        };
        tracing::debug!(
            ticker,
            quantity,
            price = %price,
            fee = %fee,
            cash = %self.cash,
            "opened position"
        );
        Ok(self
            .positions
            .entry(ticker.to_string())
            .or_insert(position))
    }

    /// Close the open position for `ticker`, crediting exit proceeds net of
    /// the exit fee and recording the round trip.
    pub fn close(
        &mut self,
        ticker: &str,
        price: Decimal,
        date: NaiveDate,
        reason: ExitReason,
    ) -> Result<ClosedTrade, LedgerError> {
        let position = self
            .positions
            .get(ticker)
            .ok_or_else(|| LedgerError::NoOpenPosition(ticker.to_string()))?
            .clone();

        let qty = Decimal::from(position.quantity);
        let exit_notional = price * qty;
        let exit_fee = exit_notional * self.fee_rate;
        let entry_fee = self
            .entry_fees
            .get(ticker)
            .copied()
            .unwrap_or(Decimal::ZERO);

        let sign = Decimal::from(position.side.direction_sign());
        let gross = (price - position.entry_price) * qty * sign;
        let realized_pnl = gross - entry_fee - exit_fee;

        // Long: sale proceeds. Short: collateral back plus gross P&L.
        let credit = match position.side {
            Side::Long => exit_notional - exit_fee,
            Side::Short => position.entry_price * qty + gross - exit_fee,
        };

        self.positions.remove(ticker);
        self.entry_fees.remove(ticker);
        self.cash += credit;

        let trade = ClosedTrade {
            ticker: ticker.to_string(),
            entry_date: position.entry_date,
            exit_date: date,
            entry_price: position.entry_price,
            exit_price: price,
            quantity: position.quantity,
            side: position.side,
            fees: entry_fee + exit_fee,
            realized_pnl,
            exit_reason: reason,
        };
        tracing::debug!(
            ticker,
            pnl = %realized_pnl,
            reason = ?reason,
            cash = %self.cash,
            "closed position"
        );
        self.closed_trades.push(trade.clone());
        Ok(trade)
    }

    /// Marked-to-market equity: cash plus every position valued at the
    /// supplied price (entry price when a ticker is missing from the map).
    pub fn mark_to_market(&self, prices: &BTreeMap<String, Decimal>) -> Decimal {
        let positions_value: Decimal = self
            .positions
            .values()
            .map(|p| p.market_value(prices.get(&p.ticker).copied().unwrap_or(p.entry_price)))
            .sum();
        self.cash + positions_value
    }

    /// Consume the ledger into its trade log.
    pub fn into_closed_trades(self) -> Vec<ClosedTrade> {
        self.closed_trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, day).unwrap()
    }

    fn ledger() -> PositionLedger {
        PositionLedger::new(dec!(10000), dec!(0.001))
    }

    #[test]
    fn test_open_debits_notional_plus_fee() {
        let mut ledger = ledger();
        ledger.open("NVDA", Side::Long, 10, dec!(100), d(2)).unwrap();
        // 10000 - 1000 * 1.001
        assert_eq!(ledger.cash(), dec!(8999.0));
        assert_eq!(ledger.positions().len(), 1);
    }

    #[test]
    fn test_close_realizes_pnl_net_of_both_fees() {
        let mut ledger = ledger();
        ledger.open("NVDA", Side::Long, 10, dec!(100), d(2)).unwrap();
        let trade = ledger.close("NVDA", dec!(110), d(6), ExitReason::Target).unwrap();

        // (110 - 100) * 10 - 1.0 entry fee - 1.1 exit fee
        assert_eq!(trade.realized_pnl, dec!(97.9));
        assert_eq!(trade.fees, dec!(2.1));
        assert_eq!(trade.exit_reason, ExitReason::Target);
        assert_eq!(ledger.cash(), dec!(10097.9));
        assert!(ledger.positions().is_empty());
    }

    #[test]
    fn test_insufficient_cash_rejected_before_mutation() {
        let mut ledger = ledger();
        let err = ledger.open("NVDA", Side::Long, 200, dec!(100), d(2)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientCash { .. }));
        assert_eq!(ledger.cash(), dec!(10000));
        assert!(ledger.positions().is_empty());
    }

    #[test]
    fn test_one_position_per_ticker() {
        let mut ledger = ledger();
        ledger.open("NVDA", Side::Long, 10, dec!(100), d(2)).unwrap();
        let err = ledger.open("NVDA", Side::Long, 5, dec!(101), d(3)).unwrap_err();
        assert_eq!(err, LedgerError::PositionExists("NVDA".to_string()));
        assert_eq!(ledger.position("NVDA").unwrap().quantity, 10);
    }

    #[test]
    fn test_close_without_position() {
        let mut ledger = ledger();
        let err = ledger.close("NVDA", dec!(100), d(2), ExitReason::Manual).unwrap_err();
        assert_eq!(err, LedgerError::NoOpenPosition("NVDA".to_string()));
    }

    #[test]
    fn test_cash_never_negative_across_sequences() {
        let mut ledger = PositionLedger::new(dec!(1000), dec!(0.001));
        for day in 2..=10 {
            let _ = ledger.open("NVDA", Side::Long, 9, dec!(100), d(day));
            assert!(ledger.cash() >= Decimal::ZERO);
            let _ = ledger.close("NVDA", dec!(50), d(day), ExitReason::Stop);
            assert!(ledger.cash() >= Decimal::ZERO);
        }
    }

    #[test]
    fn test_mark_to_market() {
        let mut ledger = ledger();
        ledger.open("NVDA", Side::Long, 10, dec!(100), d(2)).unwrap();
        ledger.open("AAPL", Side::Long, 5, dec!(200), d(2)).unwrap();

        let mut prices = BTreeMap::new();
        prices.insert("NVDA".to_string(), dec!(110));
        prices.insert("AAPL".to_string(), dec!(190));

        // cash 10000 - 1001 - 1001 = 7998; positions 1100 + 950
        assert_eq!(ledger.mark_to_market(&prices), dec!(10048.0));

        // Missing price falls back to entry basis.
        prices.remove("AAPL");
        assert_eq!(ledger.mark_to_market(&prices), dec!(10098.0));
    }

    #[test]
    fn test_short_round_trip_uses_direction_sign() {
        let mut ledger = ledger();
        ledger.open("TSLA", Side::Short, 10, dec!(100), d(2)).unwrap();
        assert_eq!(ledger.cash(), dec!(8999.0));

        let trade = ledger.close("TSLA", dec!(90), d(5), ExitReason::Manual).unwrap();
        // (90 - 100) * 10 * -1 - 1.0 - 0.9
        assert_eq!(trade.realized_pnl, dec!(98.1));
        // Collateral 1000 + gross 100 - exit fee 0.9
        assert_eq!(ledger.cash(), dec!(10098.1));
    }
}
