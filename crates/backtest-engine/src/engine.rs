use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use market_data::MarketDataStore;
use position_ledger::PositionLedger;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use trading_core::{
    DecisionOutcome, EngineError, ExitReason, LedgerError, LoggedDecision, Position, Side,
    TradeAction,
};

use crate::models::*;

/// Day-by-day replay of validated trade decisions against historical
/// prices.
///
/// One engine drives one run over one portfolio. Exit conditions are
/// checked in fixed priority (target, then time limit, then stop) over
/// positions in ticker-sorted order, so identical inputs always replay
/// identically. A missing price with no in-window fallback fails the run
/// outright; skipping the day would silently corrupt P&L attribution.
pub struct BacktestEngine {
    config: BacktestConfig,
    store: MarketDataStore,
    state: RunState,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig, store: MarketDataStore) -> Self {
        Self {
            config,
            store,
            state: RunState::Initialized,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute the run. Consumable once; the report carries the full
    /// decision log, trade log, and equity curve.
    pub async fn run(
        &mut self,
        decisions: Vec<PersonaDecision>,
    ) -> Result<BacktestReport, EngineError> {
        if self.state != RunState::Initialized {
            return Err(EngineError::AlreadyRun);
        }
        self.state = RunState::Running;

        match self.run_inner(decisions).await {
            Ok(report) => {
                self.state = RunState::Completed;
                Ok(report)
            }
            Err(err) => {
                self.state = RunState::Failed;
                tracing::error!(error = %err, "backtest run failed");
                Err(err)
            }
        }
    }

    async fn run_inner(
        &self,
        decisions: Vec<PersonaDecision>,
    ) -> Result<BacktestReport, EngineError> {
        let mut ledger = PositionLedger::new(self.config.starting_cash, self.config.fee_rate);
        // Profit target (percent of entry) per open ticker.
        let mut targets: BTreeMap<String, f64> = BTreeMap::new();
        let mut decision_log: Vec<LoggedDecision> = Vec::new();
        let mut trades = Vec::new();
        let mut equity_curve: Vec<EquityPoint> = Vec::new();

        let mut personas: BTreeSet<String> = BTreeSet::new();
        let mut by_date: BTreeMap<NaiveDate, Vec<PersonaDecision>> = BTreeMap::new();
        for pd in decisions {
            personas.insert(pd.persona.clone());
            let date = pd.decision.timestamp;
            if date < self.config.start_date || date > self.config.end_date {
                tracing::warn!(
                    persona = %pd.persona,
                    ticker = %pd.decision.ticker,
                    %date,
                    "decision outside run range, ignoring"
                );
                continue;
            }
            by_date.entry(date).or_default().push(pd);
        }

        let mut day = self.config.start_date;
        while day <= self.config.end_date {
            let mut day_prices: BTreeMap<String, Decimal> = BTreeMap::new();
            let mut closed_today: BTreeSet<String> = BTreeSet::new();

            // 1. Exit checks over open positions, ticker-sorted.
            let open: Vec<Position> = ledger.positions().values().cloned().collect();
            let mut to_close: Vec<(String, Decimal, ExitReason)> = Vec::new();
            for position in &open {
                let close = self.fetch_close(&position.ticker, day).await?;
                day_prices.insert(position.ticker.clone(), close);
                let target = targets.get(&position.ticker).copied();
                if let Some(reason) = self.exit_reason(position, close, target, day) {
                    to_close.push((position.ticker.clone(), close, reason));
                }
            }
            for (ticker, close, reason) in to_close {
                if let Ok(trade) = ledger.close(&ticker, close, day, reason) {
                    tracing::info!(
                        %ticker,
                        %day,
                        reason = ?reason,
                        pnl = %trade.realized_pnl,
                        "position exited"
                    );
                    trades.push(trade);
                }
                targets.remove(&ticker);
                closed_today.insert(ticker);
            }

            // 2. Apply the day's decisions in arrival order.
            if let Some(day_decisions) = by_date.get(&day) {
                for pd in day_decisions {
                    let outcome = self
                        .apply_decision(
                            pd,
                            day,
                            &mut ledger,
                            &mut targets,
                            &mut closed_today,
                            &mut day_prices,
                            &mut trades,
                        )
                        .await?;
                    decision_log.push(LoggedDecision {
                        persona: pd.persona.clone(),
                        decision: pd.decision.clone(),
                        outcome,
                    });
                }
            }

            // 3. Mark-to-market snapshot. Every open position already has a
            // price in day_prices from steps 1-2.
            equity_curve.push(EquityPoint {
                date: day,
                equity: ledger.mark_to_market(&day_prices),
            });

            day += chrono::Duration::days(1);
        }

        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.config.starting_cash);

        Ok(BacktestReport {
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            starting_cash: self.config.starting_cash,
            final_cash: ledger.cash(),
            final_equity,
            open_positions: ledger.positions().len(),
            personas: personas.into_iter().collect(),
            decisions: decision_log,
            trades,
            equity_curve,
        })
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_decision(
        &self,
        pd: &PersonaDecision,
        day: NaiveDate,
        ledger: &mut PositionLedger,
        targets: &mut BTreeMap<String, f64>,
        closed_today: &mut BTreeSet<String>,
        day_prices: &mut BTreeMap<String, Decimal>,
        trades: &mut Vec<trading_core::ClosedTrade>,
    ) -> Result<DecisionOutcome, EngineError> {
        let decision = &pd.decision;
        let ticker = decision.ticker.as_str();

        match decision.action {
            TradeAction::Hold => Ok(DecisionOutcome::Noop),

            // Same-day conflict: this ticker already exited today.
            TradeAction::Buy | TradeAction::Sell if closed_today.contains(ticker) => {
                tracing::info!(
                    persona = %pd.persona,
                    %ticker,
                    %day,
                    "decision skipped: ticker already exited today"
                );
                Ok(DecisionOutcome::Noop)
            }

            TradeAction::Buy => {
                if ledger.position(ticker).is_some() {
                    // Policy: no averaging into an open position.
                    tracing::info!(
                        persona = %pd.persona,
                        %ticker,
                        "BUY for already-open ticker is a no-op"
                    );
                    return Ok(DecisionOutcome::Noop);
                }
                let close = match day_prices.get(ticker) {
                    Some(p) => *p,
                    None => {
                        let p = self.fetch_close(ticker, day).await?;
                        day_prices.insert(ticker.to_string(), p);
                        p
                    }
                };
                match ledger.open(ticker, Side::Long, decision.amount, close, day) {
                    Ok(_) => {
                        targets.insert(ticker.to_string(), decision.expected_profit_percentage);
                        Ok(DecisionOutcome::Applied)
                    }
                    Err(err) => {
                        tracing::warn!(
                            persona = %pd.persona,
                            %ticker,
                            %day,
                            error = %err,
                            "decision rejected by ledger"
                        );
                        Ok(DecisionOutcome::Rejected(err.to_string()))
                    }
                }
            }

            TradeAction::Sell => {
                if ledger.position(ticker).is_none() {
                    let err = LedgerError::NoOpenPosition(ticker.to_string());
                    tracing::warn!(
                        persona = %pd.persona,
                        %ticker,
                        %day,
                        error = %err,
                        "decision rejected by ledger"
                    );
                    return Ok(DecisionOutcome::Rejected(err.to_string()));
                }
                let close = match day_prices.get(ticker) {
                    Some(p) => *p,
                    None => {
                        let p = self.fetch_close(ticker, day).await?;
                        day_prices.insert(ticker.to_string(), p);
                        p
                    }
                };
                match ledger.close(ticker, close, day, ExitReason::Manual) {
                    Ok(trade) => {
                        tracing::info!(
                            persona = %pd.persona,
                            %ticker,
                            %day,
                            pnl = %trade.realized_pnl,
                            "position closed by SELL decision"
                        );
                        trades.push(trade);
                        targets.remove(ticker);
                        closed_today.insert(ticker.to_string());
                        Ok(DecisionOutcome::Applied)
                    }
                    Err(err) => Ok(DecisionOutcome::Rejected(err.to_string())),
                }
            }
        }
    }

    /// First matching exit wins: TARGET, then TIME_LIMIT, then STOP.
    fn exit_reason(
        &self,
        position: &Position,
        close: Decimal,
        target_percent: Option<f64>,
        day: NaiveDate,
    ) -> Option<ExitReason> {
        let entry = position.entry_price.to_f64().unwrap_or(0.0);
        let price = close.to_f64().unwrap_or(0.0);
        if entry <= 0.0 {
            return None;
        }
        let gain_percent =
            (price - entry) / entry * 100.0 * position.side.direction_sign() as f64;

        if let Some(target) = target_percent {
            if gain_percent >= target {
                return Some(ExitReason::Target);
            }
        }
        if (day - position.entry_date).num_days() >= self.config.max_holding_days {
            return Some(ExitReason::TimeLimit);
        }
        if -gain_percent / 100.0 >= self.config.stop_loss_percent {
            return Some(ExitReason::Stop);
        }
        None
    }

    async fn fetch_close(&self, ticker: &str, date: NaiveDate) -> Result<Decimal, EngineError> {
        match self.store.get_price(ticker, date).await {
            Ok(point) => Ok(point.close),
            Err(source) => Err(EngineError::Data {
                ticker: ticker.to_string(),
                date,
                source,
            }),
        }
    }
}
