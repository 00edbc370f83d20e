use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use analytics::{DecisionSummary, PerformanceMetrics};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use trading_core::LoggedDecision;

/// Per-persona block of the consolidated comparison file.
#[derive(Debug, Clone, Serialize)]
pub struct PersonaComparison {
    pub summary: DecisionSummary,
    pub performance: PerformanceMetrics,
    pub final_equity: Decimal,
    pub closed_trades: usize,
    pub open_positions: usize,
}

/// Write the ordered decision log the dashboard consumes: one JSON array
/// per run, each record carrying action, ticker, amount, expected profit,
/// confidence, reasoning, timestamp, plus the persona label and outcome.
pub fn write_decision_log(
    results_dir: &Path,
    run_id: &str,
    decisions: &[LoggedDecision],
) -> Result<PathBuf> {
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("creating results directory {}", results_dir.display()))?;
    let path = results_dir.join(format!("trading_decisions_{run_id}.json"));
    let json = serde_json::to_string_pretty(decisions)?;
    std::fs::write(&path, json)
        .with_context(|| format!("writing decision log {}", path.display()))?;
    tracing::info!(path = %path.display(), count = decisions.len(), "saved decision log");
    Ok(path)
}

/// Write the persona comparison file (win rate, average return, extremes
/// per persona).
pub fn write_comparison(
    results_dir: &Path,
    run_id: &str,
    comparison: &BTreeMap<String, PersonaComparison>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("creating results directory {}", results_dir.display()))?;
    let path = results_dir.join(format!("persona_comparison_{run_id}.json"));
    let json = serde_json::to_string_pretty(comparison)?;
    std::fs::write(&path, json)
        .with_context(|| format!("writing comparison report {}", path.display()))?;
    tracing::info!(path = %path.display(), personas = comparison.len(), "saved persona comparison");
    Ok(path)
}
