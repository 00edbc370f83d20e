use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use backtest_engine::{BacktestConfig, BacktestEngine, BacktestReport, PersonaDecision};
use decision_validator::ResponseValidator;
use market_data::{CsvDataProvider, HttpDataProvider, MarketDataStore, StoreConfig};
use trading_core::{DecisionOracle, LoggedDecision, PriceProvider, TradeDecision};
use uuid::Uuid;

mod config;
mod context;
mod oracle;
mod personas;
mod report;

use config::{ProviderKind, RunnerConfig};
use context::build_market_context;
use oracle::{decide_with_retry, HttpOracle};
use personas::{load_personas, Persona};
use report::PersonaComparison;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    tracing::info!("Starting persona backtest runner");

    // 2. Load configuration
    let config = Arc::new(RunnerConfig::from_env()?);
    tracing::info!("Configuration loaded");
    tracing::info!("  Window: {} to {}", config.start_date, config.end_date);
    tracing::info!("  Starting cash: {}", config.starting_cash);
    tracing::info!("  Fee rate: {}", config.fee_rate);
    tracing::info!("  Max holding: {} days", config.max_holding_days);
    tracing::info!("  Stop loss: {:.1}%", config.stop_loss_percent * 100.0);

    // 3. Market-data store over the configured provider
    let provider: Arc<dyn PriceProvider> = match config.provider {
        ProviderKind::Csv => {
            tracing::info!("Price provider: local CSV ({})", config.data_dir.display());
            Arc::new(CsvDataProvider::new(&config.data_dir))
        }
        ProviderKind::Http => {
            let url = config
                .provider_url
                .clone()
                .unwrap_or_default();
            tracing::info!("Price provider: HTTP ({url})");
            Arc::new(HttpDataProvider::new(
                url,
                Duration::from_secs(config.provider_timeout_seconds),
            ))
        }
    };
    let store = MarketDataStore::new(
        provider,
        StoreConfig {
            lookback_days: config.price_lookback_days,
            ..StoreConfig::default()
        },
    );

    // 4. Personas and oracle
    let personas = load_personas(&config.prompts_dir)?;
    tracing::info!("Loaded {} personas", personas.len());
    let oracle: Arc<dyn DecisionOracle> = Arc::new(HttpOracle::new(
        config.oracle_url.clone(),
        Duration::from_secs(config.oracle_timeout_seconds),
    ));

    // 5. One independent run per persona. Portfolios share nothing; the
    // store is the only shared resource and is safe for concurrent reads.
    let run_id = Uuid::new_v4();
    let mut tasks = tokio::task::JoinSet::new();
    for persona in personas {
        let store = store.clone();
        let oracle = Arc::clone(&oracle);
        let config = Arc::clone(&config);
        tasks.spawn(async move {
            let name = persona.name.clone();
            let result = run_persona(&persona, store, oracle, &config).await;
            (name, result)
        });
    }

    let mut all_decisions: Vec<LoggedDecision> = Vec::new();
    let mut comparison: BTreeMap<String, PersonaComparison> = BTreeMap::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(run_report))) => {
                let decisions: Vec<TradeDecision> = run_report
                    .decisions
                    .iter()
                    .map(|d| d.decision.clone())
                    .collect();
                let summary = analytics::summarize_decisions(&decisions);
                let performance = analytics::summarize_trades(&run_report.trades);
                tracing::info!(
                    persona = %name,
                    win_rate = performance.win_rate,
                    avg_return = performance.avg_return,
                    final_equity = %run_report.final_equity,
                    "persona run completed"
                );
                comparison.insert(
                    name,
                    PersonaComparison {
                        summary,
                        performance,
                        final_equity: run_report.final_equity,
                        closed_trades: run_report.trades.len(),
                        open_positions: run_report.open_positions,
                    },
                );
                all_decisions.extend(run_report.decisions);
            }
            Ok((name, Err(err))) => {
                // One persona failing must not take down the others.
                tracing::error!(persona = %name, error = %err, "persona run failed");
            }
            Err(err) => {
                tracing::error!(error = %err, "persona task panicked");
            }
        }
    }

    // 6. Consolidated artifacts: deterministic order by day, then persona.
    all_decisions.sort_by(|a, b| {
        a.decision
            .timestamp
            .cmp(&b.decision.timestamp)
            .then_with(|| a.persona.cmp(&b.persona))
    });
    report::write_decision_log(&config.results_dir, &run_id.to_string(), &all_decisions)?;
    report::write_comparison(&config.results_dir, &run_id.to_string(), &comparison)?;

    tracing::info!(%run_id, personas = comparison.len(), "backtest run complete");
    Ok(())
}

/// Drive one persona through the full window: ask the oracle each day,
/// validate, then replay the surviving decisions through a fresh engine.
async fn run_persona(
    persona: &Persona,
    store: MarketDataStore,
    oracle: Arc<dyn DecisionOracle>,
    config: &RunnerConfig,
) -> Result<BacktestReport> {
    let validator = ResponseValidator::new();
    let mut decisions = Vec::new();

    let mut day = config.start_date;
    while day <= config.end_date {
        let market_context =
            build_market_context(&store, &config.watchlist, day, config.context_days).await;

        let raw = match decide_with_retry(
            oracle.as_ref(),
            &persona.prompt,
            &market_context,
            config.oracle_max_retries,
            Duration::from_millis(500),
        )
        .await
        {
            Ok(raw) => raw,
            Err(err) => {
                tracing::warn!(
                    persona = %persona.name,
                    %day,
                    error = %err,
                    "oracle unavailable, decision dropped"
                );
                day += chrono::Duration::days(1);
                continue;
            }
        };

        match validator.validate(&raw, day) {
            Ok(decision) => decisions.push(PersonaDecision {
                persona: persona.name.clone(),
                decision,
            }),
            Err(err) => {
                tracing::warn!(
                    persona = %persona.name,
                    %day,
                    kind = err.kind(),
                    error = %err,
                    "invalid oracle response, decision dropped"
                );
            }
        }
        day += chrono::Duration::days(1);
    }

    let engine_config = BacktestConfig {
        start_date: config.start_date,
        end_date: config.end_date,
        starting_cash: config.starting_cash,
        fee_rate: config.fee_rate,
        max_holding_days: config.max_holding_days,
        stop_loss_percent: config.stop_loss_percent,
    };
    let mut engine = BacktestEngine::new(engine_config, store);
    let run_report = engine.run(decisions).await?;
    Ok(run_report)
}
