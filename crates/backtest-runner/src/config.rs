use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Which price provider backs the market-data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Csv,
    Http,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    // Directories
    pub data_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub results_dir: PathBuf,

    // Simulation window
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    // Portfolio parameters
    pub starting_cash: Decimal,
    pub fee_rate: Decimal,          // 0.001 = 0.1% per leg
    pub max_holding_days: i64,      // required, no default
    pub stop_loss_percent: f64,     // required, no default

    // Market data
    pub provider: ProviderKind,
    pub provider_url: Option<String>,
    pub provider_timeout_seconds: u64,
    pub price_lookback_days: i64,
    pub watchlist: Vec<String>,
    pub context_days: i64,          // trailing days shown to the oracle

    // Decision oracle
    pub oracle_url: String,
    pub oracle_timeout_seconds: u64,
    pub oracle_max_retries: u32,
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self> {
        let provider = match env::var("PRICE_PROVIDER")
            .unwrap_or_else(|_| "csv".to_string())
            .to_lowercase()
            .as_str()
        {
            "csv" => ProviderKind::Csv,
            "http" => ProviderKind::Http,
            other => anyhow::bail!("PRICE_PROVIDER must be 'csv' or 'http', got '{other}'"),
        };
        let provider_url = env::var("PRICE_PROVIDER_URL").ok();
        if provider == ProviderKind::Http && provider_url.is_none() {
            anyhow::bail!("PRICE_PROVIDER_URL is required when PRICE_PROVIDER=http");
        }

        let config = Self {
            data_dir: env::var("DATA_DIR")
                .unwrap_or_else(|_| "market_data".to_string())
                .into(),
            prompts_dir: env::var("PROMPTS_DIR")
                .unwrap_or_else(|_| "prompts".to_string())
                .into(),
            results_dir: env::var("RESULTS_DIR")
                .unwrap_or_else(|_| "backtest_results".to_string())
                .into(),

            start_date: parse_date("START_DATE")?,
            end_date: parse_date("END_DATE")?,

            starting_cash: env::var("STARTING_CASH")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("STARTING_CASH must be a decimal amount")?,
            fee_rate: env::var("FEE_RATE")
                .unwrap_or_else(|_| "0.001".to_string())
                .parse()
                .context("FEE_RATE must be a decimal rate")?,

            // Exit thresholds shape every simulated trade; they must be
            // chosen explicitly per run.
            max_holding_days: env::var("MAX_HOLDING_DAYS")
                .context("MAX_HOLDING_DAYS not set")?
                .parse()
                .context("MAX_HOLDING_DAYS must be an integer day count")?,
            stop_loss_percent: env::var("STOP_LOSS_PERCENT")
                .context("STOP_LOSS_PERCENT not set")?
                .parse()
                .context("STOP_LOSS_PERCENT must be a fraction, e.g. 0.05")?,

            provider,
            provider_url,
            provider_timeout_seconds: env::var("PRICE_PROVIDER_TIMEOUT")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            price_lookback_days: env::var("PRICE_LOOKBACK_DAYS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            watchlist: env::var("WATCHLIST")
                .unwrap_or_else(|_| "AAPL,MSFT,GOOGL,AMZN,NVDA,TSLA,META,AMD,NFLX".to_string())
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect(),
            context_days: env::var("CONTEXT_DAYS")
                .unwrap_or_else(|_| "14".to_string())
                .parse()?,

            oracle_url: env::var("ORACLE_URL").context("ORACLE_URL not set")?,
            oracle_timeout_seconds: env::var("ORACLE_TIMEOUT")
                .unwrap_or_else(|_| "90".to_string())
                .parse()?,
            oracle_max_retries: env::var("ORACLE_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,
        };

        if config.end_date < config.start_date {
            anyhow::bail!(
                "END_DATE {} is before START_DATE {}",
                config.end_date,
                config.start_date
            );
        }
        if config.max_holding_days <= 0 {
            anyhow::bail!("MAX_HOLDING_DAYS must be positive");
        }
        if !(0.0..1.0).contains(&config.stop_loss_percent) {
            anyhow::bail!("STOP_LOSS_PERCENT must be a fraction in [0, 1)");
        }

        Ok(config)
    }
}

fn parse_date(var: &str) -> Result<NaiveDate> {
    let raw = env::var(var).with_context(|| format!("{var} not set"))?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .with_context(|| format!("{var} must be YYYY-MM-DD, got '{raw}'"))
}
