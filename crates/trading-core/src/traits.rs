use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{DataError, OracleError, PricePoint};

/// External historical price provider (network or file backed).
///
/// Implementations return the raw series for the requested range; caching,
/// ordering checks, and gap handling live in the market-data store.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError>;
}

/// External decision oracle: given a persona prompt and a market-context
/// block, returns raw text. The validator is the sole consumer of its output.
#[async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn decide(&self, prompt: &str, market_context: &str) -> Result<String, OracleError>;
}
