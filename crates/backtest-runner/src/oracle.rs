use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use trading_core::{DecisionOracle, OracleError};

/// HTTP decision oracle: POSTs the persona prompt plus market context and
/// returns the raw completion text. The validator deals with whatever comes
/// back.
pub struct HttpOracle {
    url: String,
    client: Client,
}

#[derive(Serialize)]
struct OracleRequest<'a> {
    prompt: &'a str,
    market_context: &'a str,
}

#[derive(Deserialize)]
struct OracleResponse {
    text: String,
}

impl HttpOracle {
    pub fn new(url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { url, client }
    }
}

#[async_trait]
impl DecisionOracle for HttpOracle {
    async fn decide(&self, prompt: &str, market_context: &str) -> Result<String, OracleError> {
        let response = self
            .client
            .post(&self.url)
            .json(&OracleRequest {
                prompt,
                market_context,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout { attempts: 1 }
                } else {
                    OracleError::Request(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(OracleError::Request(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let body: OracleResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Request(e.to_string()))?;
        Ok(body.text)
    }
}

/// Ask the oracle, retrying timeouts with doubling backoff. Exhaustion is
/// recoverable at the persona-day level: the caller drops that decision and
/// the run continues.
pub async fn decide_with_retry(
    oracle: &dyn DecisionOracle,
    prompt: &str,
    market_context: &str,
    max_retries: u32,
    base_backoff: Duration,
) -> Result<String, OracleError> {
    let mut backoff = base_backoff;
    for attempt in 0..max_retries {
        match oracle.decide(prompt, market_context).await {
            Ok(text) => return Ok(text),
            Err(OracleError::Timeout { .. }) => {
                tracing::warn!(
                    attempt = attempt + 1,
                    max = max_retries,
                    "oracle timeout, backing off {:.1}s",
                    backoff.as_secs_f64()
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(other) => return Err(other),
        }
    }
    Err(OracleError::Timeout {
        attempts: max_retries,
    })
}
