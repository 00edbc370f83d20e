use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use rust_decimal::prelude::*;
use serde::Deserialize;
use trading_core::{DataError, PriceProvider, PricePoint};

/// JSON-over-HTTP price provider.
///
/// Expects `GET {base_url}/v1/series/{TICKER}?start=YYYY-MM-DD&end=YYYY-MM-DD`
/// to return `{"results": [{"date", "open", "high", "low", "close", "volume"}]}`.
pub struct HttpDataProvider {
    base_url: String,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct SeriesResponse {
    #[serde(default)]
    results: Vec<SeriesBar>,
}

#[derive(Debug, Deserialize)]
struct SeriesBar {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl HttpDataProvider {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { base_url, client }
    }

    fn to_point(ticker: &str, bar: SeriesBar) -> Result<PricePoint, DataError> {
        let price = |v: f64, field: &str| {
            Decimal::from_f64(v).ok_or_else(|| DataError::MalformedSeries {
                ticker: ticker.to_string(),
                message: format!("non-finite {field} on {}", bar.date),
            })
        };
        Ok(PricePoint {
            date: bar.date,
            open: price(bar.open, "open")?,
            high: price(bar.high, "high")?,
            low: price(bar.low, "low")?,
            close: price(bar.close, "close")?,
            volume: bar.volume,
        })
    }
}

#[async_trait]
impl PriceProvider for HttpDataProvider {
    async fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let url = format!("{}/v1/series/{}", self.base_url, ticker);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("start", start.format("%Y-%m-%d").to_string()),
                ("end", end.format("%Y-%m-%d").to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DataError::Timeout {
                        attempts: 1,
                        message: e.to_string(),
                    }
                } else {
                    DataError::Provider(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(DataError::Provider(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let series: SeriesResponse = response
            .json()
            .await
            .map_err(|e| DataError::Provider(e.to_string()))?;

        series
            .results
            .into_iter()
            .map(|bar| Self::to_point(ticker, bar))
            .collect()
    }
}
