use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use trading_core::{DataError, PriceProvider, PricePoint};

mod csv_provider;
mod http_provider;

pub use csv_provider::CsvDataProvider;
pub use http_provider::HttpDataProvider;

type SeriesKey = (String, NaiveDate, NaiveDate);

/// Store tuning knobs.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Max days a stale price may be reused to fill a data gap.
    pub lookback_days: i64,
    /// Provider timeout retries before giving up.
    pub max_retries: u32,
    /// Base backoff between retries (doubled per attempt).
    pub retry_backoff: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            lookback_days: 5,
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

/// Read-only historical price store: caching and gap handling over an
/// external [`PriceProvider`].
///
/// Cache entries are keyed by full request range and immutable once
/// fetched. Concurrent population of the same key is idempotent (last
/// writer wins with identical data), so the store is cheap to clone and
/// safe to share across parallel backtest runs.
#[derive(Clone)]
pub struct MarketDataStore {
    provider: Arc<dyn PriceProvider>,
    cache: Arc<DashMap<SeriesKey, Arc<[PricePoint]>>>,
    config: StoreConfig,
}

impl MarketDataStore {
    pub fn new(provider: Arc<dyn PriceProvider>, config: StoreConfig) -> Self {
        Self {
            provider,
            cache: Arc::new(DashMap::new()),
            config,
        }
    }

    pub fn lookback_days(&self) -> i64 {
        self.config.lookback_days
    }

    /// Ordered series for the full range. Full-range fetch per distinct
    /// request; no partial-range merging.
    pub async fn get_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Arc<[PricePoint]>, DataError> {
        let key = (ticker.to_string(), start, end);
        if let Some(series) = self.cache.get(&key) {
            return Ok(Arc::clone(&series));
        }

        let mut series = self.fetch_with_retry(ticker, start, end).await?;
        series.sort_by_key(|p| p.date);
        for pair in series.windows(2) {
            if pair[0].date == pair[1].date {
                return Err(DataError::MalformedSeries {
                    ticker: ticker.to_string(),
                    message: format!("duplicate date {}", pair[0].date),
                });
            }
        }

        let series: Arc<[PricePoint]> = series.into();
        self.cache.insert(key, Arc::clone(&series));
        Ok(series)
    }

    /// Price for a single date. Falls back to the most recent prior trading
    /// day within the lookback window (weekends, holidays), else NotFound.
    pub async fn get_price(&self, ticker: &str, date: NaiveDate) -> Result<PricePoint, DataError> {
        let window_start = date - chrono::Duration::days(self.config.lookback_days);

        let series = match self.find_covering(ticker, window_start, date) {
            Some(series) => series,
            None => self.get_series(ticker, window_start, date).await?,
        };

        series
            .iter()
            .rev()
            .find(|p| p.date <= date && p.date >= window_start)
            .cloned()
            .ok_or_else(|| DataError::NotFound {
                ticker: ticker.to_string(),
                date,
            })
    }

    /// Reuse any cached range that already covers the window.
    fn find_covering(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Option<Arc<[PricePoint]>> {
        self.cache.iter().find_map(|entry| {
            let (t, s, e) = entry.key();
            if t == ticker && *s <= start && *e >= end {
                Some(Arc::clone(entry.value()))
            } else {
                None
            }
        })
    }

    /// Fetch through the provider, retrying timeouts with doubling backoff.
    async fn fetch_with_retry(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let mut backoff = self.config.retry_backoff;
        let mut last_message = String::new();

        for attempt in 0..self.config.max_retries {
            match self.provider.fetch_series(ticker, start, end).await {
                Ok(series) => return Ok(series),
                Err(DataError::Timeout { message, .. }) => {
                    tracing::warn!(
                        ticker,
                        attempt = attempt + 1,
                        max = self.config.max_retries,
                        "provider timeout, backing off {:.1}s",
                        backoff.as_secs_f64()
                    );
                    last_message = message;
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(other) => return Err(other),
            }
        }

        Err(DataError::Timeout {
            attempts: self.config.max_retries,
            message: last_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn point(date: NaiveDate, close: rust_decimal::Decimal) -> PricePoint {
        PricePoint {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000_000.0,
        }
    }

    /// Weekday-only series with a shared fetch counter.
    struct FakeProvider {
        fetches: Arc<AtomicUsize>,
        timeouts_before_success: usize,
    }

    impl FakeProvider {
        fn new() -> Self {
            Self {
                fetches: Arc::new(AtomicUsize::new(0)),
                timeouts_before_success: 0,
            }
        }
    }

    #[async_trait]
    impl PriceProvider for FakeProvider {
        async fn fetch_series(
            &self,
            _ticker: &str,
            start: NaiveDate,
            end: NaiveDate,
        ) -> Result<Vec<PricePoint>, DataError> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if n < self.timeouts_before_success {
                return Err(DataError::Timeout {
                    attempts: 1,
                    message: "simulated".to_string(),
                });
            }
            use chrono::Datelike;
            let mut series = Vec::new();
            let mut date = start;
            while date <= end {
                if date.weekday().number_from_monday() <= 5 {
                    series.push(point(date, dec!(100)));
                }
                date += chrono::Duration::days(1);
            }
            Ok(series)
        }
    }

    fn store(provider: FakeProvider) -> MarketDataStore {
        let config = StoreConfig {
            retry_backoff: Duration::from_millis(1),
            ..StoreConfig::default()
        };
        MarketDataStore::new(Arc::new(provider), config)
    }

    #[tokio::test]
    async fn test_series_cached_by_range() {
        let s = store(FakeProvider::new());
        let a = s.get_series("NVDA", d(2025, 1, 6), d(2025, 1, 10)).await.unwrap();
        let b = s.get_series("NVDA", d(2025, 1, 6), d(2025, 1, 10)).await.unwrap();
        assert_eq!(a.len(), 5);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_weekend_falls_back_to_friday() {
        let s = store(FakeProvider::new());
        // 2025-01-11 is a Saturday; Friday 2025-01-10 should be served.
        let p = s.get_price("NVDA", d(2025, 1, 11)).await.unwrap();
        assert_eq!(p.date, d(2025, 1, 10));
    }

    #[tokio::test]
    async fn test_gap_beyond_lookback_is_not_found() {
        let provider = FakeProvider::new();
        let config = StoreConfig {
            lookback_days: 1,
            retry_backoff: Duration::from_millis(1),
            ..StoreConfig::default()
        };
        let s = MarketDataStore::new(Arc::new(provider), config);
        // Sunday with a 1-day lookback only reaches Saturday: no trading day.
        let err = s.get_price("NVDA", d(2025, 1, 12)).await.unwrap_err();
        match err {
            DataError::NotFound { ticker, date } => {
                assert_eq!(ticker, "NVDA");
                assert_eq!(date, d(2025, 1, 12));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_price_served_from_covering_range() {
        let provider = FakeProvider::new();
        let fetches = Arc::clone(&provider.fetches);
        let s = store(provider);
        s.get_series("NVDA", d(2025, 1, 1), d(2025, 1, 31)).await.unwrap();

        let p = s.get_price("NVDA", d(2025, 1, 15)).await.unwrap();
        assert_eq!(p.date, d(2025, 1, 15));
        let p2 = s.get_price("NVDA", d(2025, 1, 16)).await.unwrap();
        assert_eq!(p2.date, d(2025, 1, 16));

        // Both lookups reuse the covering January range: one fetch total.
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeouts_retried_then_exhausted() {
        let mut provider = FakeProvider::new();
        provider.timeouts_before_success = 2;
        let s = store(provider);
        // Two timeouts then success, within the three allowed attempts.
        assert!(s.get_series("NVDA", d(2025, 1, 6), d(2025, 1, 10)).await.is_ok());

        let mut provider = FakeProvider::new();
        provider.timeouts_before_success = 10;
        let s = store(provider);
        let err = s.get_series("NVDA", d(2025, 1, 6), d(2025, 1, 10)).await.unwrap_err();
        assert!(matches!(err, DataError::Timeout { attempts: 3, .. }));
    }
}
