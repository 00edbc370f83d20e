use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use trading_core::{DataError, PriceProvider, PricePoint};

/// File-backed provider reading `{DATA_DIR}/{TICKER}_daily.csv`.
///
/// Expected header: `date,open,high,low,close,volume` with ISO dates.
pub struct CsvDataProvider {
    data_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: f64,
}

impl CsvDataProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    fn read_range(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        let path = self.data_dir.join(format!("{ticker}_daily.csv"));
        if !path.exists() {
            return Err(DataError::Provider(format!(
                "data file not found for {ticker}: {}",
                path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|e| DataError::Provider(format!("{}: {e}", path.display())))?;

        let mut series = Vec::new();
        for record in reader.deserialize::<CsvRow>() {
            let row = record.map_err(|e| DataError::MalformedSeries {
                ticker: ticker.to_string(),
                message: e.to_string(),
            })?;
            if row.date < start || row.date > end {
                continue;
            }
            series.push(PricePoint {
                date: row.date,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        tracing::debug!(ticker, rows = series.len(), "loaded local price data");
        Ok(series)
    }
}

#[async_trait]
impl PriceProvider for CsvDataProvider {
    async fn fetch_series(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, DataError> {
        self.read_range(ticker, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(dir: &std::path::Path, ticker: &str, rows: &str) {
        let path = dir.join(format!("{ticker}_daily.csv"));
        std::fs::write(path, format!("date,open,high,low,close,volume\n{rows}")).unwrap();
    }

    #[tokio::test]
    async fn test_reads_and_filters_rows() {
        let dir = std::env::temp_dir().join("csv_provider_reads");
        std::fs::create_dir_all(&dir).unwrap();
        write_fixture(
            &dir,
            "NVDA",
            "2025-01-06,100.0,105.0,99.0,103.5,1000000\n\
             2025-01-07,103.5,108.0,102.0,107.0,1100000\n\
             2025-01-08,107.0,109.0,104.0,105.0,900000\n",
        );

        let provider = CsvDataProvider::new(&dir);
        let series = provider
            .fetch_series(
                "NVDA",
                NaiveDate::from_ymd_opt(2025, 1, 7).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series[0].date, NaiveDate::from_ymd_opt(2025, 1, 7).unwrap());
        assert_eq!(series[0].close, Decimal::from(107));
    }

    #[tokio::test]
    async fn test_missing_file_is_provider_error() {
        let dir = std::env::temp_dir().join("csv_provider_missing");
        std::fs::create_dir_all(&dir).unwrap();
        let provider = CsvDataProvider::new(&dir);
        let err = provider
            .fetch_series(
                "NOPE",
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2025, 1, 31).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Provider(_)));
    }
}
