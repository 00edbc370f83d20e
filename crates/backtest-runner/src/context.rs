use chrono::NaiveDate;
use market_data::MarketDataStore;
use rust_decimal::prelude::*;

/// Format the trailing price history the oracle sees for one simulated day.
///
/// Best-effort: a ticker with no data in the window is skipped with a
/// warning rather than failing the run, and the oracle simply sees fewer
/// tickers. Only data up to and including `as_of` is shown (no look-ahead).
pub async fn build_market_context(
    store: &MarketDataStore,
    watchlist: &[String],
    as_of: NaiveDate,
    context_days: i64,
) -> String {
    let start = as_of - chrono::Duration::days(context_days);
    let mut lines = vec![format!("Market data through {as_of}:")];

    for ticker in watchlist {
        match store.get_series(ticker, start, as_of).await {
            Ok(series) if !series.is_empty() => {
                let first = &series[0];
                let last = &series[series.len() - 1];
                let first_close = first.close.to_f64().unwrap_or(0.0);
                let last_close = last.close.to_f64().unwrap_or(0.0);
                let change = if first_close > 0.0 {
                    (last_close / first_close - 1.0) * 100.0
                } else {
                    0.0
                };
                lines.push(format!(
                    "{ticker}: close {last_close:.2} ({change:+.2}% over {} sessions, range {:.2}-{:.2})",
                    series.len(),
                    series
                        .iter()
                        .map(|p| p.low.to_f64().unwrap_or(0.0))
                        .fold(f64::INFINITY, f64::min),
                    series
                        .iter()
                        .map(|p| p.high.to_f64().unwrap_or(0.0))
                        .fold(f64::NEG_INFINITY, f64::max),
                ));
            }
            Ok(_) => {
                tracing::warn!(%ticker, %as_of, "no context data in window, skipping ticker");
            }
            Err(err) => {
                tracing::warn!(%ticker, %as_of, error = %err, "context fetch failed, skipping ticker");
            }
        }
    }

    lines.join("\n")
}
