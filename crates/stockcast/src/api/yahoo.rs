//! Yahoo Finance price history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(test)]
use mockall::automock;
use std::time::Duration;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

use crate::error::{Result, StockError};
use crate::types::PricePoint;

/// Source of daily price bars
#[cfg_attr(test, automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Chronological, split/dividend adjusted bars for `ticker`.
    ///
    /// An unknown ticker or an empty history is [`StockError::DataUnavailable`].
    async fn fetch_history(
        &self,
        ticker: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<PricePoint>>;
}

/// Yahoo Finance client
#[derive(Debug, Clone)]
pub struct YahooFinanceClient {
    timeout: Duration,
}

/// One raw bar as Yahoo reports it
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RawBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjclose: f64,
    pub volume: f64,
}

impl YahooFinanceClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl PriceSource for YahooFinanceClient {
    #[instrument(skip(self))]
    async fn fetch_history(
        &self,
        ticker: &str,
        period: &str,
        interval: &str,
    ) -> Result<Vec<PricePoint>> {
        let provider =
            yahoo::YahooConnector::new().map_err(|e| classify_yahoo_error(ticker, &e))?;

        let response = tokio::time::timeout(
            self.timeout,
            provider.get_quote_range(ticker, interval, period),
        )
        .await
        .map_err(|_| {
            StockError::YahooFinanceError(format!("request timed out after {:?}", self.timeout))
        })?
        .map_err(|e| classify_yahoo_error(ticker, &e))?;

        let quotes = response
            .quotes()
            .map_err(|e| classify_yahoo_error(ticker, &e))?;
        let bars: Vec<RawBar> = quotes
            .iter()
            .map(|q| RawBar {
                timestamp: q.timestamp as i64,
                open: q.open,
                high: q.high,
                low: q.low,
                close: q.close,
                adjclose: q.adjclose,
                volume: q.volume as f64,
            })
            .collect();

        let points = adjust_bars(&bars);
        debug!(raw = bars.len(), kept = points.len(), "fetched price history");

        if points.is_empty() {
            return Err(StockError::DataUnavailable {
                symbol: ticker.to_string(),
                reason: "No data found".to_string(),
            });
        }
        Ok(points)
    }
}

/// Empty or unknown-symbol replies are `DataUnavailable`; transport,
/// rate-limit and client failures stay `YahooFinanceError`.
pub(crate) fn classify_yahoo_error(ticker: &str, err: &yahoo::YahooError) -> StockError {
    use yahoo::YahooError as E;

    let missing = match err {
        E::ApiError(_) | E::NoResult | E::NoQuotes | E::DataInconsistency => true,
        E::FetchFailed(msg) => msg.contains("not found"),
        _ => false,
    };
    if missing {
        StockError::DataUnavailable {
            symbol: ticker.to_string(),
            reason: err.to_string(),
        }
    } else {
        StockError::YahooFinanceError(err.to_string())
    }
}

/// Apply the adjusted-close ratio to every price column.
///
/// Bars with a non-positive or non-finite close are dropped, the rest are
/// sorted by time and deduplicated on timestamp (last bar wins).
pub(crate) fn adjust_bars(bars: &[RawBar]) -> Vec<PricePoint> {
    let mut points: Vec<PricePoint> = bars
        .iter()
        .filter(|bar| bar.close.is_finite() && bar.close > 0.0)
        .filter_map(|bar| {
            let timestamp = DateTime::<Utc>::from_timestamp(bar.timestamp, 0)?;
            let ratio = if bar.adjclose.is_finite() && bar.adjclose > 0.0 {
                bar.adjclose / bar.close
            } else {
                1.0
            };
            Some(PricePoint {
                timestamp,
                open: bar.open * ratio,
                high: bar.high * ratio,
                low: bar.low * ratio,
                close: bar.close * ratio,
                volume: bar.volume,
            })
        })
        .collect();

    points.sort_by_key(|p| p.timestamp);
    points.dedup_by(|later, earlier| {
        if later.timestamp == earlier.timestamp {
            *earlier = *later;
            true
        } else {
            false
        }
    });
    points
}
