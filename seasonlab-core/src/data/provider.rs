//! History provider trait and structured error types.
//!
//! The HistoryProvider trait abstracts over data sources (Yahoo Finance, CSV
//! directories, synthetic random walks) so the batch runner can swap
//! implementations and mock them in tests.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{PriceBar, PriceHistory};

/// Structured error types for data operations.
///
/// These are designed to be displayable in CLI output and batch error records.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("hard stop: data provider has blocked requests (circuit breaker tripped)")]
    CircuitBreakerTripped,

    #[error("csv error in {path}: {reason}")]
    Csv { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("data error: {0}")]
    Other(String),
}

/// Where a history came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Yahoo,
    Csv,
    Synthetic,
}

/// Source of daily price history for one ticker at a time.
///
/// Implementations may return an empty history when the ticker has no data;
/// they must never silently drop bars they did receive.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch every available daily bar for `ticker`.
    fn fetch_history(&self, ticker: &str) -> Result<PriceHistory, DataError>;
}

impl<P: HistoryProvider + ?Sized> HistoryProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_history(&self, ticker: &str) -> Result<PriceHistory, DataError> {
        (**self).fetch_history(ticker)
    }
}

impl<P: HistoryProvider + ?Sized> HistoryProvider for Arc<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch_history(&self, ticker: &str) -> Result<PriceHistory, DataError> {
        (**self).fetch_history(ticker)
    }
}

/// Drop void bars and build a canonical (sorted, de-duplicated) history.
pub fn canonicalize(bars: Vec<PriceBar>) -> PriceHistory {
    PriceHistory::from_unsorted(bars.into_iter().filter(|b| !b.close.is_nan()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Fixed;

    impl HistoryProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn fetch_history(&self, _ticker: &str) -> Result<PriceHistory, DataError> {
            Ok(PriceHistory::empty())
        }
    }

    #[test]
    fn boxed_and_shared_providers_delegate() {
        let boxed: Box<dyn HistoryProvider> = Box::new(Fixed);
        assert_eq!(boxed.name(), "fixed");
        let shared = Arc::new(Fixed);
        assert!(shared.fetch_history("X").unwrap().is_empty());
    }

    #[test]
    fn canonicalize_drops_nan_closes() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let bars = vec![
            PriceBar::flat(d, f64::NAN),
            PriceBar::flat(d.succ_opt().unwrap(), 10.0),
        ];
        assert_eq!(canonicalize(bars).len(), 1);
    }

    #[test]
    fn errors_are_displayable() {
        let err = DataError::SymbolNotFound {
            symbol: "ZZZ".into(),
        };
        assert_eq!(err.to_string(), "symbol not found: ZZZ");
    }
}
