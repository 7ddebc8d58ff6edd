//! CSV history provider.
//!
//! Reads `<dir>/<TICKER>.csv` with a header row naming `date, open, high,
//! low, close` (case-insensitive, extra columns ignored). Dates are
//! `YYYY-MM-DD`. A ticker without a file has no data, which is an empty
//! history rather than an error.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::provider::{canonicalize, DataError, HistoryProvider};
use crate::domain::{PriceBar, PriceHistory};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `ticker`. Tickers containing path separators are rejected.
    pub fn path_for(&self, ticker: &str) -> Result<PathBuf, DataError> {
        if ticker.is_empty() || ticker.contains(['/', '\\']) || ticker.contains("..") {
            return Err(DataError::SymbolNotFound {
                symbol: ticker.to_string(),
            });
        }
        Ok(self.dir.join(format!("{ticker}.csv")))
    }
}

/// Parse every row of a price CSV file. Rows without a close are dropped by
/// `canonicalize`; missing open/high/low fall back to the close.
pub fn read_price_csv(path: &Path) -> Result<Vec<PriceBar>, DataError> {
    let csv_err = |e: csv::Error| DataError::Csv {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let headers: csv::StringRecord = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.to_ascii_lowercase())
        .collect();
    reader.set_headers(headers);

    let mut bars = Vec::new();
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(csv_err)?;
        let close = row.close.unwrap_or(f64::NAN);
        bars.push(PriceBar::new(
            row.date,
            row.open.unwrap_or(close),
            row.high.unwrap_or(close),
            row.low.unwrap_or(close),
            close,
        ));
    }
    Ok(bars)
}

impl HistoryProvider for CsvProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch_history(&self, ticker: &str) -> Result<PriceHistory, DataError> {
        let path = self.path_for(ticker)?;
        if !path.exists() {
            debug!(ticker, path = %path.display(), "no CSV file for ticker");
            return Ok(PriceHistory::empty());
        }
        let bars = read_price_csv(&path)?;
        Ok(canonicalize(bars))
    }
}
