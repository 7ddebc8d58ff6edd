//! Yahoo Finance history provider.
//!
//! Fetches daily bars from Yahoo's v8 chart API with retries, exponential
//! backoff, and a shared circuit breaker. Yahoo has no official API and the
//! response format can change without notice; the CSV provider is the
//! fallback when it does.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::{debug, warn};

use super::circuit_breaker::CircuitBreaker;
use super::provider::{canonicalize, DataError, HistoryProvider};
use crate::domain::{PriceBar, PriceHistory};

// ─── Wire format ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
}

// ─── Provider ────────────────────────────────────────────────────────

/// Earliest date requested when no explicit range is configured.
pub const DEFAULT_START: (i32, u32, u32) = (1990, 1, 1);

pub struct YahooProvider {
    client: reqwest::blocking::Client,
    circuit_breaker: Arc<CircuitBreaker>,
    start: NaiveDate,
    end: Option<NaiveDate>,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(circuit_breaker: Arc<CircuitBreaker>) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        let (y, m, d) = DEFAULT_START;
        let start = NaiveDate::from_ymd_opt(y, m, d)
            .ok_or_else(|| DataError::Other("invalid default start date".into()))?;

        Ok(Self {
            client,
            circuit_breaker,
            start,
            end: None,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Restrict requests to `[start, end]`; `end = None` means today.
    pub fn with_range(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    /// Decode the chart payload. Rows with no price at all are holidays and
    /// are skipped; partially missing fields become NaN and are left to
    /// `canonicalize`.
    fn parse_response(symbol: &str, resp: ChartResponse) -> Result<Vec<PriceBar>, DataError> {
        let result = match (resp.chart.result, resp.chart.error) {
            (Some(result), _) => result,
            (None, Some(err)) if err.code == "Not Found" => {
                return Err(DataError::SymbolNotFound {
                    symbol: symbol.to_string(),
                })
            }
            (None, Some(err)) => {
                return Err(DataError::ResponseFormatChanged(format!(
                    "{}: {}",
                    err.code, err.description
                )))
            }
            (None, None) => {
                return Err(DataError::ResponseFormatChanged(
                    "empty result with no error".into(),
                ))
            }
        };

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("result array is empty".into()))?;

        // A listed symbol with no trading in range has no timestamps.
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged("no quote data".into()))?;

        let field = |v: &[Option<f64>], i: usize| v.get(i).copied().flatten();

        let mut bars = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = field(&quote.open, i);
            let high = field(&quote.high, i);
            let low = field(&quote.low, i);
            let close = field(&quote.close, i);
            if open.is_none() && high.is_none() && low.is_none() && close.is_none() {
                continue;
            }

            bars.push(PriceBar::new(
                date,
                open.unwrap_or(f64::NAN),
                high.unwrap_or(f64::NAN),
                low.unwrap_or(f64::NAN),
                close.unwrap_or(f64::NAN),
            ));
        }

        Ok(bars)
    }

    /// One request. Transient failures come back as `Attempt::Retry`.
    fn attempt(&self, url: &str, symbol: &str) -> Attempt {
        let resp = match self.client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                return Attempt::Retry(DataError::NetworkUnreachable(e.to_string()))
            }
            Err(e) => return Attempt::Fatal(DataError::NetworkUnreachable(e.to_string())),
        };

        use reqwest::StatusCode;
        match resp.status() {
            StatusCode::FORBIDDEN => {
                self.circuit_breaker.trip();
                Attempt::Fatal(DataError::CircuitBreakerTripped)
            }
            StatusCode::UNAUTHORIZED => Attempt::Fatal(DataError::AuthenticationRequired(
                format!("chart request for {symbol} was rejected"),
            )),
            StatusCode::NOT_FOUND => Attempt::Fatal(DataError::SymbolNotFound {
                symbol: symbol.to_string(),
            }),
            StatusCode::TOO_MANY_REQUESTS => {
                self.circuit_breaker.record_failure();
                let wait = resp
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|h| h.to_str().ok()?.parse::<u64>().ok())
                    .unwrap_or(60);
                warn!(symbol, wait, "Yahoo throttled the request");
                Attempt::Retry(DataError::RateLimited {
                    retry_after_secs: wait,
                })
            }
            code if !code.is_success() => {
                self.circuit_breaker.record_failure();
                Attempt::Retry(DataError::Other(format!("chart request for {symbol}: HTTP {code}")))
            }
            _ => match resp.json::<ChartResponse>() {
                Ok(chart) => match Self::parse_response(symbol, chart) {
                    Ok(bars) => {
                        self.circuit_breaker.record_success();
                        Attempt::Done(bars)
                    }
                    Err(e) => Attempt::Fatal(e),
                },
                Err(e) => Attempt::Fatal(DataError::ResponseFormatChanged(format!(
                    "undecodable chart for {symbol}: {e}"
                ))),
            },
        }
    }

    /// Exponential backoff: `base_delay`, then doubling, up to `max_retries`
    /// extra attempts. The breaker is consulted before every attempt.
    fn fetch_with_retry(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, DataError> {
        let url = Self::chart_url(symbol, start, end);
        let mut backoff = self.base_delay;
        let mut tries = 0;

        loop {
            if !self.circuit_breaker.is_allowed() {
                return Err(DataError::CircuitBreakerTripped);
            }
            let err = match self.attempt(&url, symbol) {
                Attempt::Done(bars) => return Ok(bars),
                Attempt::Fatal(err) => return Err(err),
                Attempt::Retry(err) => err,
            };
            if tries >= self.max_retries {
                return Err(err);
            }
            tries += 1;
            debug!(symbol, tries, ?backoff, error = %err, "backing off before retry");
            std::thread::sleep(backoff);
            backoff *= 2;
        }
    }
}

enum Attempt {
    Done(Vec<PriceBar>),
    Retry(DataError),
    Fatal(DataError),
}

impl HistoryProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    fn fetch_history(&self, ticker: &str) -> Result<PriceHistory, DataError> {
        let end = self.end.unwrap_or_else(|| Local::now().date_naive());
        if end < self.start {
            return Ok(PriceHistory::empty());
        }
        let bars = self.fetch_with_retry(ticker, self.start, end)?;
        debug!(ticker, bars = bars.len(), "fetched Yahoo history");
        Ok(canonicalize(bars))
    }
}
