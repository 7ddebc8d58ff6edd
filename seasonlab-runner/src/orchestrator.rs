//! Parallel batch orchestrator.
//!
//! Runs one task per ticker on a dedicated rayon pool of exactly
//! `max_workers` threads. Each worker sleeps for the rate-limit delay before
//! calling the task, so throughput stays near `max_workers / delay` tickers
//! per second. Results are collected on the calling thread in completion
//! order; a failing or panicking ticker becomes an error record and never
//! aborts the batch.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use seasonlab_core::data::DataError;

use crate::progress::{ProgressEvent, ProgressSnapshot, ProgressTracker, TaskStatus};

// ─── Task interface ──────────────────────────────────────────────────

/// Why one ticker produced no result.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("no data for {ticker}")]
    DataUnavailable { ticker: String },

    #[error("fetch failed: {0}")]
    Fetch(#[from] DataError),

    #[error("{0}")]
    Failed(String),

    #[error("task panicked: {0}")]
    Panicked(String),
}

/// Work applied to each ticker of a batch.
pub trait TickerTask: Send + Sync {
    type Output: Send;

    fn process(&self, ticker: &str) -> Result<Self::Output, TaskError>;
}

impl<F, O> TickerTask for F
where
    F: Fn(&str) -> Result<O, TaskError> + Send + Sync,
    O: Send,
{
    type Output = O;

    fn process(&self, ticker: &str) -> Result<O, TaskError> {
        self(ticker)
    }
}

/// Per-worker pause before each task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RatePolicy {
    pub delay: Duration,
}

impl RatePolicy {
    pub fn none() -> Self {
        Self::default()
    }

    /// Negative or non-finite values mean no delay.
    pub fn from_secs_f64(secs: f64) -> Self {
        let delay = if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        };
        Self { delay }
    }

    fn wait(&self) {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
    }
}

// ─── Outcome types ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerResult<T> {
    pub ticker: String,
    pub summary: T,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerError {
    pub ticker: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

/// Everything a batch produced. `results` and `errors` are in completion
/// order; `successful + failed == total` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome<T> {
    pub results: Vec<TickerResult<T>>,
    pub errors: Vec<TickerError>,
    pub counts: BatchCounts,
    pub elapsed_secs: f64,
}

impl<T> BatchOutcome<T> {
    pub fn result_for(&self, ticker: &str) -> Option<&T> {
        self.results
            .iter()
            .find(|r| r.ticker == ticker)
            .map(|r| &r.summary)
    }

    pub fn error_for(&self, ticker: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|e| e.ticker == ticker)
            .map(|e| e.message.as_str())
    }
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

// ─── Orchestrator ────────────────────────────────────────────────────

pub struct BatchOrchestrator {
    max_workers: usize,
    rate: RatePolicy,
    tracker: ProgressTracker,
}

impl BatchOrchestrator {
    /// `max_workers` is clamped to at least one.
    pub fn new(max_workers: usize, rate: RatePolicy) -> Self {
        Self {
            max_workers: max_workers.max(1),
            rate,
            tracker: ProgressTracker::new(),
        }
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Progress of the current (or most recent) batch.
    pub fn progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    /// Run `task` for every ticker. `on_progress` is invoked on the calling
    /// thread exactly once per ticker, as each one finishes.
    pub fn run<T: TickerTask>(
        &self,
        tickers: &[String],
        task: &T,
        on_progress: Option<&dyn Fn(&ProgressEvent)>,
    ) -> Result<BatchOutcome<T::Output>, OrchestratorError> {
        let start = Instant::now();
        self.tracker.reset(tickers.len());
        info!(
            tickers = tickers.len(),
            workers = self.max_workers,
            delay_ms = self.rate.delay.as_millis() as u64,
            "batch started"
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.max_workers)
            .thread_name(|i| format!("seasonlab-worker-{i}"))
            .build()?;

        let (tx, rx) = mpsc::channel::<(String, Result<T::Output, TaskError>)>();
        let mut results = Vec::new();
        let mut errors = Vec::new();

        std::thread::scope(|scope| {
            // Producer: fan tasks out on the pool; the channel closes once
            // every task has sent its result and the scope has returned.
            scope.spawn(move || {
                pool.scope(|s| {
                    for ticker in tickers {
                        let tx = tx.clone();
                        s.spawn(move |_| {
                            self.tracker.start(ticker);
                            self.rate.wait();
                            let result = panic::catch_unwind(AssertUnwindSafe(|| {
                                task.process(ticker)
                            }))
                            .unwrap_or_else(|payload| {
                                Err(TaskError::Panicked(panic_message(payload.as_ref())))
                            });
                            // The receiver outlives every sender.
                            let _ = tx.send((ticker.clone(), result));
                        });
                    }
                });
            });

            for (ticker, result) in rx {
                let status = match result {
                    Ok(summary) => {
                        results.push(TickerResult {
                            ticker: ticker.clone(),
                            summary,
                        });
                        TaskStatus::Completed
                    }
                    Err(err) => {
                        warn!(ticker = %ticker, error = %err, "ticker failed");
                        errors.push(TickerError {
                            ticker: ticker.clone(),
                            message: err.to_string(),
                        });
                        TaskStatus::Failed
                    }
                };
                let event = self.tracker.finish(&ticker, status);
                if let Some(cb) = on_progress {
                    cb(&event);
                }
            }
        });

        let counts = BatchCounts {
            total: tickers.len(),
            successful: results.len(),
            failed: errors.len(),
        };
        let elapsed_secs = start.elapsed().as_secs_f64();
        info!(
            total = counts.total,
            successful = counts.successful,
            failed = counts.failed,
            elapsed_secs,
            "batch finished"
        );

        Ok(BatchOutcome {
            results,
            errors,
            counts,
            elapsed_secs,
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
