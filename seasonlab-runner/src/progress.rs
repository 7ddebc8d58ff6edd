//! Batch progress tracking.
//!
//! One tracker is shared by every worker in a batch. Workers mark a ticker
//! as started; the collector marks it finished. All counters live behind a
//! single mutex so a snapshot never shows a ticker both in flight and done.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Terminal status of one ticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Completed,
    Failed,
}

/// Emitted once per finished ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Completed (successful) tickers as a percentage of the batch.
    pub percentage: f64,
    pub ticker: String,
    pub status: TaskStatus,
}

/// Point-in-time copy of the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub in_progress: usize,
    pub current_tickers: Vec<String>,
    pub percentage: f64,
}

#[derive(Debug, Default)]
struct State {
    total: usize,
    completed: usize,
    failed: usize,
    current: BTreeSet<String>,
}

impl State {
    // Failures do not advance the percentage.
    fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64 * 100.0
        }
    }
}

#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: Mutex<State>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new batch of `total` tickers, clearing previous counts.
    pub fn reset(&self, total: usize) {
        *self.lock() = State {
            total,
            ..State::default()
        };
    }

    pub fn start(&self, ticker: &str) {
        self.lock().current.insert(ticker.to_string());
    }

    /// Record a finished ticker and return the event describing it.
    pub fn finish(&self, ticker: &str, status: TaskStatus) -> ProgressEvent {
        let mut state = self.lock();
        match status {
            TaskStatus::Completed => state.completed += 1,
            TaskStatus::Failed => state.failed += 1,
        }
        state.current.remove(ticker);
        ProgressEvent {
            percentage: state.percentage(),
            ticker: ticker.to_string(),
            status,
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            total: state.total,
            completed: state.completed,
            failed: state.failed,
            in_progress: state.current.len(),
            current_tickers: state.current.iter().cloned().collect(),
            percentage: state.percentage(),
        }
    }
}
