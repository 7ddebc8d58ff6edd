//! SeasonLab Runner: parallel batch backtests over a ticker universe.
//!
//! This crate builds on `seasonlab-core` to provide:
//! - TOML batch configuration with validation
//! - A bounded worker pool with per-worker rate limiting and live progress
//! - The per-ticker backtest task
//! - The persistent JSON registry of latest results
//! - A markdown summary report

pub mod config;
pub mod orchestrator;
pub mod progress;
pub mod registry;
pub mod report;
pub mod task;

pub use config::{BatchConfig, BatchSection, ConfigError, DataSection};
pub use orchestrator::{
    BatchCounts, BatchOrchestrator, BatchOutcome, OrchestratorError, RatePolicy, TaskError,
    TickerError, TickerResult, TickerTask,
};
pub use progress::{ProgressEvent, ProgressSnapshot, ProgressTracker, TaskStatus};
pub use registry::{Registry, RegistryEntry, RegistryError};
pub use report::MarkdownReport;
pub use task::BacktestTask;
