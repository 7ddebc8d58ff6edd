//! SeasonLab Core: price history, seasonality windows, forecasters, and the
//! leave-one-year-out backtest.
//!
//! This crate contains the per-ticker engine:
//! - Domain types (bars, validated price histories)
//! - Statistics helpers (median, sample std-dev, IQR outlier fence)
//! - Day-of-month seasonality profiles and best buy/sell window selection
//! - Trading calendar that maps windows onto real trading days
//! - Median and sd-adjusted growth forecasters with lazy projection paths
//! - Backtest engine scoring both forecasters on held-out years
//! - History providers (Yahoo, CSV, synthetic) and the ticker universe

pub mod backtest;
pub mod calendar;
pub mod data;
pub mod domain;
pub mod forecast;
pub mod seasonality;
pub mod stats;

pub use backtest::{
    BacktestConfig, BacktestEngine, BacktestFold, BacktestSummary, Confidence, ErrorAggregation,
    FoldSkip,
};
pub use data::{DataError, HistoryProvider};
pub use domain::{PriceBar, PriceHistory};
pub use forecast::{Forecaster, StrategyKind};
pub use seasonality::{monthly_windows, TradingWindow};
