//! Leave-one-year-out backtest: scores the median and sd forecasters
//! against realized prices and declares a winner.
//!
//! For each held-out year Y (ascending):
//! 1. train on every bar outside Y, test on the bars inside Y;
//! 2. fit seasonal windows and realized growth samples on the training set;
//! 3. project both forecasters from the anchor to the last test date;
//! 4. score |predicted − actual| / actual × 100 per forecaster.
//!
//! `reference_date` truncates the history first; `lookback_years` limits the
//! held-out years to the most recent ones. Training always uses every other
//! year that remains.
//!
//! A fold that cannot be scored is skipped and logged, never raised. The
//! engine always returns a summary; zero scored folds means no winner.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::PriceHistory;
use crate::forecast::{
    forecaster_for, realized_growth_samples, sd::DEFAULT_SD_BIAS, ForecastError, ForecastInput,
    ForecastResult, Forecaster, PricePoint, StrategyKind,
};
use crate::seasonality::monthly_windows;
use crate::stats;

// ─── Configuration ───────────────────────────────────────────────────

/// How per-fold errors are reduced to one score per strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorAggregation {
    #[default]
    Median,
    Mean,
}

impl ErrorAggregation {
    pub fn aggregate(&self, errors: &[f64]) -> f64 {
        match self {
            ErrorAggregation::Median => stats::median(errors),
            ErrorAggregation::Mean => stats::mean(errors),
        }
    }
}

/// Backtest parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Reduction applied to each strategy's fold errors.
    pub aggregation: ErrorAggregation,
    /// Dispersion multiplier for the sd forecaster.
    pub sd_bias: f64,
    /// Drop IQR outliers from seasonal returns and growth samples.
    pub exclude_outliers: bool,
    /// Hold out only the most recent N testable years. `None` tests all.
    pub lookback_years: Option<usize>,
    /// Backtest as of this date: later bars are ignored.
    pub reference_date: Option<NaiveDate>,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            aggregation: ErrorAggregation::Median,
            sd_bias: DEFAULT_SD_BIAS,
            exclude_outliers: true,
            lookback_years: None,
            reference_date: None,
        }
    }
}

// ─── Result types ────────────────────────────────────────────────────

/// Why a fold was not scored.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FoldSkip {
    #[error("no bars in held-out year")]
    EmptyTestSlice,

    #[error("no training bars outside held-out year")]
    NoTrainingData,

    #[error("actual end price is zero or not finite")]
    ZeroActualPrice,

    #[error("{strategy} forecaster failed: {source}")]
    StrategyFit {
        strategy: StrategyKind,
        #[source]
        source: ForecastError,
    },
}

/// A scored fold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestFold {
    pub year: i32,
    pub training_bars: usize,
    pub test_bars: usize,
    pub target_date: NaiveDate,
    pub actual_end_price: f64,
    pub median_forecast: ForecastResult,
    pub sd_forecast: ForecastResult,
    pub median_error: f64,
    pub sd_error: f64,
}

impl BacktestFold {
    pub fn error_for(&self, kind: StrategyKind) -> f64 {
        match kind {
            StrategyKind::Median => self.median_error,
            StrategyKind::Sd => self.sd_error,
        }
    }
}

/// Qualitative trust in a summary, by number of scored years.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Average,
    Low,
    Insufficient,
}

impl Confidence {
    pub fn from_years(years: usize) -> Self {
        match years {
            0 => Confidence::Insufficient,
            1 => Confidence::Low,
            2 => Confidence::Average,
            _ => Confidence::High,
        }
    }
}

/// Outcome of one ticker's backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    /// `None` when no fold could be scored.
    pub winner: Option<StrategyKind>,
    pub median_avg_error: f64,
    pub sd_avg_error: f64,
    pub years_tested: usize,
    pub tested_years: Vec<i32>,
    pub confidence: Confidence,
    pub folds: Vec<BacktestFold>,
}

impl BacktestSummary {
    /// Summary for a history with nothing to test.
    pub fn untested() -> Self {
        Self {
            winner: None,
            median_avg_error: 0.0,
            sd_avg_error: 0.0,
            years_tested: 0,
            tested_years: Vec::new(),
            confidence: Confidence::Insufficient,
            folds: Vec::new(),
        }
    }

    /// Per-strategy error lists, one entry per scored fold.
    pub fn errors(&self, kind: StrategyKind) -> Vec<f64> {
        self.folds.iter().map(|f| f.error_for(kind)).collect()
    }
}

// ─── Engine ──────────────────────────────────────────────────────────

/// Leave-one-year-out cross-validator.
pub struct BacktestEngine {
    config: BacktestConfig,
    median: Box<dyn Forecaster>,
    sd: Box<dyn Forecaster>,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self {
            config,
            median: forecaster_for(StrategyKind::Median, config.sd_bias),
            sd: forecaster_for(StrategyKind::Sd, config.sd_bias),
        }
    }

    /// Run every fold and summarize. Never fails.
    pub fn run(&self, history: &PriceHistory) -> BacktestSummary {
        let truncated;
        let history = match self.config.reference_date {
            Some(date) => {
                truncated = history.up_to(date);
                &truncated
            }
            None => history,
        };

        let years = self.test_years(history);
        if years.is_empty() {
            debug!("no year with a full month of data; nothing to backtest");
            return BacktestSummary::untested();
        }

        let mut folds = Vec::with_capacity(years.len());
        for year in years {
            match self.run_fold(history, year) {
                Ok(fold) => folds.push(fold),
                Err(skip) => debug!(year, reason = %skip, "fold skipped"),
            }
        }

        self.summarize(folds)
    }

    /// Held-out years, ascending: every full-month year, or the last
    /// `lookback_years` of them.
    fn test_years(&self, history: &PriceHistory) -> Vec<i32> {
        let mut years = history.full_month_years();
        if let Some(n) = self.config.lookback_years {
            let skip = years.len().saturating_sub(n);
            years.drain(..skip);
        }
        years
    }

    /// Score one held-out year.
    pub fn run_fold(&self, history: &PriceHistory, year: i32) -> Result<BacktestFold, FoldSkip> {
        let test = history.year_slice(year);
        let (first_test, last_test) = match (test.first(), test.last()) {
            (Some(f), Some(l)) => (*f, *l),
            _ => return Err(FoldSkip::EmptyTestSlice),
        };

        let actual = last_test.close;
        if actual == 0.0 || !actual.is_finite() {
            return Err(FoldSkip::ZeroActualPrice);
        }

        let training = history.excluding_year(year);
        if training.is_empty() {
            return Err(FoldSkip::NoTrainingData);
        }

        // Compound from the last bar before the held-out year; when Y is the
        // earliest year, discount back from the first bar after it.
        let anchor_bar = training
            .last_before(first_test.date)
            .or_else(|| training.first_after(last_test.date))
            .copied()
            .ok_or(FoldSkip::NoTrainingData)?;
        let anchor = PricePoint {
            date: anchor_bar.date,
            price: anchor_bar.close,
        };

        let windows = monthly_windows(&training, self.config.exclude_outliers);
        let mut samples = realized_growth_samples(&training, &windows);
        if self.config.exclude_outliers {
            samples = stats::remove_outliers(&samples);
        }

        let input = ForecastInput {
            samples: &samples,
            anchor,
            target: last_test.date,
        };
        let fit = |f: &dyn Forecaster| {
            f.forecast(&input).map_err(|source| FoldSkip::StrategyFit {
                strategy: f.kind(),
                source,
            })
        };
        let median_forecast = fit(self.median.as_ref())?;
        let sd_forecast = fit(self.sd.as_ref())?;

        let score = |r: &ForecastResult| (r.price_at(last_test.date) - actual).abs() / actual * 100.0;
        let median_error = score(&median_forecast);
        let sd_error = score(&sd_forecast);

        Ok(BacktestFold {
            year,
            training_bars: training.len(),
            test_bars: test.len(),
            target_date: last_test.date,
            actual_end_price: actual,
            median_forecast,
            sd_forecast,
            median_error,
            sd_error,
        })
    }

    fn summarize(&self, folds: Vec<BacktestFold>) -> BacktestSummary {
        if folds.is_empty() {
            return BacktestSummary::untested();
        }

        let median_errors: Vec<f64> = folds.iter().map(|f| f.median_error).collect();
        let sd_errors: Vec<f64> = folds.iter().map(|f| f.sd_error).collect();
        let median_avg_error = self.config.aggregation.aggregate(&median_errors);
        let sd_avg_error = self.config.aggregation.aggregate(&sd_errors);

        // Strictly lower wins; a tie goes to the first-declared strategy.
        let winner = if sd_avg_error < median_avg_error {
            StrategyKind::Sd
        } else {
            StrategyKind::Median
        };

        let tested_years: Vec<i32> = folds.iter().map(|f| f.year).collect();
        BacktestSummary {
            winner: Some(winner),
            median_avg_error,
            sd_avg_error,
            years_tested: folds.len(),
            confidence: Confidence::from_years(folds.len()),
            tested_years,
            folds,
        }
    }
}

impl Default for BacktestEngine {
    fn default() -> Self {
        Self::new(BacktestConfig::default())
    }
}
