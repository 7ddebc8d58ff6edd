//! Median strategy: the typical year, robust to one outlier year.

use super::{Forecaster, StrategyKind};
use crate::stats;

/// Growth = median of the per-year realized growth samples.
#[derive(Debug, Clone, Copy, Default)]
pub struct MedianForecaster;

impl Forecaster for MedianForecaster {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Median
    }

    fn growth_rate(&self, samples: &[f64]) -> f64 {
        stats::median(samples)
    }
}
