//! SD strategy: mean growth shifted by a multiple of its dispersion.

use super::{Forecaster, StrategyKind};
use crate::stats;

/// Default dispersion multiplier: a half-sigma haircut on the mean.
pub const DEFAULT_SD_BIAS: f64 = -0.5;

/// Growth = mean + `bias` × sample standard deviation.
///
/// Negative `bias` penalises volatile seasonal patterns, positive rewards
/// them, zero reduces to the plain mean.
#[derive(Debug, Clone, Copy)]
pub struct SdForecaster {
    bias: f64,
}

impl SdForecaster {
    pub fn new(bias: f64) -> Self {
        Self { bias }
    }
}

impl Default for SdForecaster {
    fn default() -> Self {
        Self::new(DEFAULT_SD_BIAS)
    }
}

impl Forecaster for SdForecaster {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Sd
    }

    fn growth_rate(&self, samples: &[f64]) -> f64 {
        stats::mean(samples) + self.bias * stats::sample_std_dev(samples)
    }
}
