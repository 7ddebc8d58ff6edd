//! Strategy forecasters: turn per-year realized growth samples into a
//! projected price and price path.
//!
//! Every forecaster only decides the annualized growth rate; compounding,
//! projection, and the `price_at` lookup are shared through the provided
//! [`Forecaster::forecast`] method so the backtest can treat variants
//! interchangeably.

pub mod growth;
pub mod median;
pub mod projection;
pub mod sd;

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use growth::realized_growth_samples;
pub use median::MedianForecaster;
pub use projection::{PricePoint, ProjectionPath};
pub use sd::SdForecaster;

/// The two competing forecasting strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Median,
    Sd,
}

impl StrategyKind {
    /// Declaration order; ties are broken in favour of the earlier variant.
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Median, StrategyKind::Sd];

    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Median => "median",
            StrategyKind::Sd => "sd",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while fitting a forecaster.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("no realized growth samples to fit")]
    NoGrowthSamples,

    #[error("anchor price {0} is not a positive finite number")]
    InvalidAnchor(f64),

    #[error("growth rate {0}% cannot be compounded")]
    InvalidGrowth(f64),
}

/// Everything a forecaster needs for one projection.
#[derive(Debug, Clone, Copy)]
pub struct ForecastInput<'a> {
    /// Annualized % growth realized by following the seasonal windows, one per year.
    pub samples: &'a [f64],
    /// Last known price the projection compounds from.
    pub anchor: PricePoint,
    /// Horizon date.
    pub target: NaiveDate,
}

/// Output of one forecaster fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub strategy: StrategyKind,
    /// Annualized growth in percent.
    pub annualized_growth: f64,
    /// Price projected for the target date.
    pub forecast_price: f64,
    /// Month-end trajectory. `None` when anchor and target coincide.
    pub projection: Option<ProjectionPath>,
}

impl ForecastResult {
    /// Predicted price for `date`.
    ///
    /// Uses the projection point nearest in days (earliest point on ties);
    /// falls back to `forecast_price` when there is no projection.
    pub fn price_at(&self, date: NaiveDate) -> f64 {
        self.projection
            .as_ref()
            .and_then(|p| p.closest(date))
            .map(|p| p.price)
            .unwrap_or(self.forecast_price)
    }
}

/// A forecasting strategy.
pub trait Forecaster: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Annualized growth (percent) implied by the samples. Samples are never empty.
    fn growth_rate(&self, samples: &[f64]) -> f64;

    /// Fit on `input` and project to `input.target`.
    fn forecast(&self, input: &ForecastInput<'_>) -> Result<ForecastResult, ForecastError> {
        let samples: Vec<f64> = input
            .samples
            .iter()
            .copied()
            .filter(|s| s.is_finite())
            .collect();
        if samples.is_empty() {
            return Err(ForecastError::NoGrowthSamples);
        }
        let anchor_price = input.anchor.price;
        if !anchor_price.is_finite() || anchor_price <= 0.0 {
            return Err(ForecastError::InvalidAnchor(anchor_price));
        }

        let growth = self.growth_rate(&samples);
        if !growth.is_finite() || growth <= -100.0 {
            return Err(ForecastError::InvalidGrowth(growth));
        }

        let path = ProjectionPath::new(input.anchor, input.target, growth);
        let forecast_price = path.price_on(input.target);
        let projection = (input.anchor.date != input.target).then_some(path);

        Ok(ForecastResult {
            strategy: self.kind(),
            annualized_growth: growth,
            forecast_price,
            projection,
        })
    }
}

/// Construct the forecaster for a strategy kind.
pub fn forecaster_for(kind: StrategyKind, sd_bias: f64) -> Box<dyn Forecaster> {
    match kind {
        StrategyKind::Median => Box::new(MedianForecaster),
        StrategyKind::Sd => Box::new(SdForecaster::new(sd_bias)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn input(samples: &[f64]) -> ForecastInput<'_> {
        ForecastInput {
            samples,
            anchor: PricePoint {
                date: d(2023, 12, 29),
                price: 100.0,
            },
            target: d(2024, 12, 31),
        }
    }

    #[test]
    fn strategy_names() {
        assert_eq!(StrategyKind::Median.to_string(), "median");
        assert_eq!(StrategyKind::Sd.name(), "sd");
        let json = serde_json::to_string(&StrategyKind::Sd).unwrap();
        assert_eq!(json, "\"sd\"");
    }

    #[test]
    fn empty_samples_fail_to_fit() {
        let err = MedianForecaster.forecast(&input(&[])).unwrap_err();
        assert_eq!(err, ForecastError::NoGrowthSamples);
    }

    #[test]
    fn non_finite_samples_are_ignored() {
        let res = MedianForecaster.forecast(&input(&[f64::NAN, 10.0])).unwrap();
        assert!((res.annualized_growth - 10.0).abs() < 1e-12);
    }

    #[test]
    fn bad_anchor_is_rejected() {
        let mut i = input(&[5.0]);
        i.anchor.price = 0.0;
        assert!(matches!(
            MedianForecaster.forecast(&i),
            Err(ForecastError::InvalidAnchor(_))
        ));
    }

    #[test]
    fn total_loss_growth_is_rejected() {
        assert!(matches!(
            MedianForecaster.forecast(&input(&[-100.0])),
            Err(ForecastError::InvalidGrowth(_))
        ));
    }

    #[test]
    fn price_at_target_matches_forecast_price() {
        let res = MedianForecaster.forecast(&input(&[10.0])).unwrap();
        let target = d(2024, 12, 31);
        assert!((res.price_at(target) - res.forecast_price).abs() < 1e-9);
        assert!(res.forecast_price > 100.0);
    }

    #[test]
    fn price_at_without_projection_is_forecast_price() {
        let res = ForecastResult {
            strategy: StrategyKind::Sd,
            annualized_growth: 0.0,
            forecast_price: 42.0,
            projection: None,
        };
        assert_eq!(res.price_at(d(2030, 1, 1)), 42.0);
    }

    #[test]
    fn same_day_target_has_no_projection() {
        let mut i = input(&[10.0]);
        i.target = i.anchor.date;
        let res = MedianForecaster.forecast(&i).unwrap();
        assert!(res.projection.is_none());
        assert!((res.forecast_price - 100.0).abs() < 1e-12);
    }

    #[test]
    fn factory_builds_matching_kind() {
        for kind in StrategyKind::ALL {
            assert_eq!(forecaster_for(kind, -0.5).kind(), kind);
        }
    }
}
