//! Lazily evaluated projection path.
//!
//! A path stores only its anchor, target, and growth rate. Points are
//! produced on demand: the anchor, every month-end strictly between anchor
//! and target (walking backward when the target precedes the anchor), then
//! the target itself.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::domain::days_in_month;

/// A dated price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

/// Compounding curve from an anchor price to a target date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectionPath {
    anchor: PricePoint,
    target: NaiveDate,
    /// Annualized growth in percent.
    growth_pct: f64,
}

impl ProjectionPath {
    pub fn new(anchor: PricePoint, target: NaiveDate, growth_pct: f64) -> Self {
        Self {
            anchor,
            target,
            growth_pct,
        }
    }

    pub fn anchor(&self) -> PricePoint {
        self.anchor
    }

    pub fn target(&self) -> NaiveDate {
        self.target
    }

    /// Compounded price on `date` (365-day years; negative spans discount).
    pub fn price_on(&self, date: NaiveDate) -> f64 {
        let days = (date - self.anchor.date).num_days() as f64;
        self.anchor.price * (1.0 + self.growth_pct / 100.0).powf(days / 365.0)
    }

    /// Path points in order from anchor to target.
    pub fn points(&self) -> impl Iterator<Item = PricePoint> + '_ {
        let forward = self.target >= self.anchor.date;
        let mut cursor = self.anchor.date;
        let mut emitted_anchor = false;
        let mut done = false;

        std::iter::from_fn(move || {
            if done {
                return None;
            }
            if !emitted_anchor {
                emitted_anchor = true;
                if cursor == self.target {
                    done = true;
                }
                return Some(self.anchor);
            }

            let next = if forward {
                next_month_end(cursor)
            } else {
                prev_month_end(cursor)
            };
            let reached = match next {
                Some(n) if forward => n >= self.target,
                Some(n) => n <= self.target,
                None => true,
            };
            let date = if reached {
                done = true;
                self.target
            } else {
                // `reached` is false only when `next` is Some.
                next.unwrap_or(self.target)
            };
            cursor = date;
            Some(PricePoint {
                date,
                price: self.price_on(date),
            })
        })
    }

    /// Path point with the smallest absolute day distance to `date`.
    pub fn closest(&self, date: NaiveDate) -> Option<PricePoint> {
        self.points()
            .min_by_key(|p| (p.date - date).num_days().abs())
    }
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, days_in_month(year, month))
}

/// First month-end strictly after `date`.
fn next_month_end(date: NaiveDate) -> Option<NaiveDate> {
    let this = month_end(date.year(), date.month())?;
    if this > date {
        return Some(this);
    }
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    month_end(y, m)
}

/// Last month-end strictly before `date`.
fn prev_month_end(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?.pred_opt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn anchor(date: NaiveDate) -> PricePoint {
        PricePoint { date, price: 100.0 }
    }

    #[test]
    fn forward_path_walks_month_ends() {
        let path = ProjectionPath::new(anchor(d(2024, 1, 15)), d(2024, 4, 10), 12.0);
        let dates: Vec<NaiveDate> = path.points().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![
                d(2024, 1, 15),
                d(2024, 1, 31),
                d(2024, 2, 29),
                d(2024, 3, 31),
                d(2024, 4, 10),
            ]
        );
    }

    #[test]
    fn target_on_month_end_is_not_duplicated() {
        let path = ProjectionPath::new(anchor(d(2023, 12, 29)), d(2024, 2, 29), 5.0);
        let dates: Vec<NaiveDate> = path.points().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(2023, 12, 29), d(2023, 12, 31), d(2024, 1, 31), d(2024, 2, 29)]);
    }

    #[test]
    fn backward_path_discounts() {
        let path = ProjectionPath::new(anchor(d(2024, 3, 15)), d(2024, 1, 20), 10.0);
        let points: Vec<PricePoint> = path.points().collect();
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(
            dates,
            vec![d(2024, 3, 15), d(2024, 2, 29), d(2024, 1, 31), d(2024, 1, 20)]
        );
        assert!(points.last().unwrap().price < 100.0);
    }

    #[test]
    fn degenerate_path_is_just_the_anchor() {
        let path = ProjectionPath::new(anchor(d(2024, 3, 15)), d(2024, 3, 15), 10.0);
        assert_eq!(path.points().count(), 1);
    }

    #[test]
    fn one_year_compounds_to_growth_rate() {
        let path = ProjectionPath::new(anchor(d(2023, 1, 1)), d(2024, 1, 1), 10.0);
        assert!((path.price_on(d(2024, 1, 1)) - 110.0).abs() < 1e-9);
    }

    #[test]
    fn closest_point_by_day_distance() {
        let path = ProjectionPath::new(anchor(d(2024, 1, 15)), d(2024, 4, 10), 12.0);
        assert_eq!(path.closest(d(2024, 3, 2)).unwrap().date, d(2024, 2, 29));
        assert_eq!(path.closest(d(2025, 1, 1)).unwrap().date, d(2024, 4, 10));
        assert_eq!(path.closest(d(2020, 1, 1)).unwrap().date, d(2024, 1, 15));
    }
}
