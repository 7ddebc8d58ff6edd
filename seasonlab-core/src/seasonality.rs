//! Seasonality engine: intra-month return profiles and best entry/exit days.
//!
//! For one calendar month the engine normalises every year's closes to that
//! year's first close in the month, averages the relative return per
//! day-of-month across years, then brute-forces the (buy, sell) day pair with
//! the largest average gain. With at most 31 distinct days the O(d²) search
//! is a few hundred comparisons.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::domain::PriceHistory;
use crate::stats;

/// Average relative return for one day-of-month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DayStat {
    /// Mean % return relative to the month's first close, across years.
    pub avg_return: f64,
    /// Number of years contributing an observation for this day.
    pub samples: usize,
}

/// Day-of-month → average relative return for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalityProfile {
    pub month: u32,
    pub days: BTreeMap<u32, DayStat>,
}

impl SeasonalityProfile {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// Distinct observed days, ascending.
    pub fn observed_days(&self) -> Vec<u32> {
        self.days.keys().copied().collect()
    }

    pub fn avg_return(&self, day: u32) -> Option<f64> {
        self.days.get(&day).map(|s| s.avg_return)
    }
}

/// Best buy/sell day pair within a month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradingWindow {
    pub buy_day: u32,
    pub sell_day: u32,
    /// Average % gain from buy day to sell day.
    pub gain: f64,
}

/// Build the profile for `month` (1–12) from every year in `history`.
pub fn compute_profile(history: &PriceHistory, month: u32) -> SeasonalityProfile {
    compute_profile_with(history, month, false)
}

/// Same as [`compute_profile`], optionally dropping IQR outliers from the
/// pooled relative returns before averaging.
pub fn compute_profile_with(
    history: &PriceHistory,
    month: u32,
    exclude_outliers: bool,
) -> SeasonalityProfile {
    // (day, relative return) rows, one per bar in the month.
    let mut rows: Vec<(u32, f64)> = Vec::new();
    let mut current_year: Option<i32> = None;
    let mut start_close = 0.0;

    // Bars are date-ordered, so a month's bars for one year are contiguous
    // and the first one seen is that year's reference close.
    for bar in history.month_bars(month) {
        let year = bar.date.year();
        if current_year != Some(year) {
            current_year = Some(year);
            start_close = bar.close;
        }
        if start_close == 0.0 || !start_close.is_finite() || !bar.close.is_finite() {
            continue;
        }
        let rel = (bar.close - start_close) / start_close * 100.0;
        rows.push((bar.date.day(), rel));
    }

    if exclude_outliers {
        let rels: Vec<f64> = rows.iter().map(|(_, r)| *r).collect();
        if let Some((lower, upper)) = stats::outlier_fence(&rels) {
            rows.retain(|(_, r)| (lower..=upper).contains(r));
        }
    }

    let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
    for (day, rel) in rows {
        let entry = sums.entry(day).or_insert((0.0, 0));
        entry.0 += rel;
        entry.1 += 1;
    }

    let days = sums
        .into_iter()
        .map(|(day, (sum, n))| {
            (
                day,
                DayStat {
                    avg_return: sum / n as f64,
                    samples: n,
                },
            )
        })
        .collect();

    SeasonalityProfile { month, days }
}

/// Pick the (buy < sell) pair maximising `avg[sell] − avg[buy]`.
///
/// Ties keep the first pair found, i.e. the smallest buy day, then the
/// smallest sell day. Profiles with fewer than two days yield a zero-gain
/// window on the single observed day (day 1 when the profile is empty).
pub fn select_window(profile: &SeasonalityProfile) -> TradingWindow {
    let days: Vec<(u32, f64)> = profile
        .days
        .iter()
        .map(|(d, s)| (*d, s.avg_return))
        .collect();

    if days.len() < 2 {
        let day = days.first().map(|(d, _)| *d).unwrap_or(1);
        return TradingWindow {
            buy_day: day,
            sell_day: days.last().map(|(d, _)| *d).unwrap_or(day),
            gain: 0.0,
        };
    }

    let mut best: Option<TradingWindow> = None;
    for i in 0..days.len() {
        for j in (i + 1)..days.len() {
            let gain = days[j].1 - days[i].1;
            if best.map_or(true, |b| gain > b.gain) {
                best = Some(TradingWindow {
                    buy_day: days[i].0,
                    sell_day: days[j].0,
                    gain,
                });
            }
        }
    }

    // Two or more days guarantee at least one pair was visited.
    best.unwrap_or(TradingWindow {
        buy_day: days[0].0,
        sell_day: days[days.len() - 1].0,
        gain: 0.0,
    })
}

/// Window per calendar month. Months with no bars are left out.
pub fn monthly_windows(
    history: &PriceHistory,
    exclude_outliers: bool,
) -> BTreeMap<u32, TradingWindow> {
    (1..=12)
        .filter_map(|month| {
            let profile = compute_profile_with(history, month, exclude_outliers);
            if profile.is_empty() {
                None
            } else {
                Some((month, select_window(&profile)))
            }
        })
        .collect()
}
