//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Window selection: buy precedes sell and the gain is the maximum over
//!    every ordered day pair
//! 2. History canonicalization: output is strictly ascending and unique
//! 3. Year slicing: the per-year slices partition the history
//! 4. Projection paths: anchored, date-monotone, ending on the target
//! 5. Statistics: median bounded by the data, std-dev non-negative

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use seasonlab_core::domain::{PriceBar, PriceHistory};
use seasonlab_core::forecast::{PricePoint, ProjectionPath};
use seasonlab_core::seasonality::{select_window, DayStat, SeasonalityProfile};
use seasonlab_core::stats;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_profile() -> impl Strategy<Value = SeasonalityProfile> {
    prop::collection::btree_map(1u32..=31, -20.0..20.0_f64, 2..25).prop_map(|days| {
        SeasonalityProfile {
            month: 1,
            days: days
                .into_iter()
                .map(|(d, r)| {
                    (
                        d,
                        DayStat {
                            avg_return: r,
                            samples: 1,
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
        }
    })
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 1, 1).unwrap()
}

/// Bars on arbitrary (possibly repeated, unordered) day offsets.
fn arb_bars() -> impl Strategy<Value = Vec<PriceBar>> {
    prop::collection::vec((0i64..3000, 1.0..500.0_f64), 0..200).prop_map(|rows| {
        rows.into_iter()
            .map(|(offset, close)| PriceBar::flat(base_date() + Duration::days(offset), close))
            .collect()
    })
}

// ── 1. Window selection ──────────────────────────────────────────────

proptest! {
    #[test]
    fn window_is_maximal_ordered_pair(profile in arb_profile()) {
        let window = select_window(&profile);
        prop_assert!(window.buy_day < window.sell_day);

        let days: Vec<(u32, f64)> = profile.days.iter().map(|(d, s)| (*d, s.avg_return)).collect();
        let mut best = f64::NEG_INFINITY;
        for i in 0..days.len() {
            for j in (i + 1)..days.len() {
                best = best.max(days[j].1 - days[i].1);
            }
        }
        prop_assert!((window.gain - best).abs() < 1e-9);

        let realized = profile.avg_return(window.sell_day).unwrap()
            - profile.avg_return(window.buy_day).unwrap();
        prop_assert!((realized - window.gain).abs() < 1e-9);
    }
}

// ── 2. Canonicalization ──────────────────────────────────────────────

proptest! {
    #[test]
    fn unsorted_input_becomes_strictly_ascending(bars in arb_bars()) {
        let n = bars.len();
        let history = PriceHistory::from_unsorted(bars);
        prop_assert!(history.len() <= n);
        prop_assert!(history.bars().windows(2).all(|w| w[0].date < w[1].date));
        prop_assert!(PriceHistory::from_bars(history.bars().to_vec()).is_ok());
    }
}

// ── 3. Year slicing ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn year_slices_partition_history(bars in arb_bars()) {
        let history = PriceHistory::from_unsorted(bars);
        let total: usize = history.years().iter().map(|y| history.year_slice(*y).len()).sum();
        prop_assert_eq!(total, history.len());

        for year in history.years() {
            let rest = history.excluding_year(year);
            prop_assert_eq!(rest.len() + history.year_slice(year).len(), history.len());
        }
    }
}

// ── 4. Projection paths ──────────────────────────────────────────────

proptest! {
    #[test]
    fn projection_path_runs_anchor_to_target(
        span in -900i64..900,
        growth in -50.0..80.0_f64,
    ) {
        let anchor = PricePoint { date: base_date(), price: 100.0 };
        let target = base_date() + Duration::days(span);
        let path = ProjectionPath::new(anchor, target, growth);
        let points: Vec<PricePoint> = path.points().collect();

        prop_assert_eq!(points.first().map(|p| p.date), Some(anchor.date));
        prop_assert_eq!(points.last().map(|p| p.date), Some(target));
        if span >= 0 {
            prop_assert!(points.windows(2).all(|w| w[0].date < w[1].date));
        } else {
            prop_assert!(points.windows(2).all(|w| w[0].date > w[1].date));
        }
        prop_assert!(points.iter().all(|p| p.price > 0.0));
    }
}

// ── 5. Statistics ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn median_is_bounded_and_sd_non_negative(
        values in prop::collection::vec(-1000.0..1000.0_f64, 1..50),
    ) {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let m = stats::median(&values);
        prop_assert!(m >= min && m <= max);
        prop_assert!(stats::sample_std_dev(&values) >= 0.0);
        prop_assert!(stats::remove_outliers(&values).len() <= values.len());
    }
}
