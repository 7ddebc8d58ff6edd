//! Trading calendar: maps monthly seasonality windows onto concrete dates.
//!
//! Entry dates are placed in `buy_year`, exit dates in `sell_year`. Days
//! that do not exist in the month are clamped, then buys roll forward and
//! sells roll backward off weekends and listed exchange holidays.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::domain::days_in_month;
use crate::seasonality::TradingWindow;

/// Upper bound on consecutive non-trading days skipped when rolling a date.
const MAX_SHIFTS: u32 = 10;

/// Direction a date rolls when it lands on a closed day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Roll {
    Forward,
    Backward,
}

/// A planned calendar date and whether it had to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedDate {
    pub date: NaiveDate,
    /// The date the raw window day mapped to before any rolling.
    pub requested: NaiveDate,
    pub adjusted: bool,
}

/// One month's entry/exit plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub month: u32,
    pub window: TradingWindow,
    pub buy: PlannedDate,
    pub sell: PlannedDate,
}

/// Lay each month's window out on real dates.
///
/// Months missing from `windows` are skipped. Returns entries in month order.
pub fn plan_calendar(
    windows: &BTreeMap<u32, TradingWindow>,
    buy_year: i32,
    sell_year: i32,
    holidays: &[NaiveDate],
) -> Vec<CalendarEntry> {
    windows
        .iter()
        .filter_map(|(&month, &window)| {
            let buy = plan_date(buy_year, month, window.buy_day, Roll::Forward, holidays)?;
            let sell = plan_date(sell_year, month, window.sell_day, Roll::Backward, holidays)?;
            Some(CalendarEntry {
                month,
                window,
                buy,
                sell,
            })
        })
        .collect()
}

/// Resolve `day` of `month` in `year` to an open trading day.
pub fn plan_date(
    year: i32,
    month: u32,
    day: u32,
    roll: Roll,
    holidays: &[NaiveDate],
) -> Option<PlannedDate> {
    let clamped = day.clamp(1, days_in_month(year, month));
    let requested = NaiveDate::from_ymd_opt(year, month, clamped)?;

    let mut date = requested;
    let mut shifts = 0;
    while shifts < MAX_SHIFTS && !is_open(date, holidays) {
        date = match roll {
            Roll::Forward => date.succ_opt()?,
            Roll::Backward => date.pred_opt()?,
        };
        shifts += 1;
    }

    Some(PlannedDate {
        date,
        requested,
        adjusted: date != requested,
    })
}

fn is_open(date: NaiveDate, holidays: &[NaiveDate]) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !holidays.contains(&date)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn weekday_date_is_kept() {
        // 2026-03-10 is a Tuesday.
        let p = plan_date(2026, 3, 10, Roll::Forward, &[]).unwrap();
        assert_eq!(p.date, d(2026, 3, 10));
        assert!(!p.adjusted);
    }

    #[test]
    fn buy_rolls_forward_sell_rolls_backward() {
        // 2026-03-07 is a Saturday.
        let buy = plan_date(2026, 3, 7, Roll::Forward, &[]).unwrap();
        let sell = plan_date(2026, 3, 7, Roll::Backward, &[]).unwrap();
        assert_eq!(buy.date, d(2026, 3, 9));
        assert_eq!(sell.date, d(2026, 3, 6));
        assert!(buy.adjusted && sell.adjusted);
    }

    #[test]
    fn holidays_are_skipped() {
        // Monday 2026-01-26 is a listed holiday.
        let holidays = [d(2026, 1, 26)];
        let buy = plan_date(2026, 1, 24, Roll::Forward, &holidays).unwrap();
        assert_eq!(buy.date, d(2026, 1, 27));
    }

    #[test]
    fn impossible_days_are_clamped() {
        let feb = plan_date(2027, 2, 31, Roll::Backward, &[]).unwrap();
        assert_eq!(feb.requested, d(2027, 2, 28));
        let apr = plan_date(2026, 4, 31, Roll::Backward, &[]).unwrap();
        assert_eq!(apr.requested, d(2026, 4, 30));
    }

    #[test]
    fn plan_covers_only_months_with_windows() {
        let mut windows = BTreeMap::new();
        windows.insert(
            1,
            TradingWindow {
                buy_day: 5,
                sell_day: 20,
                gain: 2.0,
            },
        );
        windows.insert(
            11,
            TradingWindow {
                buy_day: 3,
                sell_day: 25,
                gain: 4.0,
            },
        );
        let plan = plan_calendar(&windows, 2026, 2027, &[]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].buy.date.year(), 2026);
        assert_eq!(plan[1].sell.date.year(), 2027);
        assert_eq!(plan[1].month, 11);
    }
}
