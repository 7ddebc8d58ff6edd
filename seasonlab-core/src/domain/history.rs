//! PriceHistory: the validated, date-ordered bar sequence for one ticker.
//!
//! Invariant: bars are strictly ascending by date (one bar per trading day,
//! no duplicates). Every constructor either checks or establishes it, so the
//! year/month slicing below can rely on binary search.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::bar::PriceBar;

/// Violations of the history ordering invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("bars out of order: {later} appears before {earlier}")]
    Unordered { earlier: NaiveDate, later: NaiveDate },

    #[error("duplicate bar for {0}")]
    DuplicateDate(NaiveDate),
}

/// Ordered daily bars for one ticker. Empty means "no data".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from bars that must already be strictly ascending.
    pub fn from_bars(bars: Vec<PriceBar>) -> Result<Self, HistoryError> {
        for pair in bars.windows(2) {
            let (prev, next) = (pair[0].date, pair[1].date);
            if prev == next {
                return Err(HistoryError::DuplicateDate(prev));
            }
            if prev > next {
                return Err(HistoryError::Unordered {
                    earlier: next,
                    later: prev,
                });
            }
        }
        Ok(Self { bars })
    }

    /// Sort and de-duplicate provider output. On duplicate dates the last
    /// bar delivered wins.
    pub fn from_unsorted(mut bars: Vec<PriceBar>) -> Self {
        // Stable sort keeps delivery order among equal dates.
        bars.sort_by_key(|b| b.date);
        let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match out.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => out.push(bar),
            }
        }
        Self { bars: out }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Distinct calendar years present, ascending.
    pub fn years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = Vec::new();
        for bar in &self.bars {
            let y = bar.date.year();
            if years.last() != Some(&y) {
                years.push(y);
            }
        }
        years
    }

    /// Contiguous slice of bars dated within `year`.
    pub fn year_slice(&self, year: i32) -> &[PriceBar] {
        let start = self.bars.partition_point(|b| b.date.year() < year);
        let end = self.bars.partition_point(|b| b.date.year() <= year);
        &self.bars[start..end]
    }

    /// New history with every bar of `year` removed.
    pub fn excluding_year(&self, year: i32) -> PriceHistory {
        let bars = self
            .bars
            .iter()
            .filter(|b| b.date.year() != year)
            .copied()
            .collect();
        PriceHistory { bars }
    }

    /// New history ending on or before `date`.
    pub fn up_to(&self, date: NaiveDate) -> PriceHistory {
        let end = self.bars.partition_point(|b| b.date <= date);
        PriceHistory {
            bars: self.bars[..end].to_vec(),
        }
    }

    /// Bars whose calendar month is `month` (1–12), across all years.
    pub fn month_bars(&self, month: u32) -> impl Iterator<Item = &PriceBar> + '_ {
        self.bars.iter().filter(move |b| b.date.month() == month)
    }

    /// Last bar strictly before `date`.
    pub fn last_before(&self, date: NaiveDate) -> Option<&PriceBar> {
        let idx = self.bars.partition_point(|b| b.date < date);
        idx.checked_sub(1).map(|i| &self.bars[i])
    }

    /// First bar strictly after `date`.
    pub fn first_after(&self, date: NaiveDate) -> Option<&PriceBar> {
        let idx = self.bars.partition_point(|b| b.date <= date);
        self.bars.get(idx)
    }

    /// Years containing at least one full month of data.
    ///
    /// A month counts as full when its first bar lands in the first seven
    /// days and its last bar lands in the final seven days of the month.
    pub fn full_month_years(&self) -> Vec<i32> {
        let mut years = Vec::new();
        let mut i = 0;
        while i < self.bars.len() {
            let (y, m) = (self.bars[i].date.year(), self.bars[i].date.month());
            let first_day = self.bars[i].date.day();
            let mut j = i;
            while j + 1 < self.bars.len()
                && self.bars[j + 1].date.year() == y
                && self.bars[j + 1].date.month() == m
            {
                j += 1;
            }
            let last_day = self.bars[j].date.day();
            let full = first_day <= 7 && last_day + 7 > days_in_month(y, m);
            if full && years.last() != Some(&y) {
                years.push(y);
            }
            i = j + 1;
        }
        years
    }
}

/// Number of days in a calendar month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}
