//! Realized growth samples: what following the seasonal windows actually
//! earned in each historical year.

use std::collections::BTreeMap;

use chrono::Datelike;

use crate::domain::{PriceBar, PriceHistory};
use crate::seasonality::TradingWindow;

/// One annualized % growth sample per year in `history`.
///
/// Within a year, every month with a non-degenerate window contributes a
/// trade: buy at the first bar on or after `buy_day`, sell at the first bar
/// on or after `sell_day`. The month returns are compounded and annualized
/// by `12 / months_traded`. Years with no completed trade contribute nothing.
pub fn realized_growth_samples(
    history: &PriceHistory,
    windows: &BTreeMap<u32, TradingWindow>,
) -> Vec<f64> {
    let mut samples = Vec::new();

    for year in history.years() {
        let bars = history.year_slice(year);
        let mut factor = 1.0;
        let mut months = 0u32;

        for (&month, window) in windows {
            if window.buy_day >= window.sell_day {
                continue;
            }
            if let Some(ret) = window_return(bars, month, window) {
                factor *= 1.0 + ret;
                months += 1;
            }
        }

        if months == 0 || factor <= 0.0 {
            continue;
        }
        let annual = factor.powf(12.0 / months as f64) - 1.0;
        if annual.is_finite() {
            samples.push(annual * 100.0);
        }
    }

    samples
}

/// Simple return of one window trade inside a single year's bars.
fn window_return(year_bars: &[PriceBar], month: u32, window: &TradingWindow) -> Option<f64> {
    let mut month_bars = year_bars.iter().filter(|b| b.date.month() == month);
    let buy = month_bars.clone().find(|b| b.date.day() >= window.buy_day)?;
    let sell = month_bars.find(|b| b.date.day() >= window.sell_day)?;

    if sell.date <= buy.date || buy.close <= 0.0 || !buy.close.is_finite() || !sell.close.is_finite()
    {
        return None;
    }
    Some(sell.close / buy.close - 1.0)
}
