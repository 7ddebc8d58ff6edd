//! Deterministic synthetic history provider.
//!
//! Generates a weekday random walk per ticker. Each ticker gets its own
//! seed (FNV-1a over the symbol mixed with a base seed) and its own set of
//! per-month drifts, so the walks carry a repeatable seasonal pattern for
//! demos and tests without touching the network.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::provider::{DataError, HistoryProvider};
use crate::domain::{PriceBar, PriceHistory};

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    start: NaiveDate,
    end: NaiveDate,
    base_seed: u64,
}

/// Daily noise amplitude as a fraction of price.
const DAILY_VOLATILITY: f64 = 0.01;

impl SyntheticProvider {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            base_seed: 42,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    /// Seed for one ticker; stable across runs and platforms.
    pub fn seed_for(&self, ticker: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in ticker.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash ^ self.base_seed
    }

    fn generate(&self, ticker: &str) -> Vec<PriceBar> {
        let mut rng = StdRng::seed_from_u64(self.seed_for(ticker));

        let monthly_drift: [f64; 12] =
            std::array::from_fn(|_| rng.gen_range(-0.002..0.002));
        let mut close: f64 = rng.gen_range(20.0..200.0);

        let mut bars = Vec::new();
        let mut date = self.start;
        while date <= self.end {
            if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
                let drift = monthly_drift[date.month0() as usize];
                let shock = rng.gen_range(-DAILY_VOLATILITY..=DAILY_VOLATILITY);
                let open = close;
                close = (close * (1.0 + drift + shock)).max(0.01);
                let spread = close * DAILY_VOLATILITY * 0.5;
                bars.push(PriceBar::new(
                    date,
                    open,
                    open.max(close) + spread,
                    (open.min(close) - spread).max(0.01),
                    close,
                ));
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => break,
            }
        }
        bars
    }
}

impl HistoryProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_history(&self, ticker: &str) -> Result<PriceHistory, DataError> {
        // Generated bars are already ascending and unique.
        PriceHistory::from_bars(self.generate(ticker))
            .map_err(|e| DataError::Other(format!("synthetic history for {ticker}: {e}")))
    }
}
