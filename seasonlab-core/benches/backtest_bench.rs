//! Criterion benchmarks for SeasonLab hot paths.
//!
//! Benchmarks:
//! 1. Full leave-one-year-out backtest over growing histories
//! 2. Monthly window fitting (profile + brute-force selection for 12 months)

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use seasonlab_core::backtest::BacktestEngine;
use seasonlab_core::data::{HistoryProvider, SyntheticProvider};
use seasonlab_core::domain::PriceHistory;
use seasonlab_core::seasonality::monthly_windows;

// ── Helpers ──────────────────────────────────────────────────────────

fn history(years: i32) -> PriceHistory {
    let start = NaiveDate::from_ymd_opt(2024 - years, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    SyntheticProvider::new(start, end)
        .fetch_history("BENCH")
        .unwrap()
}

// ── 1. Backtest ──────────────────────────────────────────────────────

fn bench_backtest(c: &mut Criterion) {
    let mut group = c.benchmark_group("backtest");
    let engine = BacktestEngine::default();
    for years in [5, 10, 20] {
        let h = history(years);
        group.bench_with_input(BenchmarkId::from_parameter(years), &h, |b, h| {
            b.iter(|| engine.run(black_box(h)))
        });
    }
    group.finish();
}

// ── 2. Window fitting ────────────────────────────────────────────────

fn bench_windows(c: &mut Criterion) {
    let h = history(10);
    c.bench_function("monthly_windows_10y", |b| {
        b.iter(|| monthly_windows(black_box(&h), true))
    });
}

criterion_group!(benches, bench_backtest, bench_windows);
criterion_main!(benches);
