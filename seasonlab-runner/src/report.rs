//! Markdown batch report.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use crate::registry::{Registry, RegistryEntry};

/// Rows shown in each ranking table.
pub const TABLE_ROWS: usize = 5;

/// One ranked row: ticker, its registry entry and its error score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry<'a> {
    pub ticker: &'a str,
    pub entry: &'a RegistryEntry,
    pub score: f64,
}

impl RankedEntry<'_> {
    fn strategy(&self) -> String {
        self.entry
            .winner
            .map(|w| w.name().to_uppercase())
            .unwrap_or_else(|| "N/A".to_string())
    }
}

/// Tested entries refreshed on `run_date`, best (lowest error score) first.
/// Equal scores keep ticker order.
pub fn rank_entries(registry: &Registry, run_date: NaiveDate) -> Vec<RankedEntry<'_>> {
    let mut ranked: Vec<RankedEntry<'_>> = registry
        .updated_on(run_date)
        .filter_map(|(ticker, entry)| {
            entry
                .error_score()
                .map(|score| RankedEntry { ticker, entry, score })
        })
        .collect();
    ranked.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked
}

/// Tickers refreshed on `run_date` with no scored year, in ticker order.
pub fn untested_tickers(registry: &Registry, run_date: NaiveDate) -> Vec<&str> {
    registry
        .updated_on(run_date)
        .filter(|(_, entry)| !entry.is_tested())
        .map(|(ticker, _)| ticker)
        .collect()
}

pub struct MarkdownReport<'a> {
    pub registry: &'a Registry,
    pub run_date: NaiveDate,
    pub tested: usize,
    pub failures: usize,
}

impl MarkdownReport<'_> {
    pub fn render(&self) -> String {
        let ranked = rank_entries(self.registry, self.run_date);

        let mut md = format!(
            "# Seasonal Strategy Backtest Report\n\
             **Date:** {}\n\n\
             - **Strategies Tested:** {}\n\
             - **Failures:** {}\n\n",
            self.run_date.format("%d %b %Y"),
            self.tested,
            self.failures
        );

        md.push_str("## Top Performers (Lowest Error)\n");
        if ranked.is_empty() {
            md.push_str("No updates found for this run.\n");
        } else {
            push_table(&mut md, ranked.iter().take(TABLE_ROWS));
        }

        md.push_str("\n## Least Accurate (Highest Error)\n");
        if ranked.is_empty() {
            md.push_str("No updates found for this run.\n");
        } else {
            push_table(&mut md, ranked.iter().rev().take(TABLE_ROWS));
        }

        let untested = untested_tickers(self.registry, self.run_date);
        if !untested.is_empty() {
            md.push_str("\n## Untested (No Scorable Years)\n");
            md.push_str(&untested.join(", "));
            md.push('\n');
        }

        md
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.render())
    }
}

fn push_table<'r, 'a: 'r>(md: &mut String, rows: impl Iterator<Item = &'r RankedEntry<'a>>) {
    md.push_str("| Ticker | Strategy | Error % | Tested |\n");
    md.push_str("|--------|----------|---------|--------|\n");
    for row in rows {
        md.push_str(&format!(
            "| {} | {} | {:.2}% | {}y |\n",
            row.ticker,
            row.strategy(),
            row.score,
            row.entry.years_tested
        ));
    }
}
