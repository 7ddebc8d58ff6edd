//! Persistent backtest registry.
//!
//! A JSON document mapping ticker to its latest summary, plus the timestamp
//! of the last batch:
//!
//! ```json
//! {
//!   "last_run": "2024-06-01 18:30:00",
//!   "results": {
//!     "INFY.NS": { "winner": "sd", "median_error": 4.12, "sd_error": 3.87,
//!                  "years_tested": 5, "last_updated": "2024-06-01" }
//!   }
//! }
//! ```
//!
//! Loading never fails: a missing or corrupt file yields an empty registry.
//! Entries are read one by one; an entry that does not parse is kept as raw
//! JSON and written back unchanged, so it never costs its siblings. Saving
//! writes a temp file and renames it over the target, so readers see either
//! the old document or the new one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use seasonlab_core::backtest::BacktestSummary;
use seasonlab_core::forecast::StrategyKind;

use crate::orchestrator::BatchOutcome;

pub const LAST_RUN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("serialize registry: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Stored result for one ticker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// `null` when no year could be tested.
    pub winner: Option<StrategyKind>,
    pub median_error: f64,
    pub sd_error: f64,
    /// Older documents store the list of tested years instead of a count.
    #[serde(deserialize_with = "years_tested_count")]
    pub years_tested: usize,
    pub last_updated: NaiveDate,
}

fn years_tested_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum YearsTested {
        Count(usize),
        Years(Vec<i32>),
    }

    Ok(match YearsTested::deserialize(deserializer)? {
        YearsTested::Count(n) => n,
        YearsTested::Years(years) => years.len(),
    })
}

impl RegistryEntry {
    pub fn from_summary(summary: &BacktestSummary, updated: NaiveDate) -> Self {
        Self {
            winner: summary.winner,
            median_error: round2(summary.median_avg_error),
            sd_error: round2(summary.sd_avg_error),
            years_tested: summary.years_tested,
            last_updated: updated,
        }
    }

    /// False when no year could be scored; such entries carry placeholder
    /// zero errors.
    pub fn is_tested(&self) -> bool {
        self.winner.is_some() && self.years_tested > 0
    }

    /// The better of the two strategy errors. `None` for untested entries.
    pub fn error_score(&self) -> Option<f64> {
        self.is_tested().then(|| self.median_error.min(self.sd_error))
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RegistryDocument", into = "RegistryDocument")]
pub struct Registry {
    pub last_run: Option<String>,
    pub results: BTreeMap<String, RegistryEntry>,
    /// Entries that did not parse, written back as they were read.
    pub unparsed: BTreeMap<String, serde_json::Value>,
    /// Unknown top-level keys, carried through a load/save cycle untouched.
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// On-disk shape: entries stay raw JSON until each is parsed on its own.
#[derive(Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    last_run: Option<String>,
    #[serde(default)]
    results: BTreeMap<String, serde_json::Value>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl From<RegistryDocument> for Registry {
    fn from(doc: RegistryDocument) -> Self {
        let mut results = BTreeMap::new();
        let mut unparsed = BTreeMap::new();
        for (ticker, raw) in doc.results {
            match RegistryEntry::deserialize(&raw) {
                Ok(entry) => {
                    results.insert(ticker, entry);
                }
                Err(e) => {
                    warn!(%ticker, error = %e, "registry entry unreadable; keeping it as is");
                    unparsed.insert(ticker, raw);
                }
            }
        }
        Self {
            last_run: doc.last_run,
            results,
            unparsed,
            extra: doc.extra,
        }
    }
}

impl From<Registry> for RegistryDocument {
    fn from(registry: Registry) -> Self {
        let mut results = registry.unparsed;
        for (ticker, entry) in registry.results {
            match serde_json::to_value(&entry) {
                Ok(value) => {
                    results.insert(ticker, value);
                }
                Err(e) => warn!(%ticker, error = %e, "registry entry not serializable; dropped"),
            }
        }
        Self {
            last_run: registry.last_run,
            results,
            extra: registry.extra,
        }
    }
}

impl Registry {
    /// Read the registry at `path`. Missing or unreadable files give an
    /// empty registry.
    pub fn load(path: &Path) -> Self {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "registry unreadable; starting empty");
                return Self::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(registry) => registry,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "registry corrupt; starting empty");
                Self::default()
            }
        }
    }

    /// Overwrite the entry of every successful ticker in `outcome` and
    /// stamp `last_run`. Tickers not in the outcome are left as they were.
    /// Returns the number of entries written.
    pub fn merge(&mut self, outcome: &BatchOutcome<BacktestSummary>, now: NaiveDateTime) -> usize {
        let today = now.date();
        for result in &outcome.results {
            self.unparsed.remove(&result.ticker);
            self.results.insert(
                result.ticker.clone(),
                RegistryEntry::from_summary(&result.summary, today),
            );
        }
        self.last_run = Some(now.format(LAST_RUN_FORMAT).to_string());
        outcome.results.len()
    }

    /// Entries refreshed on `date`.
    pub fn updated_on(&self, date: NaiveDate) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.results
            .iter()
            .filter(move |(_, e)| e.last_updated == date)
            .map(|(t, e)| (t.as_str(), e))
    }

    /// Atomically write the registry as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), RegistryError> {
        let io_err = |source: std::io::Error| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, path).map_err(io_err)?;

        info!(path = %path.display(), entries = self.results.len(), "registry saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seasonlab_core::backtest::Confidence;

    use crate::orchestrator::{BatchCounts, TickerResult};

    fn summary(median: f64, sd: f64, years: usize) -> BacktestSummary {
        BacktestSummary {
            winner: Some(if sd < median {
                StrategyKind::Sd
            } else {
                StrategyKind::Median
            }),
            median_avg_error: median,
            sd_avg_error: sd,
            years_tested: years,
            tested_years: Vec::new(),
            confidence: Confidence::from_years(years),
            folds: Vec::new(),
        }
    }

    fn outcome(entries: &[(&str, BacktestSummary)]) -> BatchOutcome<BacktestSummary> {
        BatchOutcome {
            results: entries
                .iter()
                .map(|(t, s)| TickerResult {
                    ticker: t.to_string(),
                    summary: s.clone(),
                })
                .collect(),
            errors: Vec::new(),
            counts: BatchCounts {
                total: entries.len(),
                successful: entries.len(),
                failed: 0,
            },
            elapsed_secs: 0.0,
        }
    }

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(18, 30, 0)
            .unwrap()
    }

    #[test]
    fn errors_rounded_to_two_decimals() {
        let e = RegistryEntry::from_summary(&summary(4.126, 3.874, 5), at(2024, 6, 1).date());
        assert_eq!(e.median_error, 4.13);
        assert_eq!(e.sd_error, 3.87);
        assert_eq!(e.error_score(), Some(3.87));
    }

    #[test]
    fn untested_entry_has_no_error_score() {
        let e = RegistryEntry::from_summary(&BacktestSummary::untested(), at(2024, 6, 1).date());
        assert!(!e.is_tested());
        assert_eq!(e.error_score(), None);
    }

    #[test]
    fn years_tested_accepts_a_list_of_years() {
        let e: RegistryEntry = serde_json::from_str(
            r#"{"winner":"sd","median_error":3.0,"sd_error":2.0,
                "years_tested":[2021,2022,2023],"last_updated":"2024-06-01"}"#,
        )
        .unwrap();
        assert_eq!(e.years_tested, 3);
    }

    #[test]
    fn bad_entry_does_not_cost_its_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"last_run":"2024-01-01 09:00:00","results":{
                "Y.NS":{"winner":"median","median_error":2.0,"sd_error":2.5,
                        "years_tested":[2021,2022,2023],"last_updated":"2024-01-01"},
                "Z.NS":{"winner":"bogus","median_error":"n/a"}}}"#,
        )
        .unwrap();

        let mut reg = Registry::load(&path);
        assert_eq!(reg.results["Y.NS"].years_tested, 3);
        assert!(reg.unparsed.contains_key("Z.NS"));

        reg.merge(&outcome(&[("X", summary(5.0, 6.0, 3))]), at(2024, 2, 1));
        reg.save(&path).unwrap();

        let reloaded = Registry::load(&path);
        let keys: Vec<&str> = reloaded.results.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["X", "Y.NS"]);
        assert_eq!(
            reloaded.unparsed["Z.NS"],
            serde_json::json!({"winner": "bogus", "median_error": "n/a"})
        );
    }

    #[test]
    fn merge_replaces_an_unparsed_entry() {
        let mut reg = Registry::default();
        reg.unparsed.insert("X".into(), serde_json::json!({"winner": 7}));
        reg.merge(&outcome(&[("X", summary(5.0, 6.0, 3))]), at(2024, 2, 1));
        assert!(reg.unparsed.is_empty());
        assert!(reg.results.contains_key("X"));
    }

    #[test]
    fn merge_overwrites_only_touched_tickers() {
        let mut reg = Registry::default();
        reg.merge(&outcome(&[("X", summary(5.0, 6.0, 3)), ("Y", summary(2.0, 1.0, 4))]), at(2024, 1, 1));
        let y_before = reg.results["Y"].clone();

        let n = reg.merge(&outcome(&[("X", summary(9.0, 8.0, 6))]), at(2024, 2, 1));
        assert_eq!(n, 1);
        assert_eq!(reg.results["X"].median_error, 9.0);
        assert_eq!(reg.results["X"].last_updated, at(2024, 2, 1).date());
        assert_eq!(reg.results["Y"], y_before);
        assert_eq!(reg.last_run.as_deref(), Some("2024-02-01 18:30:00"));
    }

    #[test]
    fn untested_summary_stores_null_winner() {
        let mut reg = Registry::default();
        reg.merge(&outcome(&[("Z", BacktestSummary::untested())]), at(2024, 1, 1));
        let json = serde_json::to_string(&reg).unwrap();
        assert!(json.contains(r#""winner":null"#), "{json}");
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/registry.json");

        let mut reg = Registry::default();
        reg.merge(&outcome(&[("INFY.NS", summary(4.0, 3.5, 5))]), at(2024, 6, 1));
        reg.save(&path).unwrap();

        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(Registry::load(&path), reg);
    }

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Registry::load(&dir.path().join("none.json")), Registry::default());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, "{ not json").unwrap();
        assert_eq!(Registry::load(&bad), Registry::default());
    }

    #[test]
    fn unknown_keys_survive_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("registry.json");
        fs::write(
            &path,
            r#"{"last_run":null,"results":{},"schema":"v1"}"#,
        )
        .unwrap();
        let reg = Registry::load(&path);
        assert_eq!(reg.extra.get("schema"), Some(&serde_json::json!("v1")));
        reg.save(&path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("\"schema\""));
    }

    #[test]
    fn reads_documents_with_winner_strings() {
        let reg: Registry = serde_json::from_str(
            r#"{"last_run":"2024-06-01 18:30:00","results":{"SBIN.NS":
                {"winner":"median","median_error":2.5,"sd_error":3.1,
                 "years_tested":4,"last_updated":"2024-06-01"}}}"#,
        )
        .unwrap();
        assert_eq!(reg.results["SBIN.NS"].winner, Some(StrategyKind::Median));
        assert_eq!(reg.updated_on(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()).count(), 1);
    }
}
