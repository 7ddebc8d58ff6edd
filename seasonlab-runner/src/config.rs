//! Batch configuration (TOML).
//!
//! ```toml
//! tickers = ["INFY.NS - Infosys Ltd", "TCS.NS"]
//! # universe_path = "universe.toml"
//!
//! [batch]
//! max_workers = 5
//! rate_delay_secs = 1.0
//! registry_path = "data/backtest_registry.json"
//! report_path = "backtest_summary.md"
//!
//! [backtest]
//! aggregation = "median"
//! sd_bias = -0.5
//! exclude_outliers = true
//! # lookback_years = 3
//! # reference_date = "2023-12-31"
//!
//! [data]
//! source = "yahoo"
//! csv_dir = "data/csv"
//! start_date = "2005-01-01"
//! ```
//!
//! Every key is optional. Without `tickers` or `universe_path` the built-in
//! NSE universe is used.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use seasonlab_core::backtest::BacktestConfig;
use seasonlab_core::data::{
    parse_ticker_entry, CircuitBreaker, CsvProvider, DataError, DataSource, HistoryProvider,
    SyntheticProvider, Universe, UniverseError, YahooProvider,
};

use crate::orchestrator::RatePolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Universe(#[from] UniverseError),

    #[error(transparent)]
    Data(#[from] DataError),
}

// ─── Sections ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub max_workers: usize,
    /// Per-worker pause before each ticker, in seconds.
    pub rate_delay_secs: f64,
    pub registry_path: PathBuf,
    pub report_path: PathBuf,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            max_workers: 5,
            rate_delay_secs: 1.0,
            registry_path: PathBuf::from("data/backtest_registry.json"),
            report_path: PathBuf::from("backtest_summary.md"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub source: DataSource,
    pub csv_dir: PathBuf,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Base seed for the synthetic source.
    pub seed: u64,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            source: DataSource::Yahoo,
            csv_dir: PathBuf::from("data/csv"),
            start_date: None,
            end_date: None,
            seed: 42,
        }
    }
}

impl DataSection {
    /// Build the configured history provider.
    pub fn build_provider(&self) -> Result<Arc<dyn HistoryProvider>, ConfigError> {
        let provider: Arc<dyn HistoryProvider> = match self.source {
            DataSource::Yahoo => {
                let yahoo = YahooProvider::new(Arc::new(CircuitBreaker::default_provider()))?;
                match self.start_date {
                    Some(start) => Arc::new(yahoo.with_range(start, self.end_date)),
                    None => Arc::new(yahoo),
                }
            }
            DataSource::Csv => Arc::new(CsvProvider::new(&self.csv_dir)),
            DataSource::Synthetic => {
                let start = self
                    .start_date
                    .or_else(|| NaiveDate::from_ymd_opt(2010, 1, 1))
                    .ok_or_else(|| ConfigError::Invalid("bad synthetic start".into()))?;
                let end = self
                    .end_date
                    .unwrap_or_else(|| chrono::Local::now().date_naive());
                Arc::new(SyntheticProvider::new(start, end).with_seed(self.seed))
            }
        };
        Ok(provider)
    }
}

// ─── Top level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub tickers: Vec<String>,
    pub universe_path: Option<PathBuf>,
    pub batch: BatchSection,
    pub backtest: BacktestConfig,
    pub data: DataSection,
}

impl BatchConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_workers == 0 {
            return Err(ConfigError::Invalid("batch.max_workers must be at least 1".into()));
        }
        if !self.batch.rate_delay_secs.is_finite() || self.batch.rate_delay_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "batch.rate_delay_secs must be a non-negative number".into(),
            ));
        }
        if !self.backtest.sd_bias.is_finite() {
            return Err(ConfigError::Invalid("backtest.sd_bias must be finite".into()));
        }
        if self.backtest.lookback_years == Some(0) {
            return Err(ConfigError::Invalid(
                "backtest.lookback_years must be at least 1".into(),
            ));
        }
        if let (Some(start), Some(end)) = (self.data.start_date, self.data.end_date) {
            if end < start {
                return Err(ConfigError::Invalid(format!(
                    "data.end_date {end} is before data.start_date {start}"
                )));
            }
        }
        Ok(())
    }

    pub fn rate_policy(&self) -> RatePolicy {
        RatePolicy::from_secs_f64(self.batch.rate_delay_secs)
    }

    /// Tickers to process: the explicit list, else the universe file, else
    /// the built-in universe. Labels are stripped and duplicates dropped,
    /// keeping first-seen order.
    pub fn resolve_tickers(&self) -> Result<Vec<String>, ConfigError> {
        if !self.tickers.is_empty() {
            return Ok(dedup_entries(&self.tickers));
        }
        let universe = match &self.universe_path {
            Some(path) => Universe::from_file(path)?,
            None => Universe::default_nse(),
        };
        Ok(universe.all_tickers())
    }
}

/// Strip labels and drop blanks and repeats from raw ticker entries.
pub fn dedup_entries(entries: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    entries
        .iter()
        .filter_map(|e| parse_ticker_entry(e))
        .filter(|t| seen.insert(t.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use seasonlab_core::backtest::ErrorAggregation;

    #[test]
    fn empty_document_is_all_defaults() {
        let config = BatchConfig::from_toml("").unwrap();
        assert_eq!(config, BatchConfig::default());
        assert_eq!(config.batch.max_workers, 5);
        assert_eq!(config.batch.rate_delay_secs, 1.0);
        assert_eq!(config.backtest.sd_bias, -0.5);
        assert_eq!(config.data.source, DataSource::Yahoo);
    }

    #[test]
    fn parses_every_section() {
        let config = BatchConfig::from_toml(
            r#"
            tickers = ["INFY.NS - Infosys Ltd", "TCS.NS", "INFY.NS"]

            [batch]
            max_workers = 3
            rate_delay_secs = 0.5

            [backtest]
            aggregation = "mean"
            sd_bias = -1.0
            exclude_outliers = false
            lookback_years = 3
            reference_date = "2023-12-31"

            [data]
            source = "synthetic"
            start_date = "2015-01-01"
            "#,
        )
        .unwrap();
        assert_eq!(config.batch.max_workers, 3);
        assert_eq!(config.rate_policy().delay.as_millis(), 500);
        assert_eq!(config.backtest.aggregation, ErrorAggregation::Mean);
        assert!(!config.backtest.exclude_outliers);
        assert_eq!(config.backtest.lookback_years, Some(3));
        assert_eq!(config.backtest.reference_date, NaiveDate::from_ymd_opt(2023, 12, 31));
        assert_eq!(config.data.source, DataSource::Synthetic);
        assert_eq!(config.resolve_tickers().unwrap(), vec!["INFY.NS", "TCS.NS"]);
    }

    #[test]
    fn zero_workers_rejected() {
        let err = BatchConfig::from_toml("[batch]\nmax_workers = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_lookback_rejected() {
        let err = BatchConfig::from_toml("[backtest]\nlookback_years = 0\n").unwrap_err();
        assert!(err.to_string().contains("lookback_years"));
    }

    #[test]
    fn negative_delay_rejected() {
        let err = BatchConfig::from_toml("[batch]\nrate_delay_secs = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn inverted_date_range_rejected() {
        let err = BatchConfig::from_toml(
            "[data]\nstart_date = \"2020-01-01\"\nend_date = \"2019-01-01\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("before"));
    }

    #[test]
    fn universe_file_supplies_tickers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("universe.toml");
        std::fs::write(&path, "[sectors]\nBanks = [\"SBIN.NS - State Bank of India\"]\n").unwrap();
        let config = BatchConfig {
            universe_path: Some(path),
            ..BatchConfig::default()
        };
        assert_eq!(config.resolve_tickers().unwrap(), vec!["SBIN.NS"]);
    }

    #[test]
    fn default_universe_when_nothing_configured() {
        assert_eq!(BatchConfig::default().resolve_tickers().unwrap().len(), 10);
    }

    #[test]
    fn csv_source_builds_csv_provider() {
        let data = DataSection {
            source: DataSource::Csv,
            ..DataSection::default()
        };
        assert_eq!(data.build_provider().unwrap().name(), "csv");
    }
}
