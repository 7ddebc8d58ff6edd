//! Ticker universe: sector-organized ticker lists stored as TOML.
//!
//! Entries may be bare symbols (`"INFY.NS"`) or display labels of the form
//! `"INFY.NS - Infosys Ltd"`; only the symbol part is ever fetched.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("read universe file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("parse universe TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize universe: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Strip a `"SYM - Company Name"` label down to `"SYM"`. Blank entries
/// yield `None`.
pub fn parse_ticker_entry(entry: &str) -> Option<&str> {
    let symbol = entry.split(" - ").next().unwrap_or(entry).trim();
    (!symbol.is_empty()).then_some(symbol)
}

/// Sector name -> member entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Universe {
    pub sectors: BTreeMap<String, Vec<String>>,
}

impl Universe {
    pub fn from_file(path: &Path) -> Result<Self, UniverseError> {
        let content = std::fs::read_to_string(path).map_err(|source| UniverseError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, UniverseError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String, UniverseError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Every symbol across all sectors, labels stripped, first occurrence
    /// kept when a symbol is listed under several sectors.
    pub fn all_tickers(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.sectors
            .values()
            .flatten()
            .filter_map(|entry| parse_ticker_entry(entry))
            .filter(|sym| seen.insert(sym.to_string()))
            .map(str::to_string)
            .collect()
    }

    /// Symbols of one sector, labels stripped.
    pub fn sector_tickers(&self, sector: &str) -> Option<Vec<String>> {
        self.sectors.get(sector).map(|entries| {
            entries
                .iter()
                .filter_map(|e| parse_ticker_entry(e))
                .map(str::to_string)
                .collect()
        })
    }

    pub fn sector_names(&self) -> Vec<&str> {
        self.sectors.keys().map(String::as_str).collect()
    }

    pub fn ticker_count(&self) -> usize {
        self.all_tickers().len()
    }

    /// Large-cap NSE names used when no universe file is configured.
    pub fn default_nse() -> Self {
        let sector = |entries: &[&str]| entries.iter().map(|s| s.to_string()).collect();
        let mut sectors = BTreeMap::new();
        sectors.insert(
            "Financials".into(),
            sector(&[
                "HDFCBANK.NS - HDFC Bank Ltd",
                "ICICIBANK.NS - ICICI Bank Ltd",
                "SBIN.NS - State Bank of India",
                "KOTAKBANK.NS - Kotak Mahindra Bank Ltd",
            ]),
        );
        sectors.insert(
            "Technology".into(),
            sector(&[
                "TCS.NS - Tata Consultancy Services Ltd",
                "INFY.NS - Infosys Ltd",
            ]),
        );
        sectors.insert(
            "Energy".into(),
            sector(&["RELIANCE.NS - Reliance Industries Ltd"]),
        );
        sectors.insert(
            "Consumer".into(),
            sector(&["ITC.NS - ITC Ltd", "BHARTIARTL.NS - Bharti Airtel Ltd"]),
        );
        sectors.insert(
            "Industrials".into(),
            sector(&["LT.NS - Larsen & Toubro Ltd"]),
        );
        Self { sectors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stripped() {
        assert_eq!(
            parse_ticker_entry("RELIANCE.NS - Reliance Industries Ltd"),
            Some("RELIANCE.NS")
        );
        assert_eq!(parse_ticker_entry("  SPY "), Some("SPY"));
        assert_eq!(parse_ticker_entry("   "), None);
    }

    #[test]
    fn default_universe_has_sectors() {
        let u = Universe::default_nse();
        assert!(u.sector_names().contains(&"Technology"));
        assert_eq!(u.ticker_count(), 10);
        assert!(u.all_tickers().contains(&"INFY.NS".to_string()));
    }

    #[test]
    fn duplicates_across_sectors_collapse() {
        let u = Universe::from_toml(
            r#"
            [sectors]
            Banks = ["SBIN.NS - State Bank of India", "HDFCBANK.NS"]
            PSU = ["SBIN.NS"]
            "#,
        )
        .unwrap();
        assert_eq!(u.all_tickers(), vec!["SBIN.NS", "HDFCBANK.NS"]);
        assert_eq!(u.sector_tickers("PSU").unwrap(), vec!["SBIN.NS"]);
    }

    #[test]
    fn toml_roundtrip() {
        let u = Universe::default_nse();
        let parsed = Universe::from_toml(&u.to_toml().unwrap()).unwrap();
        assert_eq!(u, parsed);
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = Universe::from_file(Path::new("/nonexistent/universe.toml")).unwrap_err();
        assert!(matches!(err, UniverseError::Read { .. }));
    }
}
