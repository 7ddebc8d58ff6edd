//! Data layer: history providers and the ticker universe.

pub mod circuit_breaker;
pub mod csv_import;
pub mod provider;
pub mod synthetic;
pub mod universe;
pub mod yahoo;

pub use circuit_breaker::CircuitBreaker;
pub use csv_import::CsvProvider;
pub use provider::{canonicalize, DataError, DataSource, HistoryProvider};
pub use synthetic::SyntheticProvider;
pub use universe::{parse_ticker_entry, Universe, UniverseError};
pub use yahoo::YahooProvider;
