//! Domain types for SeasonLab

pub mod bar;
pub mod history;

pub use bar::PriceBar;
pub use history::{days_in_month, HistoryError, PriceHistory};
