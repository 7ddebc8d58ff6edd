//! The per-ticker backtest task: fetch history, then run the engine.

use seasonlab_core::backtest::{BacktestEngine, BacktestSummary};
use seasonlab_core::data::HistoryProvider;
use tracing::debug;

use crate::orchestrator::{TaskError, TickerTask};

pub struct BacktestTask<P> {
    provider: P,
    engine: BacktestEngine,
}

impl<P: HistoryProvider> BacktestTask<P> {
    pub fn new(provider: P, engine: BacktestEngine) -> Self {
        Self { provider, engine }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }
}

impl<P: HistoryProvider> TickerTask for BacktestTask<P> {
    type Output = BacktestSummary;

    fn process(&self, ticker: &str) -> Result<BacktestSummary, TaskError> {
        let history = self.provider.fetch_history(ticker)?;
        if history.is_empty() {
            return Err(TaskError::DataUnavailable {
                ticker: ticker.to_string(),
            });
        }
        debug!(
            ticker,
            provider = self.provider.name(),
            bars = history.len(),
            "running backtest"
        );
        Ok(self.engine.run(&history))
    }
}
