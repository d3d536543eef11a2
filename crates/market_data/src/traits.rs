use async_trait::async_trait;
use common::error::AlertError;
use common::models::{DailyBar, SymbolBars};

pub trait RemoteResponse<T> {
    fn to_model(&self) -> Result<T, AlertError>;
}

/// Source of daily OHLCV history.
///
/// Implementations must bound every request by a timeout and report
/// per-symbol failures instead of failing a whole batch.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn daily_bars(&self, symbol: &str, lookback_days: u32)
    -> Result<Vec<DailyBar>, AlertError>;

    /// Fetches several symbols. The default runs them one after another;
    /// remote clients override it with batched concurrent requests.
    async fn daily_bars_batch(&self, symbols: &[String], lookback_days: u32) -> Vec<SymbolBars> {
        let mut results = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            let result = self.daily_bars(symbol, lookback_days).await;
            results.push(SymbolBars {
                symbol: symbol.clone(),
                result,
            });
        }
        results
    }
}
