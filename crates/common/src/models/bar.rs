use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::AlertError;

/// One daily OHLCV bar as returned by the market-data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Chronological price history, oldest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    pub closes: Vec<f64>,
    pub highs: Vec<f64>,
    pub lows: Vec<f64>,
    pub volumes: Vec<f64>,
}

impl PriceSeries {
    pub fn from_bars(bars: &[DailyBar]) -> Self {
        Self {
            closes: bars.iter().map(|b| b.close).collect(),
            highs: bars.iter().map(|b| b.high).collect(),
            lows: bars.iter().map(|b| b.low).collect(),
            volumes: bars.iter().map(|b| b.volume).collect(),
        }
    }
}

/// Outcome of fetching one symbol inside a batch.
#[derive(Debug, Clone)]
pub struct SymbolBars {
    pub symbol: String,
    pub result: Result<Vec<DailyBar>, AlertError>,
}

impl SymbolBars {
    pub fn ok(symbol: impl Into<String>, bars: Vec<DailyBar>) -> Self {
        Self {
            symbol: symbol.into(),
            result: Ok(bars),
        }
    }

    pub fn failed(symbol: impl Into<String>, error: AlertError) -> Self {
        Self {
            symbol: symbol.into(),
            result: Err(error),
        }
    }
}
