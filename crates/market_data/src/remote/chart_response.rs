use chrono::DateTime;
use common::error::AlertError;
use common::models::DailyBar;
use serde::Deserialize;

use crate::traits::RemoteResponse;

#[derive(Debug, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct ChartEnvelope {
    pub result: Option<Vec<ChartData>>,
    pub error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
pub struct ChartError {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
pub struct ChartData {
    pub timestamp: Option<Vec<i64>>,
    pub indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
pub struct ChartIndicators {
    pub quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
pub struct ChartQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

impl RemoteResponse<Vec<DailyBar>> for ChartResponse {
    fn to_model(&self) -> Result<Vec<DailyBar>, AlertError> {
        if let Some(ref error) = self.chart.error {
            return Err(AlertError::transport(format!(
                "provider error: {} - {}",
                error.code, error.description
            )));
        }

        let data = self
            .chart
            .result
            .as_ref()
            .and_then(|r| r.first())
            .ok_or_else(|| AlertError::transport("empty chart result"))?;

        let Some(ref timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };
        let Some(quote) = data.indicators.quote.first() else {
            return Ok(Vec::new());
        };

        // Rows with any missing field (halts, partial sessions) are dropped.
        let bars = timestamps
            .iter()
            .enumerate()
            .filter_map(|(i, ts)| {
                let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
                Some(DailyBar {
                    date,
                    open: quote.open.get(i).copied().flatten()?,
                    high: quote.high.get(i).copied().flatten()?,
                    low: quote.low.get(i).copied().flatten()?,
                    close: quote.close.get(i).copied().flatten()?,
                    volume: quote.volume.get(i).copied().flatten()?,
                })
            })
            .collect();

        Ok(bars)
    }
}
