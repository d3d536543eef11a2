use std::time::Duration;

use anyhow::{Context, bail};
use async_trait::async_trait;
use chrono::Utc;
use common::error::AlertError;
use common::models::{DailyBar, SymbolBars};
use futures_util::future::join_all;
use reqwest::Client;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use crate::remote::chart_response::ChartResponse;
use crate::traits::{MarketDataProvider, RemoteResponse};

pub const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/";

pub struct YahooClient {
    client: Client,
    base_url: Url,
    batch_size: usize,
    request_delay_ms: u64,
}

impl YahooClient {
    pub fn new(timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (signal-relay/0.1)")
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: parse_base_url(DEFAULT_BASE_URL)?,
            batch_size: 20,
            request_delay_ms: 250,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, AlertError> {
        self.base_url = parse_base_url(base_url)?;
        Ok(self)
    }

    pub fn with_batching(mut self, batch_size: usize, request_delay_ms: u64) -> Self {
        self.batch_size = batch_size.max(1);
        self.request_delay_ms = request_delay_ms;
        self
    }

    /// `{base}/{symbol}?period1=..&period2=..&interval=1d`, with the symbol
    /// kept as a single path segment.
    pub fn chart_url(&self, symbol: &str, lookback_days: u32) -> anyhow::Result<Url> {
        let now = Utc::now().timestamp();
        let start = now - i64::from(lookback_days) * 86_400;

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("base url cannot carry a path"))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("period1", &start.to_string())
            .append_pair("period2", &now.to_string())
            .append_pair("interval", "1d");
        Ok(url)
    }

    async fn make_request(&self, symbol: &str, lookback_days: u32) -> anyhow::Result<ChartResponse> {
        let url = self.chart_url(symbol, lookback_days)?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        if status == 429 {
            bail!("HTTP 429: Too Many Requests");
        }
        // Yahoo answers 404 with a JSON error envelope for unknown symbols.
        if !status.is_success() && status != 404 {
            bail!("HTTP {}", status);
        }

        let data = response
            .json::<ChartResponse>()
            .await
            .context("Failed to parse JSON response")?;
        Ok(data)
    }

    fn is_rate_limit_error(error: &AlertError) -> bool {
        let error_str = error.to_string();
        error_str.contains("429") || error_str.contains("Too Many Requests")
    }
}

fn parse_base_url(raw: &str) -> Result<Url, AlertError> {
    Url::parse(raw).map_err(|e| AlertError::configuration(format!("invalid base url '{}': {}", raw, e)))
}

#[async_trait]
impl MarketDataProvider for YahooClient {
    async fn daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<DailyBar>, AlertError> {
        let response = self
            .make_request(symbol, lookback_days)
            .await
            .map_err(|e| AlertError::transport(format!("{}: {:#}", symbol, e)))?;

        let bars = response.to_model()?;
        debug!("Fetched {} daily bars for {}", bars.len(), symbol);
        Ok(bars)
    }

    async fn daily_bars_batch(&self, symbols: &[String], lookback_days: u32) -> Vec<SymbolBars> {
        let mut results = Vec::with_capacity(symbols.len());
        let mut rate_limited = false;

        for (i, chunk) in symbols.chunks(self.batch_size).enumerate() {
            if rate_limited {
                results.extend(chunk.iter().map(|symbol| {
                    SymbolBars::failed(symbol, AlertError::transport("skipped after rate limit"))
                }));
                continue;
            }

            if i > 0 {
                sleep(Duration::from_millis(self.request_delay_ms)).await;
            }

            let fetched = join_all(
                chunk
                    .iter()
                    .map(|symbol| self.daily_bars(symbol, lookback_days)),
            )
            .await;

            for (symbol, result) in chunk.iter().zip(fetched) {
                if let Err(ref e) = result {
                    if Self::is_rate_limit_error(e) {
                        rate_limited = true;
                    }
                }
                results.push(SymbolBars {
                    symbol: symbol.clone(),
                    result,
                });
            }

            if rate_limited {
                warn!("Rate limit detected, stopping further requests");
            }
        }

        results
    }
}
