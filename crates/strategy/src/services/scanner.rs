use std::collections::HashSet;

use common::error::AlertError;
use common::models::{DailyBar, SymbolBars};
use common::symbols::canonical_symbol;
use market_data::MarketDataProvider;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

/// Screener thresholds. The score weighting is a hand-tuned heuristic,
/// kept configurable rather than fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub min_price: f64,
    pub max_price: f64,
    pub min_avg_volume: f64,
    pub volume_window: usize,
    /// Average volume is divided by this before being added to the % change.
    pub volume_divisor: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub top_n: usize,
    pub lookback_days: u32,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_price: 5.0,
            max_price: 500.0,
            min_avg_volume: 1_000_000.0,
            volume_window: 20,
            volume_divisor: 10_000_000.0,
            stop_loss_pct: 3.0,
            take_profit_pct: 6.0,
            top_n: 10,
            lookback_days: 45,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanPick {
    pub symbol: String,
    pub price: f64,
    pub change_pct: f64,
    pub avg_volume: f64,
    pub score: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    #[error("fetch failed: {0}")]
    Fetch(AlertError),
    #[error("not enough data ({closes} closes, {volumes} volumes)")]
    NotEnoughData { closes: usize, volumes: usize },
    #[error("previous close is zero")]
    ZeroPreviousClose,
    #[error("price {0:.2} outside band")]
    PriceOutOfBand(f64),
    #[error("average volume {0:.0} below minimum")]
    LowVolume(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanFailure {
    pub symbol: String,
    pub rejection: Rejection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub scanned: usize,
    pub picks: Vec<ScanPick>,
    pub failures: Vec<ScanFailure>,
}

/// Canonical symbols in first-seen order, without duplicates.
pub fn unique_symbols(symbols: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .iter()
        .map(|s| canonical_symbol(s))
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

const MIN_CLOSES: usize = 2;
const MIN_VOLUMES: usize = 5;

pub fn evaluate(symbol: &str, bars: &[DailyBar], config: &ScanConfig) -> Result<ScanPick, Rejection> {
    if bars.len() < MIN_CLOSES.max(MIN_VOLUMES) {
        return Err(Rejection::NotEnoughData {
            closes: bars.len(),
            volumes: bars.len(),
        });
    }

    let price = bars[bars.len() - 1].close;
    let previous = bars[bars.len() - 2].close;
    if previous == 0.0 {
        return Err(Rejection::ZeroPreviousClose);
    }
    let change_pct = (price - previous) / previous * 100.0;

    let window = config.volume_window.max(1).min(bars.len());
    let avg_volume = bars[bars.len() - window..]
        .iter()
        .map(|b| b.volume)
        .sum::<f64>()
        / window as f64;

    if price < config.min_price || price > config.max_price {
        return Err(Rejection::PriceOutOfBand(price));
    }
    if avg_volume < config.min_avg_volume {
        return Err(Rejection::LowVolume(avg_volume));
    }

    Ok(ScanPick {
        symbol: symbol.to_string(),
        price,
        change_pct,
        avg_volume,
        score: change_pct + avg_volume / config.volume_divisor,
        stop_loss: price * (1.0 - config.stop_loss_pct / 100.0),
        take_profit: price * (1.0 + config.take_profit_pct / 100.0),
    })
}

/// Ranks fetched symbols by score, highest first, keeping the top
/// `config.top_n`. Every excluded symbol is reported with its reason.
pub fn rank(fetches: Vec<SymbolBars>, config: &ScanConfig) -> ScanReport {
    let mut report = ScanReport {
        scanned: fetches.len(),
        ..ScanReport::default()
    };

    for SymbolBars { symbol, result } in fetches {
        let evaluated = result
            .map_err(Rejection::Fetch)
            .and_then(|bars| evaluate(&symbol, &bars, config));

        match evaluated {
            Ok(pick) => report.picks.push(pick),
            Err(rejection) => {
                debug!("Scanner dropped {}: {}", symbol, rejection);
                report.failures.push(ScanFailure { symbol, rejection });
            }
        }
    }

    report.picks.sort_by(|a, b| b.score.total_cmp(&a.score));
    report.picks.truncate(config.top_n);
    report
}

pub async fn scan(
    provider: &dyn MarketDataProvider,
    symbols: &[String],
    config: &ScanConfig,
) -> ScanReport {
    let universe = unique_symbols(symbols);
    let fetches = provider
        .daily_bars_batch(&universe, config.lookback_days)
        .await;
    let report = rank(fetches, config);

    info!(
        "Scan complete: {} symbols, {} picks, {} excluded",
        report.scanned,
        report.picks.len(),
        report.failures.len()
    );
    report
}
