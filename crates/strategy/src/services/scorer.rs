use common::error::AlertError;
use common::models::{Analysis, Decision, PriceSeries, Settings, Side, TradeIdea, Trend};
use common::symbols::canonical_symbol;
use tracing::debug;

use crate::indicators::{self, ATR_PERIOD, BREAKOUT_LOOKBACK, RSI_PERIOD};

/// Bars required before any analysis is attempted.
pub const MIN_BARS: usize = 60;

pub const STOP_ATR_MULT: f64 = 1.5;
pub const TP1_ATR_MULT: f64 = 1.5;
pub const TP2_ATR_MULT: f64 = 3.0;

const TREND_POINTS: u8 = 3;
const BREAKOUT_POINTS: u8 = 3;
const RSI_POINTS: u8 = 2;

const LONG_RSI_BAND: (f64, f64) = (50.0, 72.0);
const SHORT_RSI_BAND: (f64, f64) = (28.0, 50.0);

/// Scores a daily history into one trade idea per side enabled in
/// `settings.side`.
///
/// Any indicator failure aborts the whole analysis; there is no partial
/// result.
pub fn analyze(symbol: &str, series: &PriceSeries, settings: &Settings) -> Result<Analysis, AlertError> {
    for (name, len) in [
        ("closes", series.closes.len()),
        ("highs", series.highs.len()),
        ("lows", series.lows.len()),
    ] {
        if len < MIN_BARS {
            return Err(AlertError::insufficient(name, MIN_BARS, len));
        }
    }

    let closes = &series.closes;
    let entry = closes[closes.len() - 1];
    let ma20 = indicators::sma(closes, 20)?;
    let ma50 = indicators::sma(closes, 50)?;
    let rsi14 = indicators::rsi(closes, RSI_PERIOD)?;
    let atr14 = indicators::atr(&series.highs, &series.lows, closes, ATR_PERIOD)?;
    let (breakout_up, breakout_down) = indicators::breakout(closes, BREAKOUT_LOOKBACK)?;
    let trend = classify_trend(entry, ma20, ma50);

    let symbol = canonical_symbol(symbol);
    debug!(
        "{}: entry={:.2} ma20={:.2} ma50={:.2} rsi={:.1} atr={:.2} trend={} up={} down={}",
        symbol, entry, ma20, ma50, rsi14, atr14, trend, breakout_up, breakout_down
    );

    let ctx = Indicators {
        entry,
        rsi14,
        atr14,
        trend,
        breakout_up,
        breakout_down,
    };
    let ideas = settings
        .side
        .sides()
        .iter()
        .map(|side| build_idea(*side, &ctx, settings))
        .collect();

    Ok(Analysis {
        symbol,
        entry,
        ma20,
        ma50,
        rsi14,
        atr14,
        trend,
        breakout_up,
        breakout_down,
        ideas,
    })
}

struct Indicators {
    entry: f64,
    rsi14: f64,
    atr14: f64,
    trend: Trend,
    breakout_up: bool,
    breakout_down: bool,
}

pub fn classify_trend(entry: f64, ma20: f64, ma50: f64) -> Trend {
    if entry > ma50 && ma20 > ma50 {
        Trend::Up
    } else if entry < ma50 && ma20 < ma50 {
        Trend::Down
    } else {
        Trend::Neutral
    }
}

/// `(stop, tp1, tp2)` in ATR multiples around `entry`.
pub fn atr_levels(side: Side, entry: f64, atr: f64) -> (f64, f64, f64) {
    let sign = match side {
        Side::Long => 1.0,
        Side::Short => -1.0,
    };
    (
        entry - sign * STOP_ATR_MULT * atr,
        entry + sign * TP1_ATR_MULT * atr,
        entry + sign * TP2_ATR_MULT * atr,
    )
}

/// Whole units such that hitting the stop loses `risk_pct` of `capital`.
pub fn position_size(capital: f64, risk_pct: f64, entry: f64, stop: f64) -> u64 {
    let per_unit = (entry - stop).abs();
    if per_unit == 0.0 || !per_unit.is_finite() {
        return 0;
    }
    let units = (capital * risk_pct / 100.0 / per_unit).floor();
    if units.is_finite() && units > 0.0 {
        units as u64
    } else {
        0
    }
}

fn build_idea(side: Side, ind: &Indicators, settings: &Settings) -> TradeIdea {
    let (stop_loss, take_profit1, take_profit2) = atr_levels(side, ind.entry, ind.atr14);
    let mut score = 0u8;
    let mut reasons = Vec::new();

    let (aligned, against, breakout, band) = match side {
        Side::Long => (Trend::Up, Trend::Down, ind.breakout_up, LONG_RSI_BAND),
        Side::Short => (Trend::Down, Trend::Up, ind.breakout_down, SHORT_RSI_BAND),
    };

    if ind.trend == aligned {
        score += TREND_POINTS;
        reasons.push(format!("+{} trend {} (price and MA20 vs MA50)", TREND_POINTS, aligned));
    } else if ind.trend == against {
        reasons.push(format!("Counter-trend: market is trending {}", against));
    } else {
        reasons.push("Trend neutral".to_string());
    }

    if breakout {
        let edge = match side {
            Side::Long => "above the 20-day high",
            Side::Short => "below the 20-day low",
        };
        score += BREAKOUT_POINTS;
        reasons.push(format!("+{} breakout {}", BREAKOUT_POINTS, edge));
    } else {
        reasons.push("No breakout".to_string());
    }

    let (low, high) = band;
    if (low..=high).contains(&ind.rsi14) {
        score += RSI_POINTS;
        reasons.push(format!("+{} RSI {:.1} in {:.0}-{:.0}", RSI_POINTS, ind.rsi14, low, high));
    } else if ind.rsi14 > high {
        let note = match side {
            Side::Long => "overbought",
            Side::Short => "momentum against short",
        };
        reasons.push(format!("Caution: RSI {:.1} {}", ind.rsi14, note));
    } else {
        let note = match side {
            Side::Long => "weak momentum",
            Side::Short => "oversold",
        };
        reasons.push(format!("Caution: RSI {:.1} {}", ind.rsi14, note));
    }

    TradeIdea {
        side,
        decision: Decision::from_score(score),
        score,
        entry: ind.entry,
        stop_loss,
        take_profit1,
        take_profit2,
        quantity: position_size(settings.capital, settings.risk_pct, ind.entry, stop_loss),
        reasons,
    }
}
