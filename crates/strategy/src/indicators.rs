use common::error::AlertError;
use ta::indicators::{SimpleMovingAverage, TrueRange};
use ta::{Close, High, Low, Next};

pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;
pub const BREAKOUT_LOOKBACK: usize = 20;

/// Borrowed view of one bar so `ta`'s true range can consume it.
struct BarRef {
    high: f64,
    low: f64,
    close: f64,
}

impl High for BarRef {
    fn high(&self) -> f64 {
        self.high
    }
}

impl Low for BarRef {
    fn low(&self) -> f64 {
        self.low
    }
}

impl Close for BarRef {
    fn close(&self) -> f64 {
        self.close
    }
}

fn new_sma(period: usize) -> Result<SimpleMovingAverage, AlertError> {
    SimpleMovingAverage::new(period)
        .map_err(|e| AlertError::configuration(format!("invalid SMA period {}: {:?}", period, e)))
}

fn require(indicator: &'static str, required: usize, available: usize) -> Result<(), AlertError> {
    if available < required {
        return Err(AlertError::insufficient(indicator, required, available));
    }
    Ok(())
}

/// Arithmetic mean of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Result<f64, AlertError> {
    require("SMA", period, values.len())?;
    let mut sma = new_sma(period)?;

    Ok(values[values.len() - period..]
        .iter()
        .fold(0.0, |_, v| sma.next(*v)))
}

/// RSI over the last `period` changes, using plain averages of gains and
/// losses. Always within `[0, 100]`; 100 when there was no loss at all.
pub fn rsi(closes: &[f64], period: usize) -> Result<f64, AlertError> {
    require("RSI", period + 1, closes.len())?;

    let mut avg_gain = new_sma(period)?;
    let mut avg_loss = new_sma(period)?;
    let mut gain = 0.0;
    let mut loss = 0.0;

    for pair in closes[closes.len() - period - 1..].windows(2) {
        let change = pair[1] - pair[0];
        gain = avg_gain.next(change.max(0.0));
        loss = avg_loss.next((-change).max(0.0));
    }

    if loss == 0.0 {
        return Ok(100.0);
    }
    Ok(100.0 - 100.0 / (1.0 + gain / loss))
}

/// Mean true range of the last `period` bars. Slices are aligned on their
/// last element.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Result<f64, AlertError> {
    let available = highs.len().min(lows.len()).min(closes.len());
    require("ATR", period + 1, available)?;

    let tail = |v: &[f64]| v[v.len() - period - 1..].to_vec();
    let (highs, lows, closes) = (tail(highs), tail(lows), tail(closes));

    let mut true_range = TrueRange::new();
    let mut mean = new_sma(period)?;
    let mut value = 0.0;

    // The first bar only seeds the previous close; its TR falls out of the window.
    for i in 0..=period {
        let bar = BarRef {
            high: highs[i],
            low: lows[i],
            close: closes[i],
        };
        value = mean.next(true_range.next(&bar));
    }

    Ok(value.max(0.0))
}

/// Whether the last close broke above / below the closes of the
/// `lookback` bars before it.
pub fn breakout(closes: &[f64], lookback: usize) -> Result<(bool, bool), AlertError> {
    require("breakout", lookback + 1, closes.len())?;

    let last = closes[closes.len() - 1];
    let prior = &closes[closes.len() - 1 - lookback..closes.len() - 1];
    let max = prior.iter().copied().fold(f64::MIN, f64::max);
    let min = prior.iter().copied().fold(f64::MAX, f64::min);

    Ok((last > max, last < min))
}
