use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::{fmt, str::FromStr};
use thiserror::Error;

use super::trade_idea::Side;
use crate::symbols::canonical_symbol;

/// Payload keys tried in order; the first non-empty value wins.
pub const TICKER_FIELDS: &[&str] = &["ticker", "symbol", "tv_symbol"];
pub const DIRECTION_FIELDS: &[&str] = &["direction", "action", "side", "signal"];
pub const PRICE_FIELDS: &[&str] = &["price", "close"];
pub const TIMEFRAME_FIELDS: &[&str] = &["tf", "timeframe", "interval"];
pub const SECRET_FIELDS: &[&str] = &["secret", "passphrase"];

#[derive(Error, Debug, PartialEq)]
pub enum SignalParseError {
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("missing ticker (tried {0:?})")]
    MissingTicker(&'static [&'static str]),
    #[error("missing direction (tried {0:?})")]
    MissingDirection(&'static [&'static str]),
    #[error("unknown direction '{0}'")]
    UnknownDirection(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn side(&self) -> Side {
        match self {
            Self::Buy => Side::Long,
            Self::Sell => Side::Short,
        }
    }
}

impl FromStr for Direction {
    type Err = SignalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "long" => Ok(Self::Buy),
            "sell" | "short" => Ok(Self::Sell),
            _ => Err(SignalParseError::UnknownDirection(s.to_string())),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

/// An alert as posted by the charting platform webhook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundSignal {
    pub ticker: String,
    pub direction: Direction,
    pub price: Option<String>,
    pub timeframe: Option<String>,
    pub reason: Option<String>,
    pub entry: Option<String>,
    pub stop_loss: Option<String>,
    pub take_profit1: Option<String>,
    pub take_profit2: Option<String>,
    pub payload_score: f64,
}

impl InboundSignal {
    pub fn from_payload(payload: &Value) -> Result<Self, SignalParseError> {
        let obj = payload.as_object().ok_or(SignalParseError::NotAnObject)?;

        let ticker = first_non_empty(obj, TICKER_FIELDS)
            .ok_or(SignalParseError::MissingTicker(TICKER_FIELDS))?;
        let direction = first_non_empty(obj, DIRECTION_FIELDS)
            .ok_or(SignalParseError::MissingDirection(DIRECTION_FIELDS))?
            .parse::<Direction>()?;

        Ok(Self {
            ticker: canonical_symbol(&ticker),
            direction,
            price: first_non_empty(obj, PRICE_FIELDS),
            timeframe: first_non_empty(obj, TIMEFRAME_FIELDS),
            reason: first_non_empty(obj, &["reason"]),
            entry: first_non_empty(obj, &["entry"]),
            stop_loss: first_non_empty(obj, &["sl", "stop", "stop_loss"]),
            take_profit1: first_non_empty(obj, &["tp1", "tp"]),
            take_profit2: first_non_empty(obj, &["tp2"]),
            payload_score: payload_score(obj),
        })
    }
}

/// Returns the first key of `keys` holding a non-empty scalar, as text.
pub fn first_non_empty(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64() == Some(1.0),
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "True" | "1" | "yes" | "YES"),
        _ => false,
    }
}

/// Hint score carried by the alert itself: volume spike, VWAP and EMA
/// flags plus an optional numeric `quality`.
pub fn payload_score(obj: &Map<String, Value>) -> f64 {
    let mut score = 0.0;
    if truthy(obj.get("vol_spike")) {
        score += 2.0;
    }
    if truthy(obj.get("above_vwap")) {
        score += 1.5;
    }
    if truthy(obj.get("ema_trend")) {
        score += 1.0;
    }
    if let Some(quality) = obj.get("quality").and_then(Value::as_f64) {
        score += quality;
    }
    score
}
