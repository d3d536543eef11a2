use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Long,
    Short,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Enter,
    Wait,
    Skip,
}

impl Decision {
    pub const ENTER_THRESHOLD: u8 = 6;
    pub const WAIT_THRESHOLD: u8 = 4;

    pub fn from_score(score: u8) -> Self {
        if score >= Self::ENTER_THRESHOLD {
            Self::Enter
        } else if score >= Self::WAIT_THRESHOLD {
            Self::Wait
        } else {
            Self::Skip
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => write!(f, "ENTER"),
            Self::Wait => write!(f, "WAIT"),
            Self::Skip => write!(f, "SKIP"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

/// A directional recommendation derived fresh on every analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIdea {
    pub side: Side,
    pub decision: Decision,
    pub score: u8,
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit1: f64,
    pub take_profit2: f64,
    pub quantity: u64,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub symbol: String,
    pub entry: f64,
    pub ma20: f64,
    pub ma50: f64,
    pub rsi14: f64,
    pub atr14: f64,
    pub trend: Trend,
    pub breakout_up: bool,
    pub breakout_down: bool,
    pub ideas: Vec<TradeIdea>,
}

impl Analysis {
    pub fn idea_for(&self, side: Side) -> Option<&TradeIdea> {
        self.ideas.iter().find(|idea| idea.side == side)
    }
}
