use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use super::trade_idea::{Decision, Side};
use crate::error::AlertError;

/// Which sides the scorer produces ideas for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SideMode {
    Long,
    Short,
    Both,
}

impl SideMode {
    pub fn sides(&self) -> &'static [Side] {
        match self {
            Self::Long => &[Side::Long],
            Self::Short => &[Side::Short],
            Self::Both => &[Side::Long, Side::Short],
        }
    }
}

impl FromStr for SideMode {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "long" | "buy" => Ok(Self::Long),
            "short" | "sell" => Ok(Self::Short),
            "both" | "all" => Ok(Self::Both),
            other => Err(AlertError::configuration(format!(
                "unknown side '{}', expected long, short or both",
                other
            ))),
        }
    }
}

impl fmt::Display for SideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
            Self::Both => write!(f, "BOTH"),
        }
    }
}

/// Which decisions are worth relaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterMode {
    EnterOnly,
    EnterAndWait,
}

impl FilterMode {
    pub fn passes(&self, decision: Decision) -> bool {
        match self {
            Self::EnterOnly => decision == Decision::Enter,
            Self::EnterAndWait => matches!(decision, Decision::Enter | Decision::Wait),
        }
    }
}

impl FromStr for FilterMode {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "enter" | "enter_only" => Ok(Self::EnterOnly),
            "all" | "wait" | "enter_and_wait" => Ok(Self::EnterAndWait),
            other => Err(AlertError::configuration(format!(
                "unknown filter mode '{}', expected enter or all",
                other
            ))),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EnterOnly => write!(f, "ENTER_ONLY"),
            Self::EnterAndWait => write!(f, "ENTER_AND_WAIT"),
        }
    }
}

/// Process-wide tunables, persisted as a flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub capital: f64,
    pub risk_pct: f64,
    pub side: SideMode,
    pub filter_mode: FilterMode,
    pub cooldown_minutes: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            capital: 10_000.0,
            risk_pct: 1.0,
            side: SideMode::Both,
            filter_mode: FilterMode::EnterOnly,
            cooldown_minutes: 30,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), AlertError> {
        if !self.capital.is_finite() || self.capital <= 0.0 {
            return Err(AlertError::configuration(format!(
                "capital must be positive, got {}",
                self.capital
            )));
        }
        if !(0.0..=100.0).contains(&self.risk_pct) {
            return Err(AlertError::configuration(format!(
                "risk_pct must be within [0, 100], got {}",
                self.risk_pct
            )));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.cooldown_minutes))
    }
}
