use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use common::models::Direction;
use common::session::day_key;
use serde::Serialize;
use tracing::{debug, info};

use crate::clock::Clock;

/// Alerts sent during one calendar day of the reference timezone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DayState {
    pub day_key: Option<String>,
    pub sent_symbols: HashSet<String>,
    pub sent_count: u32,
}

/// A slot taken by [`AlertState::reserve`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reservation {
    day_key: Option<String>,
    symbol: String,
    first_today: bool,
    /// Alerts counted today, this one included.
    pub sent_count: u32,
}

/// Daily dedup/limit bookkeeping plus the per-(symbol, direction) cooldown
/// gate. In-memory only; callers share it behind a mutex.
pub struct AlertState {
    tz: Tz,
    clock: Arc<dyn Clock>,
    day: DayState,
    cooldowns: HashMap<(String, Direction), DateTime<Utc>>,
}

impl AlertState {
    pub fn new(tz: Tz, clock: Arc<dyn Clock>) -> Self {
        Self {
            tz,
            clock,
            day: DayState::default(),
            cooldowns: HashMap::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn day(&self) -> &DayState {
        &self.day
    }

    pub fn sent_count(&self) -> u32 {
        self.day.sent_count
    }

    /// Clears the sent set and counter the first time it runs on a new day.
    /// Returns whether a reset happened; later calls that day are no-ops.
    pub fn reset_if_new_day(&mut self) -> bool {
        let today = day_key(&self.clock.now(), &self.tz);
        if self.day.day_key.as_deref() == Some(today.as_str()) {
            return false;
        }

        if let Some(ref previous) = self.day.day_key {
            info!(
                "New trading day {} (was {}), clearing {} sent symbols",
                today,
                previous,
                self.day.sent_symbols.len()
            );
        }
        self.day = DayState {
            day_key: Some(today),
            sent_symbols: HashSet::new(),
            sent_count: 0,
        };
        true
    }

    pub fn already_sent(&self, symbol: &str) -> bool {
        self.day.sent_symbols.contains(&symbol.to_uppercase())
    }

    /// Counts an alert against today. Rolls the day first so the symbol and
    /// counter always belong to the current key.
    pub fn record_sent(&mut self, symbol: &str) {
        self.reset_if_new_day();
        self.day.sent_symbols.insert(symbol.to_uppercase());
        self.day.sent_count += 1;
    }

    /// Takes one of today's slots before the alert goes out, so concurrent
    /// senders can never overshoot `max_per_day` (0 = unlimited). Returns
    /// `None` when the limit is already reached.
    pub fn reserve(&mut self, symbol: &str, max_per_day: u32) -> Option<Reservation> {
        self.reset_if_new_day();
        if max_per_day > 0 && self.day.sent_count >= max_per_day {
            return None;
        }

        let symbol = symbol.to_uppercase();
        let first_today = self.day.sent_symbols.insert(symbol.clone());
        self.day.sent_count += 1;
        Some(Reservation {
            day_key: self.day.day_key.clone(),
            symbol,
            first_today,
            sent_count: self.day.sent_count,
        })
    }

    /// Gives back a slot whose alert was not delivered. A reservation from a
    /// day that has since rolled over is dropped.
    pub fn release(&mut self, reservation: Reservation) {
        if self.day.day_key != reservation.day_key {
            return;
        }
        self.day.sent_count = self.day.sent_count.saturating_sub(1);
        if reservation.first_today {
            self.day.sent_symbols.remove(&reservation.symbol);
        }
    }

    /// True (and the timestamp refreshed) when no alert was seen for the key
    /// or at least `cooldown` has elapsed since the last one. Otherwise false
    /// and nothing changes.
    pub fn cooldown_ok(&mut self, symbol: &str, direction: Direction, cooldown: Duration) -> bool {
        let now = self.clock.now();
        let key = (symbol.to_uppercase(), direction);

        if let Some(last) = self.cooldowns.get(&key) {
            let elapsed = now - *last;
            if elapsed < cooldown {
                debug!(
                    "{} {} in cooldown, {}s left",
                    key.0,
                    direction,
                    (cooldown - elapsed).num_seconds()
                );
                return false;
            }
        }

        self.cooldowns.insert(key, now);
        true
    }
}
