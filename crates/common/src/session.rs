use chrono::{DateTime, Datelike, NaiveTime, TimeZone, Weekday};
use chrono_tz::Tz;
use tracing::warn;

pub const DEFAULT_TIMEZONE: &str = "America/New_York";

/// Parses an IANA timezone name, falling back to UTC when it is unknown.
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(e) => {
            warn!("Failed to parse timezone '{}': {}. Falling back to UTC", name, e);
            Tz::UTC
        }
    }
}

/// Calendar-day identifier (`YYYY-MM-DD`) of `now` in `tz`.
pub fn day_key<T: TimeZone>(now: &DateTime<T>, tz: &Tz) -> String {
    now.with_timezone(tz).format("%Y-%m-%d").to_string()
}

/// Intraday window in which alerts are relayed.
///
/// The default skips the first hour of the NYSE session (10:30 to 16:00).
#[derive(Debug, Clone, PartialEq)]
pub struct SessionWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub weekdays_only: bool,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(10, 30, 0).unwrap_or(NaiveTime::MIN),
            end: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or(NaiveTime::MIN),
            weekdays_only: true,
        }
    }
}

impl SessionWindow {
    /// Bounds are inclusive on both ends.
    pub fn contains<T: TimeZone>(&self, now: &DateTime<T>, tz: &Tz) -> bool {
        let local = now.with_timezone(tz);

        if self.weekdays_only && matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }

        let time = local.time();
        time >= self.start && time <= self.end
    }
}
