use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use common::error::AlertError;
use common::session::{DEFAULT_TIMEZONE, SessionWindow, resolve_timezone};
use strategy::services::scanner::ScanConfig;

/// Universe scanned when `SCAN_SYMBOLS` is not set.
const DEFAULT_UNIVERSE: &[&str] = &[
    "AAPL", "MSFT", "NVDA", "AMZN", "GOOGL", "META", "TSLA", "AMD", "NFLX", "AVGO", "CRM", "ORCL",
    "ADBE", "INTC", "QCOM", "MU", "PLTR", "SHOP", "UBER", "COIN", "JPM", "BAC", "XOM", "CVX", "WMT",
    "COST", "DIS", "NKE", "BA", "PYPL",
];

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub enabled: bool,
    pub interval: Duration,
    pub symbols: Vec<String>,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub scan: ScanConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub webhook_secret: String,
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub commands_enabled: bool,
    pub timezone: Tz,
    /// `None` relays at any time of day.
    pub session: Option<SessionWindow>,
    /// 0 disables the limit.
    pub max_alerts_per_day: u32,
    pub min_score_to_send: f64,
    pub analyze_signals: bool,
    pub analysis_lookback_days: u32,
    pub settings_path: PathBuf,
    pub fetch_timeout: Duration,
    pub scanner: ScannerSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AlertError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AlertError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("BIND_ADDR") {
            Some(addr) => parse_value("BIND_ADDR", &addr)?,
            None => {
                let port: u16 = parse_or(&get, "PORT", 8080)?;
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let session = if parse_bool_or(&get, "SESSION_FILTER", true)? {
            let default = SessionWindow::default();
            Some(SessionWindow {
                start: parse_time_or(&get, "SESSION_START", default.start)?,
                end: parse_time_or(&get, "SESSION_END", default.end)?,
                weekdays_only: parse_bool_or(&get, "SESSION_WEEKDAYS_ONLY", true)?,
            })
        } else {
            None
        };

        let default_scan = ScanConfig::default();
        let scan = ScanConfig {
            min_price: parse_or(&get, "SCAN_MIN_PRICE", default_scan.min_price)?,
            max_price: parse_or(&get, "SCAN_MAX_PRICE", default_scan.max_price)?,
            min_avg_volume: parse_or(&get, "SCAN_MIN_AVG_VOLUME", default_scan.min_avg_volume)?,
            volume_window: parse_or(&get, "SCAN_VOLUME_WINDOW", default_scan.volume_window)?,
            volume_divisor: parse_or(&get, "SCAN_VOLUME_DIVISOR", default_scan.volume_divisor)?,
            stop_loss_pct: parse_or(&get, "SCAN_SL_PCT", default_scan.stop_loss_pct)?,
            take_profit_pct: parse_or(&get, "SCAN_TP_PCT", default_scan.take_profit_pct)?,
            top_n: parse_or(&get, "SCAN_TOP_N", default_scan.top_n)?,
            lookback_days: parse_or(&get, "SCAN_LOOKBACK_DAYS", default_scan.lookback_days)?,
        };
        if scan.volume_divisor <= 0.0 {
            return Err(AlertError::configuration("SCAN_VOLUME_DIVISOR must be positive"));
        }

        let symbols = match get("SCAN_SYMBOLS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect(),
        };

        let telegram_token = get("TELEGRAM_BOT_TOKEN");

        Ok(Self {
            bind_addr,
            webhook_secret: get("WEBHOOK_SECRET").unwrap_or_default(),
            commands_enabled: parse_bool_or(&get, "TELEGRAM_COMMANDS", telegram_token.is_some())?,
            telegram_token,
            telegram_chat_id: get("TELEGRAM_CHAT_ID"),
            timezone: resolve_timezone(&get("TIMEZONE").unwrap_or_else(|| DEFAULT_TIMEZONE.to_string())),
            session,
            max_alerts_per_day: match get("MAX_ALERTS_PER_DAY") {
                Some(raw) => parse_value("MAX_ALERTS_PER_DAY", &raw)?,
                None => parse_or(&get, "MAX_TRADES_PER_DAY", 2)?,
            },
            min_score_to_send: parse_or(&get, "MIN_SCORE_TO_SEND", 0.0)?,
            analyze_signals: parse_bool_or(&get, "ANALYZE_SIGNALS", false)?,
            analysis_lookback_days: parse_or(&get, "ANALYSIS_LOOKBACK_DAYS", 120)?,
            settings_path: get("SETTINGS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("settings.json")),
            fetch_timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", 20)?),
            scanner: ScannerSettings {
                enabled: parse_bool_or(&get, "SCAN_ENABLED", true)?,
                interval: Duration::from_secs(60 * parse_or::<u64, _>(&get, "SCAN_INTERVAL_MINUTES", 15)?.max(1)),
                symbols,
                batch_size: parse_or(&get, "SCAN_BATCH_SIZE", 20)?,
                batch_delay_ms: parse_or(&get, "SCAN_BATCH_DELAY_MS", 250)?,
                scan,
            },
        })
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, AlertError> {
    raw.parse::<T>()
        .map_err(|_| AlertError::configuration(format!("{} has an invalid value '{}'", key, raw)))
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> Result<T, AlertError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_bool_or<G>(get: &G, key: &str, default: bool) -> Result<bool, AlertError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(AlertError::configuration(format!(
            "{} must be a boolean, got '{}'",
            key, v
        ))),
    }
}

fn parse_time_or<G>(get: &G, key: &str, default: NaiveTime) -> Result<NaiveTime, AlertError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|_| {
            AlertError::configuration(format!("{} must be HH:MM, got '{}'", key, raw))
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, AlertError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.timezone, Tz::America__New_York);
        assert_eq!(config.session, Some(SessionWindow::default()));
        assert_eq!(config.fetch_timeout, Duration::from_secs(20));
        assert_eq!(config.max_alerts_per_day, 2);
        assert!(config.webhook_secret.is_empty());
        assert!(!config.commands_enabled);
        assert_eq!(config.scanner.symbols.len(), DEFAULT_UNIVERSE.len());
        assert_eq!(config.scanner.scan, ScanConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("PORT", "9000"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("SESSION_FILTER", "off"),
            ("TIMEZONE", "Nowhere/Land"),
            ("SCAN_SYMBOLS", "aapl, msft,,spx"),
            ("SCAN_VOLUME_DIVISOR", "5000000"),
            ("SESSION_START", "09:45"),
            ("MAX_TRADES_PER_DAY", "4"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert!(config.commands_enabled);
        assert_eq!(config.session, None);
        assert_eq!(config.timezone, Tz::UTC);
        assert_eq!(config.scanner.symbols, ["aapl", "msft", "spx"]);
        assert_eq!(config.scanner.scan.volume_divisor, 5_000_000.0);
        assert_eq!(config.max_alerts_per_day, 4);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        assert!(matches!(
            config_from(&[("MAX_ALERTS_PER_DAY", "lots")]),
            Err(AlertError::Configuration(_))
        ));
        assert!(matches!(
            config_from(&[("SESSION_START", "morning")]),
            Err(AlertError::Configuration(_))
        ));
        assert!(matches!(
            config_from(&[("ANALYZE_SIGNALS", "maybe")]),
            Err(AlertError::Configuration(_))
        ));
    }
}
