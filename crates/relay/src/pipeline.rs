use common::error::AlertError;
use common::models::{Analysis, InboundSignal};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::auth::{Credentials, authorize};
use crate::context::RelayContext;
use crate::messages;
use crate::notifier::Delivery;

/// Why a well-formed, authorized signal was not relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Ignored {
    OutsideTimeWindow,
    DailyLimitReached,
    LowScore,
    Filtered,
    Cooldown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    Unauthorized,
    BadRequest(String),
    Ignored(Ignored),
    Failed(Delivery),
    Sent { sent_count_today: u32 },
}

impl RelayOutcome {
    pub fn body(&self) -> Value {
        match self {
            Self::Unauthorized => json!({"ok": false, "error": "unauthorized"}),
            Self::BadRequest(reason) => json!({"ok": false, "error": reason}),
            Self::Ignored(reason) => json!({"ok": true, "ignored": reason}),
            Self::Failed(delivery) => json!({"ok": false, "error": delivery.message}),
            Self::Sent { sent_count_today } => {
                json!({"ok": true, "sent_count_today": sent_count_today})
            }
        }
    }
}

/// Runs one webhook alert through the gates in order: JSON body,
/// authorization, field extraction, day rollover, session window, daily
/// limit, payload score, optional analysis filter, cooldown, delivery.
///
/// Authorization failures return before any state is touched.
pub async fn process_signal(ctx: &RelayContext, body: &[u8], credentials: Credentials<'_>) -> RelayOutcome {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => return RelayOutcome::BadRequest(format!("malformed JSON: {}", e)),
    };

    if let Err(AlertError::Unauthorized) = authorize(&ctx.config.webhook_secret, &payload, credentials, body) {
        warn!("Rejected webhook call with bad or missing secret");
        return RelayOutcome::Unauthorized;
    }

    let signal = match InboundSignal::from_payload(&payload) {
        Ok(signal) => signal,
        Err(e) => return RelayOutcome::BadRequest(e.to_string()),
    };
    info!("Signal received: {} {}", signal.direction, signal.ticker);

    let settings = ctx.settings.get().await;

    {
        let mut state = ctx.state.lock().await;
        state.reset_if_new_day();

        if !ctx.session_open(&state.now()) {
            return RelayOutcome::Ignored(Ignored::OutsideTimeWindow);
        }
        if ctx.daily_limit_reached(&state) {
            return RelayOutcome::Ignored(Ignored::DailyLimitReached);
        }
    }

    if signal.payload_score < ctx.config.min_score_to_send {
        return RelayOutcome::Ignored(Ignored::LowScore);
    }

    let analysis = if ctx.config.analyze_signals {
        match ctx.analyze_symbol(&signal.ticker, &settings).await {
            Ok(analysis) => {
                if !passes_filter(&analysis, &signal, &settings) {
                    return RelayOutcome::Ignored(Ignored::Filtered);
                }
                Some(analysis)
            }
            Err(e) => {
                warn!("Analysis for {} failed, relaying without it: {}", signal.ticker, e);
                None
            }
        }
    } else {
        None
    };

    let reservation = {
        let mut state = ctx.state.lock().await;
        // The analysis fetch may have let another alert through meanwhile.
        if ctx.daily_limit_reached(&state) {
            return RelayOutcome::Ignored(Ignored::DailyLimitReached);
        }
        if !state.cooldown_ok(&signal.ticker, signal.direction, settings.cooldown()) {
            return RelayOutcome::Ignored(Ignored::Cooldown);
        }
        match state.reserve(&signal.ticker, ctx.config.max_alerts_per_day) {
            Some(reservation) => reservation,
            None => return RelayOutcome::Ignored(Ignored::DailyLimitReached),
        }
    };

    let text = messages::signal_alert(&signal, analysis.as_ref());
    let delivery = ctx.deliver(&text).await;
    if !delivery.ok {
        ctx.state.lock().await.release(reservation);
        return RelayOutcome::Failed(delivery);
    }

    info!(
        "Relayed {} {} ({} today)",
        signal.direction, signal.ticker, reservation.sent_count
    );
    RelayOutcome::Sent {
        sent_count_today: reservation.sent_count,
    }
}

fn passes_filter(analysis: &Analysis, signal: &InboundSignal, settings: &common::models::Settings) -> bool {
    analysis
        .idea_for(signal.direction.side())
        .is_some_and(|idea| settings.filter_mode.passes(idea.decision))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::sign;
    use crate::config::AppConfig;
    use crate::notifier::Notifier;
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
    use common::models::{DailyBar, Settings};
    use market_data::MarketDataProvider;
    use mockall::mock;
    use std::collections::HashMap;
    use std::sync::Arc;
    use storage::ManualClock;

    mock! {
        pub Transport {}

        #[async_trait]
        impl Notifier for Transport {
            async fn send(&self, destination: &str, text: &str) -> Delivery;
        }
    }

    mock! {
        pub Market {}

        #[async_trait]
        impl MarketDataProvider for Market {
            async fn daily_bars(&self, symbol: &str, lookback_days: u32) -> Result<Vec<DailyBar>, AlertError>;
        }
    }

    pub(crate) const SECRET: &str = "tv-secret";

    pub(crate) fn test_config(extra: &[(&str, &str)]) -> AppConfig {
        let settings_path = std::env::temp_dir()
            .join(format!("relay-test-{}.json", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .to_string();
        let mut map: HashMap<String, String> = [
            ("WEBHOOK_SECRET", SECRET),
            ("TELEGRAM_CHAT_ID", "1001"),
            ("SESSION_FILTER", "false"),
            ("MAX_ALERTS_PER_DAY", "0"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        map.insert("SETTINGS_PATH".to_string(), settings_path);
        for (k, v) in extra {
            map.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    /// Wednesday 2025-03-05 16:00 UTC = 11:00 ET.
    pub(crate) fn market_hours() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 5, 16, 0, 0).unwrap()
    }

    pub(crate) fn context(
        config: AppConfig,
        notifier: MockTransport,
        market: MockMarket,
        clock: Arc<ManualClock>,
    ) -> RelayContext {
        RelayContext::with_clock(config, Arc::new(notifier), Arc::new(market), clock)
    }

    pub(crate) fn accepting_transport(times: usize) -> MockTransport {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(times)
            .returning(|_, _| Delivery::delivered("message 1"));
        transport
    }

    /// Accepts every message after a delay, so concurrent callers overlap
    /// while a send is in flight.
    pub(crate) struct SlowTransport {
        pub(crate) delay: std::time::Duration,
        pub(crate) sent: std::sync::atomic::AtomicUsize,
    }

    impl SlowTransport {
        pub(crate) fn new(delay_ms: u64) -> Self {
            Self {
                delay: std::time::Duration::from_millis(delay_ms),
                sent: std::sync::atomic::AtomicUsize::new(0),
            }
        }

        pub(crate) fn sent(&self) -> usize {
            self.sent.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Notifier for SlowTransport {
        async fn send(&self, _destination: &str, _text: &str) -> Delivery {
            tokio::time::sleep(self.delay).await;
            self.sent.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Delivery::delivered("slow")
        }
    }

    pub(crate) fn rising_bars(n: usize) -> Vec<DailyBar> {
        let start = NaiveDate::from_ymd_opt(2024, 12, 1).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + 30.0 * i as f64 / (n - 1) as f64;
                DailyBar {
                    date: start + chrono::Days::new(i as u64),
                    open: close,
                    high: close * 1.005,
                    low: close * 0.995,
                    close,
                    volume: 2_000_000.0,
                }
            })
            .collect()
    }

    fn body(extra: Value) -> Vec<u8> {
        let mut payload = json!({"secret": SECRET, "ticker": "AAPL", "direction": "buy", "price": 187.5});
        if let (Some(obj), Some(more)) = (payload.as_object_mut(), extra.as_object()) {
            for (k, v) in more {
                obj.insert(k.clone(), v.clone());
            }
        }
        serde_json::to_vec(&payload).unwrap()
    }

    #[tokio::test]
    async fn test_relays_and_counts() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|dest, text| dest == "1001" && text.contains("Symbol: AAPL") && text.contains("Price: 187.5"))
            .times(1)
            .returning(|_, _| Delivery::delivered("message 7"));

        let clock = Arc::new(ManualClock::new(market_hours()));
        let ctx = context(test_config(&[]), transport, MockMarket::new(), clock);

        let outcome = process_signal(&ctx, &body(json!({})), Credentials::default()).await;

        assert_eq!(outcome, RelayOutcome::Sent { sent_count_today: 1 });
        assert!(ctx.state.lock().await.already_sent("AAPL"));
    }

    #[tokio::test]
    async fn test_unauthorized_touches_nothing() {
        let clock = Arc::new(ManualClock::new(market_hours()));
        let ctx = context(test_config(&[]), MockTransport::new(), MockMarket::new(), clock);

        let outcome = process_signal(&ctx, &body(json!({"secret": "nope"})), Credentials::default()).await;

        assert_eq!(outcome, RelayOutcome::Unauthorized);
        assert_eq!(outcome.body()["error"], "unauthorized");
        let state = ctx.state.lock().await;
        assert_eq!(state.day().day_key, None);
        assert_eq!(state.sent_count(), 0);
    }

    #[tokio::test]
    async fn test_signed_body_is_accepted() {
        let clock = Arc::new(ManualClock::new(market_hours()));
        let ctx = context(test_config(&[]), accepting_transport(1), MockMarket::new(), clock);

        let raw = br#"{"symbol":"NASDAQ:MSFT","action":"SELL"}"#;
        let signature = sign(SECRET, raw);
        let credentials = Credentials {
            header_secret: None,
            signature: Some(&signature),
        };

        let outcome = process_signal(&ctx, raw, credentials).await;
        assert_eq!(outcome, RelayOutcome::Sent { sent_count_today: 1 });
        assert!(ctx.state.lock().await.already_sent("MSFT"));
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let clock = Arc::new(ManualClock::new(market_hours()));
        let ctx = context(test_config(&[]), MockTransport::new(), MockMarket::new(), clock);

        let outcome = process_signal(&ctx, b"{not json", Credentials::default()).await;
        assert!(matches!(outcome, RelayOutcome::BadRequest(_)));

        let outcome = process_signal(&ctx, &body(json!({"direction": "hold"})), Credentials::default()).await;
        assert_eq!(outcome, RelayOutcome::BadRequest("unknown direction 'hold'".to_string()));
    }

    #[tokio::test]
    async fn test_cooldown_suppresses_repeat() {
        let clock = Arc::new(ManualClock::new(market_hours()));
        let ctx = context(test_config(&[]), accepting_transport(3), MockMarket::new(), clock.clone());

        let first = process_signal(&ctx, &body(json!({})), Credentials::default()).await;
        assert_eq!(first, RelayOutcome::Sent { sent_count_today: 1 });

        // "long" is the same direction as "buy"
        let repeat = process_signal(&ctx, &body(json!({"direction": "LONG"})), Credentials::default()).await;
        assert_eq!(repeat, RelayOutcome::Ignored(Ignored::Cooldown));

        let opposite = process_signal(&ctx, &body(json!({"direction": "sell"})), Credentials::default()).await;
        assert_eq!(opposite, RelayOutcome::Sent { sent_count_today: 2 });

        clock.advance(Duration::minutes(i64::from(Settings::default().cooldown_minutes)));
        let later = process_signal(&ctx, &body(json!({})), Credentials::default()).await;
        assert_eq!(later, RelayOutcome::Sent { sent_count_today: 3 });
    }

    #[tokio::test]
    async fn test_session_window_and_daily_limit() {
        // Tuesday 2025-03-04 14:45 UTC = 09:45 ET, before the window opens.
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 3, 4, 14, 45, 0).unwrap()));
        let config = test_config(&[("SESSION_FILTER", "true"), ("MAX_ALERTS_PER_DAY", "1")]);
        let ctx = context(config, accepting_transport(2), MockMarket::new(), clock.clone());

        let early = process_signal(&ctx, &body(json!({})), Credentials::default()).await;
        assert_eq!(early, RelayOutcome::Ignored(Ignored::OutsideTimeWindow));

        clock.advance(Duration::hours(2));
        let first = process_signal(&ctx, &body(json!({})), Credentials::default()).await;
        assert_eq!(first, RelayOutcome::Sent { sent_count_today: 1 });

        let second = process_signal(&ctx, &body(json!({"ticker": "MSFT"})), Credentials::default()).await;
        assert_eq!(second, RelayOutcome::Ignored(Ignored::DailyLimitReached));

        // Next day, inside the window: counter was reset.
        clock.advance(Duration::days(1));
        let next_day = process_signal(&ctx, &body(json!({"ticker": "MSFT"})), Credentials::default()).await;
        assert_eq!(next_day, RelayOutcome::Sent { sent_count_today: 1 });
    }

    #[tokio::test]
    async fn test_low_payload_score() {
        let clock = Arc::new(ManualClock::new(market_hours()));
        let config = test_config(&[("MIN_SCORE_TO_SEND", "3")]);
        let ctx = context(config, accepting_transport(1), MockMarket::new(), clock);

        let weak = process_signal(&ctx, &body(json!({"ema_trend": true})), Credentials::default()).await;
        assert_eq!(weak, RelayOutcome::Ignored(Ignored::LowScore));

        let strong = process_signal(
            &ctx,
            &body(json!({"vol_spike": true, "ema_trend": "yes"})),
            Credentials::default(),
        )
        .await;
        assert_eq!(strong, RelayOutcome::Sent { sent_count_today: 1 });
    }

    #[tokio::test]
    async fn test_analysis_filter() {
        let mut market = MockMarket::new();
        market
            .expect_daily_bars()
            .returning(|_, _| Ok(rising_bars(60)));

        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .withf(|_, text| text.contains("LONG → ENTER"))
            .times(1)
            .returning(|_, _| Delivery::delivered("ok"));

        let clock = Arc::new(ManualClock::new(market_hours()));
        let config = test_config(&[("ANALYZE_SIGNALS", "true")]);
        let ctx = context(config, transport, market, clock);

        // Rising series: LONG scores ENTER, SHORT scores SKIP.
        let long = process_signal(&ctx, &body(json!({})), Credentials::default()).await;
        assert_eq!(long, RelayOutcome::Sent { sent_count_today: 1 });

        let short = process_signal(&ctx, &body(json!({"direction": "short"})), Credentials::default()).await;
        assert_eq!(short, RelayOutcome::Ignored(Ignored::Filtered));
    }

    #[tokio::test]
    async fn test_analysis_failure_still_relays() {
        let mut market = MockMarket::new();
        market
            .expect_daily_bars()
            .returning(|_, _| Err(AlertError::transport("timed out")));

        let clock = Arc::new(ManualClock::new(market_hours()));
        let config = test_config(&[("ANALYZE_SIGNALS", "true")]);
        let ctx = context(config, accepting_transport(1), market, clock);

        let outcome = process_signal(&ctx, &body(json!({})), Credentials::default()).await;
        assert_eq!(outcome, RelayOutcome::Sent { sent_count_today: 1 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_signals_respect_daily_limit() {
        let transport = Arc::new(SlowTransport::new(100));
        let clock = Arc::new(ManualClock::new(market_hours()));
        let config = test_config(&[("MAX_ALERTS_PER_DAY", "1")]);
        let ctx = Arc::new(RelayContext::with_clock(
            config,
            transport.clone(),
            Arc::new(MockMarket::new()),
            clock,
        ));

        let handles: Vec<_> = ["AAPL", "MSFT", "NVDA"]
            .into_iter()
            .map(|ticker| {
                let ctx = ctx.clone();
                let raw = body(json!({"ticker": ticker}));
                tokio::spawn(async move { process_signal(&ctx, &raw, Credentials::default()).await })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap());
        }

        let sent = outcomes
            .iter()
            .filter(|o| matches!(o, RelayOutcome::Sent { .. }))
            .count();
        assert_eq!(sent, 1);
        assert!(outcomes.contains(&RelayOutcome::Sent { sent_count_today: 1 }));
        assert_eq!(
            outcomes
                .iter()
                .filter(|o| **o == RelayOutcome::Ignored(Ignored::DailyLimitReached))
                .count(),
            2
        );
        assert_eq!(transport.sent(), 1);
        assert_eq!(ctx.state.lock().await.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_send_frees_the_slot() {
        let mut transport = MockTransport::new();
        let mut seq = mockall::Sequence::new();
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Delivery::failed("Too Many Requests: retry after 5"));
        transport
            .expect_send()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Delivery::delivered("message 2"));

        let clock = Arc::new(ManualClock::new(market_hours()));
        let config = test_config(&[("MAX_ALERTS_PER_DAY", "1")]);
        let ctx = context(config, transport, MockMarket::new(), clock);

        let failed = process_signal(&ctx, &body(json!({})), Credentials::default()).await;
        assert!(matches!(failed, RelayOutcome::Failed(_)));
        assert!(!ctx.state.lock().await.already_sent("AAPL"));

        let other = process_signal(&ctx, &body(json!({"ticker": "MSFT"})), Credentials::default()).await;
        assert_eq!(other, RelayOutcome::Sent { sent_count_today: 1 });
    }

    #[tokio::test]
    async fn test_transport_failure_is_surfaced() {
        let mut transport = MockTransport::new();
        transport
            .expect_send()
            .times(1)
            .returning(|_, _| Delivery::failed("Bad Request: chat not found"));

        let clock = Arc::new(ManualClock::new(market_hours()));
        let ctx = context(test_config(&[]), transport, MockMarket::new(), clock);

        let outcome = process_signal(&ctx, &body(json!({})), Credentials::default()).await;

        assert_eq!(
            outcome,
            RelayOutcome::Failed(Delivery::failed("Bad Request: chat not found"))
        );
        assert_eq!(ctx.state.lock().await.sent_count(), 0);
    }
}
