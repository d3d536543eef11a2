use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::error::AlertError;
use common::models::{Analysis, PriceSeries, Settings};
use common::symbols::canonical_symbol;
use market_data::MarketDataProvider;
use storage::{AlertState, Clock, SettingsStore, SystemClock};
use strategy::services::scorer;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::AppConfig;
use crate::notifier::{Delivery, Notifier};

/// Everything a handler needs, shared as `Arc<RelayContext>`.
///
/// The alert state mutex is never held across network calls.
pub struct RelayContext {
    pub config: AppConfig,
    pub settings: SettingsStore,
    pub state: Mutex<AlertState>,
    pub market: Arc<dyn MarketDataProvider>,
    notifier: Arc<dyn Notifier>,
}

impl RelayContext {
    pub fn new(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        market: Arc<dyn MarketDataProvider>,
    ) -> Self {
        Self::with_clock(config, notifier, market, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: AppConfig,
        notifier: Arc<dyn Notifier>,
        market: Arc<dyn MarketDataProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings: SettingsStore::new(config.settings_path.clone()),
            state: Mutex::new(AlertState::new(config.timezone, clock)),
            config,
            market,
            notifier,
        }
    }

    /// Sends to the configured chat. A missing chat id is a configuration
    /// failure reported in the delivery, not an error.
    pub async fn deliver(&self, text: &str) -> Delivery {
        let Some(ref chat_id) = self.config.telegram_chat_id else {
            let err = AlertError::configuration("TELEGRAM_CHAT_ID not set");
            warn!("{}", err);
            return Delivery::failed(err.to_string());
        };

        let delivery = self.notifier.send(chat_id, text).await;
        if delivery.ok {
            debug!("Delivered alert: {}", delivery.message);
        } else {
            warn!("Delivery failed: {}", delivery.message);
        }
        delivery
    }

    pub fn session_open(&self, now: &DateTime<Utc>) -> bool {
        match self.config.session {
            Some(ref window) => window.contains(now, &self.config.timezone),
            None => true,
        }
    }

    pub fn daily_limit_reached(&self, state: &AlertState) -> bool {
        self.config.max_alerts_per_day > 0 && state.sent_count() >= self.config.max_alerts_per_day
    }

    pub async fn analyze_symbol(&self, symbol: &str, settings: &Settings) -> Result<Analysis, AlertError> {
        let symbol = canonical_symbol(symbol);
        let bars = self
            .market
            .daily_bars(&symbol, self.config.analysis_lookback_days)
            .await?;
        scorer::analyze(&symbol, &PriceSeries::from_bars(&bars), settings)
    }
}
