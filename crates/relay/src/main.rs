use dotenvy::dotenv;
use std::sync::Arc;
use tracing::{debug, info, warn};

use common::actors::{Actor, ActorType};
use common::logger;
use market_data::{MarketDataProvider, YahooClient};

use crate::actors::supervisor::Supervisor;
use crate::config::AppConfig;
use crate::context::RelayContext;
use crate::notifier::{Notifier, UnconfiguredNotifier};
use crate::services::bot_service::BotService;
use crate::services::scanner_service::ScannerService;
use crate::services::telegram_service::{TelegramService, build_bot};
use crate::services::webhook_service::WebhookServer;

mod actors;
mod auth;
mod config;
mod context;
mod messages;
mod notifier;
mod pipeline;
mod services;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    logger::setup_logger();
    debug!("System starting up...");

    let config = AppConfig::from_env()?;
    if config.webhook_secret.is_empty() {
        warn!("WEBHOOK_SECRET is empty: every webhook call will be rejected");
    }

    let market: Arc<dyn MarketDataProvider> = Arc::new(
        YahooClient::new(config.fetch_timeout)?
            .with_batching(config.scanner.batch_size, config.scanner.batch_delay_ms),
    );

    let bot = match config.telegram_token {
        Some(ref token) => Some(build_bot(token, config.fetch_timeout)?),
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set: alerts will fail to deliver");
            None
        }
    };
    let notifier: Arc<dyn Notifier> = match bot {
        Some(ref bot) => Arc::new(TelegramService::new(bot.clone())),
        None => Arc::new(UnconfiguredNotifier),
    };

    let ctx = Arc::new(RelayContext::new(config, notifier, market));
    info!(
        "Relay configured: tz={}, session={:?}, max/day={}, analyze={}",
        ctx.config.timezone,
        ctx.config.session,
        ctx.config.max_alerts_per_day,
        ctx.config.analyze_signals
    );

    let mut supervisor = Supervisor::new();

    let ctx_for_webhook = ctx.clone();
    supervisor.register_actor(
        ActorType::WebhookActor,
        Box::new(move || -> Box<dyn Actor> {
            Box::new(WebhookServer::new(ctx_for_webhook.clone()))
        }),
    );

    if ctx.config.scanner.enabled {
        let ctx_for_scanner = ctx.clone();
        supervisor.register_actor(
            ActorType::ScannerActor,
            Box::new(move || -> Box<dyn Actor> {
                Box::new(ScannerService::new(ctx_for_scanner.clone()))
            }),
        );
    }

    if let Some(bot) = bot.filter(|_| ctx.config.commands_enabled) {
        let ctx_for_bot = ctx.clone();
        supervisor.register_actor(
            ActorType::BotActor,
            Box::new(move || -> Box<dyn Actor> {
                Box::new(BotService::new(bot.clone(), ctx_for_bot.clone()))
            }),
        );
    }

    supervisor.start().await;
    Ok(())
}
