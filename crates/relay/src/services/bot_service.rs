use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use common::actors::{Actor, ActorType, ControlMessage};
use common::error::AlertError;
use common::models::{FilterMode, Settings, SideMode};
use teloxide::{prelude::*, utils::command::BotCommands};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::context::RelayContext;
use crate::messages;
use crate::services::scanner_service::{ScanTrigger, run_scan_cycle};

#[derive(BotCommands, Clone, Debug, PartialEq)]
#[command(rename_rule = "lowercase", description = "Signal relay commands:")]
pub enum Command {
    #[command(description = "show this text")]
    Help,
    #[command(description = "show current settings")]
    Settings,
    #[command(description = "set account capital, e.g. /capital 25000")]
    Capital(String),
    #[command(description = "set risk per trade in percent, e.g. /risk 0.5")]
    Risk(String),
    #[command(description = "sides to analyze: long, short or both")]
    Side(String),
    #[command(description = "decisions to relay: enter or all")]
    Mode(String),
    #[command(description = "cooldown between repeat alerts in minutes")]
    Cooldown(String),
    #[command(description = "analyze a symbol, e.g. /analyze AAPL")]
    Analyze(String),
    #[command(description = "run the screener now")]
    Scan,
    #[command(description = "alerts sent today")]
    Status,
}

/// Handles one command and returns the reply text. Errors become replies.
pub async fn execute(ctx: &RelayContext, command: Command) -> String {
    match command {
        Command::Help => Command::descriptions().to_string(),
        Command::Settings => messages::settings_summary(&ctx.settings.get().await),
        Command::Capital(raw) => match parse_arg::<f64>("capital", &raw) {
            Ok(capital) => apply(ctx, |s| s.capital = capital).await,
            Err(e) => format!("❌ {}", e),
        },
        Command::Risk(raw) => match parse_arg::<f64>("risk", &raw) {
            Ok(risk) => apply(ctx, |s| s.risk_pct = risk).await,
            Err(e) => format!("❌ {}", e),
        },
        Command::Side(raw) => match raw.parse::<SideMode>() {
            Ok(side) => apply(ctx, |s| s.side = side).await,
            Err(e) => format!("❌ {}", e),
        },
        Command::Mode(raw) => match raw.parse::<FilterMode>() {
            Ok(mode) => apply(ctx, |s| s.filter_mode = mode).await,
            Err(e) => format!("❌ {}", e),
        },
        Command::Cooldown(raw) => match parse_arg::<u32>("cooldown", &raw) {
            Ok(minutes) => apply(ctx, |s| s.cooldown_minutes = minutes).await,
            Err(e) => format!("❌ {}", e),
        },
        Command::Analyze(raw) => {
            let symbol = raw.trim();
            if symbol.is_empty() {
                return "Usage: /analyze <symbol>".to_string();
            }
            let settings = ctx.settings.get().await;
            match ctx.analyze_symbol(symbol, &settings).await {
                Ok(analysis) => messages::analysis_report(&analysis),
                Err(e) => format!("❌ {}: {}", symbol.to_uppercase(), e),
            }
        }
        Command::Scan => run_scan_cycle(ctx, ScanTrigger::Manual).await.summary(),
        Command::Status => {
            let mut state = ctx.state.lock().await;
            state.reset_if_new_day();
            messages::day_summary(state.day(), ctx.config.max_alerts_per_day)
        }
    }
}

async fn apply<F>(ctx: &RelayContext, change: F) -> String
where
    F: FnOnce(&mut Settings),
{
    match ctx.settings.modify(change).await {
        Ok(settings) => format!("✅ Updated\n{}", messages::settings_summary(&settings)),
        Err(e) => format!("❌ {}", e),
    }
}

fn parse_arg<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, AlertError> {
    raw.trim().parse::<T>().map_err(|_| {
        AlertError::configuration(format!("/{} expects a number, got '{}'", name, raw.trim()))
    })
}

/// Only the configured chat (numeric id or `@channel`) may issue commands.
pub fn chat_allowed(configured: Option<&str>, chat_id: ChatId, username: Option<&str>) -> bool {
    let Some(configured) = configured.map(str::trim) else {
        return false;
    };
    if configured == chat_id.0.to_string() {
        return true;
    }
    match (configured.strip_prefix('@'), username) {
        (Some(wanted), Some(name)) => wanted.eq_ignore_ascii_case(name),
        _ => false,
    }
}

async fn answer(bot: Bot, msg: Message, cmd: Command, ctx: Arc<RelayContext>) -> ResponseResult<()> {
    info!("Bot command from chat {}: {:?}", msg.chat.id, cmd);
    let reply = execute(&ctx, cmd).await;
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

pub struct BotService {
    bot: Bot,
    ctx: Arc<RelayContext>,
}

impl BotService {
    pub fn new(bot: Bot, ctx: Arc<RelayContext>) -> Self {
        Self { bot, ctx }
    }
}

#[async_trait]
impl Actor for BotService {
    fn name(&self) -> ActorType {
        ActorType::BotActor
    }

    async fn run(&mut self, supervisor_tx: mpsc::Sender<ControlMessage>) -> anyhow::Result<()> {
        let heartbeat_handle = self.spawn_heartbeat(supervisor_tx.clone());
        info!("Starting Telegram command handler");

        let handler = Update::filter_message()
            .filter(|msg: Message, ctx: Arc<RelayContext>| {
                let allowed = chat_allowed(
                    ctx.config.telegram_chat_id.as_deref(),
                    msg.chat.id,
                    msg.chat.username(),
                );
                if !allowed {
                    warn!("Ignoring message from unknown chat {}", msg.chat.id);
                }
                allowed
            })
            .filter_command::<Command>()
            .endpoint(answer);

        Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.ctx.clone()])
            .build()
            .dispatch()
            .await;

        heartbeat_handle.abort();
        supervisor_tx
            .send(ControlMessage::Error(
                self.name(),
                "Telegram dispatcher stopped".to_string(),
            ))
            .await?;
        bail!("Telegram dispatcher stopped")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{MockMarket, MockTransport, context, market_hours, rising_bars, test_config};
    use storage::ManualClock;

    fn bot_context(market: MockMarket) -> RelayContext {
        let clock = Arc::new(ManualClock::new(market_hours()));
        context(test_config(&[]), MockTransport::new(), market, clock)
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(
            Command::parse("/capital 25000", "relay_bot").unwrap(),
            Command::Capital("25000".to_string())
        );
        assert_eq!(Command::parse("/scan", "relay_bot").unwrap(), Command::Scan);
        assert!(Command::parse("/launch", "relay_bot").is_err());
    }

    #[tokio::test]
    async fn test_setters_go_through_store() {
        let ctx = bot_context(MockMarket::new());

        let reply = execute(&ctx, Command::Capital("25000".to_string())).await;
        assert!(reply.starts_with("✅ Updated"));
        assert!(reply.contains("Capital: 25000.00"));

        execute(&ctx, Command::Side("short".to_string())).await;
        execute(&ctx, Command::Mode("all".to_string())).await;
        execute(&ctx, Command::Cooldown("5".to_string())).await;

        let settings = ctx.settings.get().await;
        assert_eq!(settings.capital, 25_000.0);
        assert_eq!(settings.side, SideMode::Short);
        assert_eq!(settings.filter_mode, FilterMode::EnterAndWait);
        assert_eq!(settings.cooldown_minutes, 5);
    }

    #[tokio::test]
    async fn test_bad_arguments_leave_settings_alone() {
        let ctx = bot_context(MockMarket::new());

        assert!(execute(&ctx, Command::Risk("lots".to_string())).await.starts_with("❌"));
        assert!(execute(&ctx, Command::Risk("250".to_string())).await.starts_with("❌"));
        assert!(execute(&ctx, Command::Side("sideways".to_string())).await.starts_with("❌"));
        assert_eq!(ctx.settings.get().await, Settings::default());
    }

    #[tokio::test]
    async fn test_analyze_and_status() {
        let mut market = MockMarket::new();
        market
            .expect_daily_bars()
            .withf(|symbol, _| symbol == "NVDA")
            .returning(|_, _| Ok(rising_bars(60)));
        let ctx = bot_context(market);

        let report = execute(&ctx, Command::Analyze("nvda".to_string())).await;
        assert!(report.starts_with("🔎 NVDA"));
        assert!(report.contains("LONG → ENTER"));

        assert_eq!(execute(&ctx, Command::Analyze(" ".to_string())).await, "Usage: /analyze <symbol>");

        ctx.state.lock().await.record_sent("NVDA");
        let status = execute(&ctx, Command::Status).await;
        assert!(status.contains("Alerts sent: 1 / unlimited"));
        assert!(status.contains("Symbols: NVDA"));
    }

    #[test]
    fn test_chat_allowed() {
        assert!(chat_allowed(Some("1001"), ChatId(1001), None));
        assert!(!chat_allowed(Some("1001"), ChatId(1002), None));
        assert!(chat_allowed(Some("@Alerts"), ChatId(-100), Some("alerts")));
        assert!(!chat_allowed(None, ChatId(1001), None));
    }
}
