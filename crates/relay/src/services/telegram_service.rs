use std::time::Duration;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::Recipient;
use tracing::error;

use crate::notifier::{Delivery, Notifier};

/// Telegram transport for alerts. One attempt per message, failures come
/// back as a `Delivery` with the API's description.
pub struct TelegramService {
    bot: Bot,
}

impl TelegramService {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramService {
    async fn send(&self, destination: &str, text: &str) -> Delivery {
        let Some(recipient) = recipient(destination) else {
            return Delivery::failed(format!("Invalid chat id '{}'", destination));
        };

        match self.bot.send_message(recipient, text).await {
            Ok(message) => Delivery::delivered(format!("message {}", message.id)),
            Err(e) => {
                error!("Failed to send Telegram message: {}", e);
                Delivery::failed(e.to_string())
            }
        }
    }
}

/// Numeric chat ids (including negative group ids) or `@channel` names.
pub fn recipient(destination: &str) -> Option<Recipient> {
    let destination = destination.trim();
    if destination.starts_with('@') && destination.len() > 1 {
        return Some(Recipient::ChannelUsername(destination.to_string()));
    }
    destination.parse::<i64>().ok().map(|id| Recipient::Id(ChatId(id)))
}

pub fn build_bot(token: &str, timeout: Duration) -> anyhow::Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(timeout)
        .build()?;
    Ok(Bot::with_client(token, client))
}
