use async_trait::async_trait;
use serde::Serialize;

/// Result of one delivery attempt, with a diagnostic for the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivery {
    pub ok: bool,
    pub message: String,
}

impl Delivery {
    pub fn delivered(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Outbound messaging transport. Sends once; retrying is up to the caller.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, destination: &str, text: &str) -> Delivery;
}

/// Stand-in used when no bot token is configured.
pub struct UnconfiguredNotifier;

#[async_trait]
impl Notifier for UnconfiguredNotifier {
    async fn send(&self, _destination: &str, _text: &str) -> Delivery {
        Delivery::failed("Configuration error: TELEGRAM_BOT_TOKEN not set")
    }
}
