use thiserror::Error;

/// Failure taxonomy shared by every crate of the relay.
///
/// None of these are fatal to the process: callers turn them into a
/// response status, a `(ok, message)` delivery or a per-symbol failure entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlertError {
    #[error("Insufficient data: {indicator} needs {required} bars, got {available}")]
    InsufficientData {
        indicator: &'static str,
        required: usize,
        available: usize,
    },
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unauthorized")]
    Unauthorized,
}

impl AlertError {
    pub fn insufficient(indicator: &'static str, required: usize, available: usize) -> Self {
        Self::InsufficientData {
            indicator,
            required,
            available,
        }
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
