//! Application layer errors

use thiserror::Error;

/// General bot errors
///
/// Payloads are plain strings so errors can travel inside dispatcher events.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BotError {
    #[error("Credential invalid: {0}")]
    CredentialInvalid(String),

    #[error("Authentication failed: {0}")]
    AuthFailure(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Voice channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Unhandled async failure: {0}")]
    Unhandled(String),
}

impl BotError {
    /// Only transport-level failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::Network(_))
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
