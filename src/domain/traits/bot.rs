use async_trait::async_trait;
use crate::application::errors::BotError;

/// Gateway trait - abstraction for the persistent chat-service session
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Log in and drive the session until it ends.
    ///
    /// Readiness is reported out-of-band as an event; this future only resolves once the
    /// session is over. `Ok(())` means the session closed without an error.
    async fn connect(&self, credential: &str) -> Result<(), BotError>;

    /// Declare "Listening to <activity>" presence on the live session
    async fn set_presence(&self, activity: &str) -> Result<(), BotError>;
}
