use async_trait::async_trait;
use std::path::Path;
use crate::application::errors::BotError;

/// Voice transport - media connection to a single voice channel
///
/// Connection health (`ready`, `disconnected`, resume signals) and end-of-clip notifications
/// are delivered as events by the implementation, not through these return values.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Join the channel. Resolves once the link is usable.
    async fn join(&self, channel_id: u64) -> Result<(), BotError>;

    /// Tear down the current link, if any
    async fn destroy(&self) -> Result<(), BotError>;

    /// Start streaming the clip into the joined channel
    async fn play(&self, clip: &Path) -> Result<(), BotError>;
}
