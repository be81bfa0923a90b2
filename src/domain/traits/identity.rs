use async_trait::async_trait;
use crate::application::errors::BotError;
use crate::domain::entities::BotIdentity;

/// Read-only identity lookup against the remote authentication service
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn lookup(&self, credential: &str) -> Result<BotIdentity, BotError>;
}
