//! Discord adapter - serenity gateway, songbird voice and REST identity checks
//!
//! The gateway owns the client for the lifetime of one session. The voice transport and
//! presence updates reach that client through the shared `SessionHandles` slot.

pub mod clip;
pub mod gateway;
pub mod rest;
pub mod voice;

pub use clip::{probe, ClipInfo};
pub use gateway::DiscordGateway;
pub use rest::RestIdentityLookup;
pub use voice::SongbirdTransport;

use serenity::cache::Cache;
use serenity::gateway::ShardMessenger;
use serenity::http::Http;
use songbird::Songbird;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Handles of the currently connected client
#[derive(Clone)]
pub struct LiveSession {
    pub http: Arc<Http>,
    pub cache: Arc<Cache>,
    pub songbird: Arc<Songbird>,
    /// Known once the first shard is ready
    pub shard: Option<ShardMessenger>,
}

#[derive(Clone, Default)]
pub struct SessionHandles {
    inner: Arc<RwLock<Option<LiveSession>>>,
}

impl SessionHandles {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn install(&self, session: LiveSession) {
        *self.inner.write().await = Some(session);
    }

    pub async fn set_shard(&self, shard: ShardMessenger) {
        if let Some(session) = self.inner.write().await.as_mut() {
            session.shard = Some(shard);
        }
    }

    pub async fn clear(&self) {
        self.inner.write().await.take();
    }

    pub async fn current(&self) -> Option<LiveSession> {
        self.inner.read().await.clone()
    }
}
