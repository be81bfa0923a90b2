use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::entities::{HealthSnapshot, HealthStatus};

/// A state transition published by one of the components
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusChange {
    /// Gateway session reached `Ready`
    Ready,
    /// Gateway session is no longer usable
    NotReady,
    /// A failure path was taken
    Error(String),
    /// A subsequent success happened
    ClearError,
}

/// Passive health aggregator shared with the status server
#[derive(Debug, Clone, Default)]
pub struct StatusReporter {
    health: Arc<RwLock<HealthStatus>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn apply(&self, change: StatusChange) {
        let mut health = self.health.write().await;
        match change {
            StatusChange::Ready => health.ready = true,
            StatusChange::NotReady => health.ready = false,
            StatusChange::Error(message) => health.last_error = Some(message),
            StatusChange::ClearError => health.last_error = None,
        }
    }

    pub async fn snapshot(&self) -> HealthSnapshot {
        self.health.read().await.snapshot()
    }
}
