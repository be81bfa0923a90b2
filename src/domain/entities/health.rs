use chrono::{DateTime, Utc};
use std::time::Instant;

/// Aggregate bot health. `uptime` is derived on read, never stored.
#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub ready: bool,
    pub last_error: Option<String>,
    started: Instant,
    started_at: DateTime<Utc>,
}

impl HealthStatus {
    pub fn new() -> Self {
        Self {
            ready: false,
            last_error: None,
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        HealthSnapshot {
            ready: self.ready,
            last_error: self.last_error.clone(),
            uptime_secs: self.uptime_secs(),
            started_at: self.started_at,
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only copy handed to external readers
#[derive(Debug, Clone)]
pub struct HealthSnapshot {
    pub ready: bool,
    pub last_error: Option<String>,
    pub uptime_secs: f64,
    pub started_at: DateTime<Utc>,
}

impl HealthSnapshot {
    pub fn status_label(&self) -> &'static str {
        if self.ready {
            "connected"
        } else {
            "disconnected"
        }
    }
}
