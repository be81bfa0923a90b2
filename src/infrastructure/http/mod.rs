//! Status server - liveness page and structured health for the hosting platform
//!
//! Both routes only read a health snapshot and always answer 200, so a platform probe
//! keeps the process alive while the bot reports itself disconnected.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::services::StatusReporter;
use crate::domain::entities::HealthSnapshot;

#[derive(Clone)]
struct StatusState {
    reporter: StatusReporter,
    name: Arc<str>,
}

/// `GET /health` body
#[derive(Debug, Serialize)]
pub struct HealthBody {
    pub status: &'static str,
    pub error: Option<String>,
    pub uptime: f64,
}

impl From<HealthSnapshot> for HealthBody {
    fn from(snapshot: HealthSnapshot) -> Self {
        Self {
            status: snapshot.status_label(),
            error: snapshot.last_error,
            uptime: snapshot.uptime_secs,
        }
    }
}

pub fn router(reporter: StatusReporter, name: &str) -> Router {
    Router::new()
        .route("/", get(status_page))
        .route("/health", get(health))
        .with_state(StatusState {
            reporter,
            name: Arc::from(name),
        })
}

pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Status server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await
}

async fn status_page(State(state): State<StatusState>) -> String {
    let snapshot = state.reporter.snapshot().await;
    render_page(&state.name, &snapshot)
}

async fn health(State(state): State<StatusState>) -> Json<HealthBody> {
    Json(state.reporter.snapshot().await.into())
}

fn render_page(name: &str, snapshot: &HealthSnapshot) -> String {
    let mut page = format!(
        "{} is running!\n\nConnected: {}\nUptime: {}\nStarted: {}\n",
        name,
        if snapshot.ready { "yes" } else { "no" },
        human_uptime(snapshot.uptime_secs),
        snapshot.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
    );
    if let Some(error) = &snapshot.last_error {
        page.push_str(&format!("Last error: {}\n", error));
    }
    page
}

fn human_uptime(secs: f64) -> String {
    let total = secs as u64;
    let (days, hours, minutes, seconds) = (total / 86400, total % 86400 / 3600, total % 3600 / 60, total % 60);
    if days > 0 {
        format!("{}d {}h {}m {}s", days, hours, minutes, seconds)
    } else if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
