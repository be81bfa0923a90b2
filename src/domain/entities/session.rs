use super::BotIdentity;

/// Gateway session status as reported to the outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Ready,
    Errored,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Ready => "ready",
            SessionStatus::Errored => "errored",
        }
    }
}

/// The single gateway session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSession {
    pub identity: Option<BotIdentity>,
    pub status: SessionStatus,
}
