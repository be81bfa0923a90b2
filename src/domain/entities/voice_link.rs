/// Voice link lifecycle
///
/// `Idle → Connecting → Ready → Disconnected → (resume) → Ready`, or on a missed resume
/// `Disconnected → Destroyed → Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceLinkStatus {
    Idle,
    Connecting,
    Ready,
    Disconnected,
    Destroyed,
}

impl VoiceLinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceLinkStatus::Idle => "idle",
            VoiceLinkStatus::Connecting => "connecting",
            VoiceLinkStatus::Ready => "ready",
            VoiceLinkStatus::Disconnected => "disconnected",
            VoiceLinkStatus::Destroyed => "destroyed",
        }
    }
}

/// Connection to the configured target channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceLink {
    pub channel_id: u64,
    pub status: VoiceLinkStatus,
    pub reconnect_attempt: u32,
}

impl VoiceLink {
    pub fn new(channel_id: u64) -> Self {
        Self {
            channel_id,
            status: VoiceLinkStatus::Idle,
            reconnect_attempt: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == VoiceLinkStatus::Ready
    }
}
