use chrono::{DateTime, Utc};

/// Welcome clip playback. At most one clip plays at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing {
        member: String,
        started_at: DateTime<Utc>,
    },
}

impl PlaybackState {
    pub fn playing(member: impl Into<String>) -> Self {
        PlaybackState::Playing {
            member: member.into(),
            started_at: Utc::now(),
        }
    }

    pub fn in_progress(&self) -> bool {
        matches!(self, PlaybackState::Playing { .. })
    }
}
