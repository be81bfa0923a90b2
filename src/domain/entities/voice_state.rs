use super::User;

/// A member moved between voice channels (or joined/left voice entirely)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceStateChange {
    pub user: User,
    pub old_channel: Option<u64>,
    pub new_channel: Option<u64>,
}

impl VoiceStateChange {
    pub fn new(user: User, old_channel: Option<u64>, new_channel: Option<u64>) -> Self {
        Self {
            user,
            old_channel,
            new_channel,
        }
    }
}
