//! Voice state parser - Classifies member moves relative to the target channel

use crate::domain::entities::VoiceStateChange;

/// How a voice state update relates to the target channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceTransition {
    /// Entered the target from another channel or from no channel
    JoinedTarget,
    LeftTarget,
    /// Mute/deafen toggles inside the target, or moves between other channels
    Unrelated,
}

pub struct VoiceStateParser {
    target_channel: u64,
}

impl VoiceStateParser {
    pub fn new(target_channel: u64) -> Self {
        Self { target_channel }
    }

    pub fn classify(&self, change: &VoiceStateChange) -> VoiceTransition {
        let target = Some(self.target_channel);
        let was_in = change.old_channel == target;
        let is_in = change.new_channel == target;

        match (was_in, is_in) {
            (false, true) => VoiceTransition::JoinedTarget,
            (true, false) => VoiceTransition::LeftTarget,
            _ => VoiceTransition::Unrelated,
        }
    }
}
