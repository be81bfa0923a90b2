//! Playback gate - plays the welcome clip once per qualifying join
//!
//! Requests are dropped, never queued, while a clip is playing.

use chrono::Utc;
use std::time::Duration;

use super::status_reporter::StatusChange;
use crate::application::errors::BotError;
use crate::domain::entities::{PlaybackState, User};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackAction {
    Play { member: String },
    /// Ask the voice link manager for a link
    RequestJoin,
    ScheduleRetry { after: Duration },
    Report(StatusChange),
}

/// Deferred playback for a join that arrived without a ready link
#[derive(Debug, Clone, PartialEq, Eq)]
enum Deferred {
    None,
    AwaitingLink { member: String },
    Scheduled { member: String },
}

pub struct PlaybackGate {
    state: PlaybackState,
    deferred: Deferred,
    retry_delay: Duration,
}

impl PlaybackGate {
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

    pub fn new(retry_delay: Duration) -> Self {
        Self {
            state: PlaybackState::Idle,
            deferred: Deferred::None,
            retry_delay,
        }
    }

    pub fn in_progress(&self) -> bool {
        self.state.in_progress()
    }

    pub fn on_member_joined(&mut self, user: &User, link_ready: bool) -> Vec<PlaybackAction> {
        if user.is_bot {
            tracing::debug!("Ignoring bot account {}", user);
            return Vec::new();
        }

        tracing::info!("{} joined the voice channel!", user);

        if !link_ready {
            if self.deferred != Deferred::None {
                tracing::debug!("Playback already deferred; ignoring join from {}", user);
                return Vec::new();
            }
            self.deferred = Deferred::AwaitingLink {
                member: user.display_name(),
            };
            return vec![PlaybackAction::RequestJoin];
        }

        self.try_play(user.display_name())
    }

    /// The join attempt triggered for a deferred playback finished
    pub fn on_link_settled(&mut self) -> Vec<PlaybackAction> {
        match std::mem::replace(&mut self.deferred, Deferred::None) {
            Deferred::AwaitingLink { member } => {
                self.deferred = Deferred::Scheduled { member };
                vec![PlaybackAction::ScheduleRetry {
                    after: self.retry_delay,
                }]
            }
            other => {
                self.deferred = other;
                Vec::new()
            }
        }
    }

    /// The single deferred retry; it never requests another join
    pub fn on_retry_due(&mut self, link_ready: bool) -> Vec<PlaybackAction> {
        let member = match std::mem::replace(&mut self.deferred, Deferred::None) {
            Deferred::Scheduled { member } => member,
            other => {
                self.deferred = other;
                return Vec::new();
            }
        };

        if !link_ready {
            tracing::warn!("Voice link still not ready; skipping welcome sound for {}", member);
            return Vec::new();
        }
        self.try_play(member)
    }

    pub fn on_finished(&mut self) -> Vec<PlaybackAction> {
        let PlaybackState::Playing { member, started_at } = std::mem::take(&mut self.state) else {
            return Vec::new();
        };
        let elapsed = Utc::now() - started_at;
        tracing::info!(
            "Welcome sound for {} finished after {}ms",
            member,
            elapsed.num_milliseconds()
        );
        vec![PlaybackAction::Report(StatusChange::ClearError)]
    }

    pub fn on_failed(&mut self, error: BotError) -> Vec<PlaybackAction> {
        tracing::error!("Audio player error: {}", error);
        self.state = PlaybackState::Idle;
        vec![PlaybackAction::Report(StatusChange::Error(error.to_string()))]
    }

    fn try_play(&mut self, member: String) -> Vec<PlaybackAction> {
        if self.state.in_progress() {
            tracing::debug!("Welcome sound already playing; dropping request for {}", member);
            return Vec::new();
        }

        tracing::info!("Playing welcome sound for {}", member);
        self.state = PlaybackState::playing(member.clone());
        vec![PlaybackAction::Play { member }]
    }
}
