//! Voice link manager - joins the target channel and drives reconnection
//!
//! A drop first waits for the transport to resume on its own. If it doesn't within the
//! resume bound, the link is torn down and rejoined after a fixed delay. Rejoins are
//! unbounded.

use std::time::Duration;

use super::status_reporter::StatusChange;
use crate::application::errors::BotError;
use crate::domain::entities::{VoiceLink, VoiceLinkStatus};

#[derive(Debug, Clone)]
pub struct LinkPolicy {
    pub resume_timeout: Duration,
    pub rejoin_delay: Duration,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            resume_timeout: Duration::from_secs(5),
            rejoin_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    JoinRequested,
    Joined,
    JoinFailed(BotError),
    TransportConnecting,
    TransportReady,
    TransportDisconnected,
    /// Carries the drop epoch it was armed for
    ResumeTimedOut { epoch: u64 },
    RejoinDue,
    /// The gateway session this link belonged to is gone
    SessionLost,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Join { channel_id: u64 },
    Destroy,
    StartResumeTimer { epoch: u64, after: Duration },
    CancelResumeTimer,
    ScheduleRejoin { after: Duration },
    CancelRejoin,
    /// A join or resume attempt finished, successfully or not
    Settled,
    Report(StatusChange),
}

pub struct VoiceLinkManager {
    link: VoiceLink,
    policy: LinkPolicy,
    epoch: u64,
}

impl VoiceLinkManager {
    pub fn new(channel_id: u64, policy: LinkPolicy) -> Self {
        Self {
            link: VoiceLink::new(channel_id),
            policy,
            epoch: 0,
        }
    }

    pub fn status(&self) -> VoiceLinkStatus {
        self.link.status
    }

    pub fn is_ready(&self) -> bool {
        self.link.is_ready()
    }

    pub fn handle(&mut self, event: LinkEvent) -> Vec<LinkAction> {
        use LinkEvent as E;
        use VoiceLinkStatus as S;

        let channel_id = self.link.channel_id;
        match (self.link.status, event) {
            (S::Idle, E::JoinRequested) => {
                tracing::info!("Joining voice channel {}", channel_id);
                self.link.status = S::Connecting;
                vec![LinkAction::Join { channel_id }]
            }

            // At most one link: anything but Idle already has one in flight
            (status, E::JoinRequested) => {
                tracing::debug!("Join requested while link is {}; ignoring", status.as_str());
                Vec::new()
            }

            (S::Connecting, E::Joined | E::TransportReady) => {
                if self.link.reconnect_attempt > 0 {
                    tracing::info!(
                        "Voice link restored after {} rejoin attempt(s)",
                        self.link.reconnect_attempt
                    );
                }
                self.link.status = S::Ready;
                self.link.reconnect_attempt = 0;
                vec![LinkAction::Report(StatusChange::ClearError), LinkAction::Settled]
            }

            (S::Connecting, E::JoinFailed(error)) => self.join_failed(error),

            (S::Connecting | S::Ready, E::TransportDisconnected) => {
                self.epoch += 1;
                tracing::warn!("Disconnected from voice. Waiting for the transport to resume...");
                self.link.status = S::Disconnected;
                vec![LinkAction::StartResumeTimer {
                    epoch: self.epoch,
                    after: self.policy.resume_timeout,
                }]
            }

            (S::Disconnected, E::TransportConnecting) => {
                tracing::info!("Voice transport is resuming");
                self.link.status = S::Connecting;
                vec![LinkAction::CancelResumeTimer]
            }

            (S::Disconnected, E::TransportReady) => {
                tracing::info!("Voice transport resumed");
                self.link.status = S::Ready;
                vec![
                    LinkAction::CancelResumeTimer,
                    LinkAction::Report(StatusChange::ClearError),
                    LinkAction::Settled,
                ]
            }

            (S::Disconnected, E::ResumeTimedOut { epoch }) if epoch == self.epoch => {
                self.link.reconnect_attempt += 1;
                tracing::warn!(
                    "Voice link did not resume within {}s; rejoining (attempt {})",
                    self.policy.resume_timeout.as_secs(),
                    self.link.reconnect_attempt
                );
                self.link.status = S::Destroyed;
                vec![
                    LinkAction::Destroy,
                    LinkAction::ScheduleRejoin {
                        after: self.policy.rejoin_delay,
                    },
                ]
            }

            (S::Destroyed, E::RejoinDue) => {
                tracing::info!("Rejoining voice channel {}", channel_id);
                self.link.status = S::Connecting;
                vec![LinkAction::Join { channel_id }]
            }

            (S::Idle, E::SessionLost) => Vec::new(),

            // Calls die with the session; the next Ready joins from scratch
            (status, E::SessionLost) => {
                tracing::warn!("Gateway session lost while voice link was {}", status.as_str());
                self.epoch += 1;
                self.link.status = S::Idle;
                self.link.reconnect_attempt = 0;

                let mut actions = vec![LinkAction::CancelResumeTimer, LinkAction::CancelRejoin];
                if status != S::Destroyed {
                    actions.push(LinkAction::Destroy);
                }
                actions.push(LinkAction::Settled);
                actions
            }

            (status, event) => {
                tracing::debug!("Ignoring link event {:?} while {}", event, status.as_str());
                Vec::new()
            }
        }
    }

    fn join_failed(&mut self, error: BotError) -> Vec<LinkAction> {
        let message = format!("Error joining voice channel {}: {}", self.link.channel_id, error);
        tracing::error!("{}", message);

        // A failed rejoin keeps cycling; a failed initial join means misconfiguration
        if self.link.reconnect_attempt > 0 && error.is_retryable() {
            self.link.reconnect_attempt += 1;
            self.link.status = VoiceLinkStatus::Destroyed;
            return vec![
                LinkAction::Report(StatusChange::Error(message)),
                LinkAction::ScheduleRejoin {
                    after: self.policy.rejoin_delay,
                },
                LinkAction::Settled,
            ];
        }

        self.link.status = VoiceLinkStatus::Idle;
        self.link.reconnect_attempt = 0;
        vec![LinkAction::Report(StatusChange::Error(message)), LinkAction::Settled]
    }
}
