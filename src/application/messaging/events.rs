//! Dispatcher events and the sink adapters publish them through

use tokio::sync::mpsc;

use crate::application::errors::BotError;
use crate::application::services::{LinkEvent, SessionEvent};
use crate::domain::entities::VoiceStateChange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Natural end of the clip
    Finished,
    Failed(BotError),
}

/// Everything the dispatcher loop reacts to, in delivery order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    Session(SessionEvent),
    Link(LinkEvent),
    /// Internal: a join attempt finished
    LinkSettled,
    VoiceState(VoiceStateChange),
    Playback(PlaybackEvent),
    PlaybackRetryDue,
    /// A supervised task returned an error or panicked
    TaskFailed { task: &'static str, error: BotError },
}

/// Cloneable handle for publishing events into the dispatcher loop
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: mpsc::UnboundedSender<BotEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<BotEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    pub fn emit(&self, event: impl Into<BotEvent>) {
        if let Err(e) = self.sender.send(event.into()) {
            tracing::warn!("Dispatcher is gone, dropping event {:?}", e.0);
        }
    }
}

impl From<SessionEvent> for BotEvent {
    fn from(event: SessionEvent) -> Self {
        BotEvent::Session(event)
    }
}

impl From<LinkEvent> for BotEvent {
    fn from(event: LinkEvent) -> Self {
        BotEvent::Link(event)
    }
}

impl From<PlaybackEvent> for BotEvent {
    fn from(event: PlaybackEvent) -> Self {
        BotEvent::Playback(event)
    }
}

impl From<VoiceStateChange> for BotEvent {
    fn from(change: VoiceStateChange) -> Self {
        BotEvent::VoiceState(change)
    }
}
