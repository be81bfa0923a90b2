//! Dispatcher - the single event loop owning all bot state
//!
//! Adapters and timers publish `BotEvent`s; the loop feeds them through the state machines
//! in delivery order and performs the resulting actions. Slow work (login, join, playback,
//! credential checks) runs in supervised tasks that report back as events, so the loop
//! never blocks on the network.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use super::events::{BotEvent, EventSink, PlaybackEvent};
use super::parser::{VoiceStateParser, VoiceTransition};
use super::scheduler::{spawn_supervised, TimerKey, Timers};
use crate::application::errors::BotError;
use crate::application::services::{
    LinkAction, LinkEvent, LinkPolicy, PlaybackAction, PlaybackGate, SessionAction, SessionConnector,
    SessionEvent, SessionPolicy, StatusChange, StatusReporter, TokenValidator, VoiceLinkManager,
};
use crate::domain::entities::{SessionStatus, VoiceStateChange};
use crate::domain::traits::{Gateway, VoiceTransport};

/// Names of the supervised tasks, as reported in `TaskFailed`
const TOKEN_CHECK: &str = "token check";
const GATEWAY_SESSION: &str = "gateway session";
const PRESENCE: &str = "presence";
const VOICE_JOIN: &str = "voice join";
const VOICE_TEARDOWN: &str = "voice teardown";
const WELCOME_SOUND: &str = "welcome sound";

/// Static settings the loop runs with
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub credential: Option<String>,
    pub channel_id: u64,
    pub presence: String,
    pub welcome_sound: PathBuf,
    pub session: SessionPolicy,
    pub link: LinkPolicy,
    pub playback_retry: Duration,
}

/// External services the loop drives
#[derive(Clone)]
pub struct Collaborators {
    pub gateway: Arc<dyn Gateway>,
    pub transport: Arc<dyn VoiceTransport>,
    pub validator: TokenValidator,
}

pub struct Dispatcher {
    settings: DispatcherSettings,
    deps: Collaborators,
    reporter: StatusReporter,
    session: SessionConnector,
    link: VoiceLinkManager,
    gate: PlaybackGate,
    parser: VoiceStateParser,
    timers: Timers,
    sink: EventSink,
    events: mpsc::UnboundedReceiver<BotEvent>,
}

impl Dispatcher {
    pub fn new(
        settings: DispatcherSettings,
        deps: Collaborators,
        reporter: StatusReporter,
        sink: EventSink,
        events: mpsc::UnboundedReceiver<BotEvent>,
    ) -> Self {
        Self {
            session: SessionConnector::new(settings.session.clone()),
            link: VoiceLinkManager::new(settings.channel_id, settings.link.clone()),
            gate: PlaybackGate::new(settings.playback_retry),
            parser: VoiceStateParser::new(settings.channel_id),
            timers: Timers::new(sink.clone()),
            settings,
            deps,
            reporter,
            sink,
            events,
        }
    }

    /// Start the session and process events until every sender is gone
    pub async fn run(mut self) {
        self.start().await;
        while let Some(event) = self.events.recv().await {
            self.handle(event).await;
        }
        tracing::info!("Dispatcher stopped");
    }

    async fn start(&mut self) {
        let event = if self.settings.credential.is_some() {
            SessionEvent::Start
        } else {
            SessionEvent::MissingCredential
        };
        self.handle(BotEvent::Session(event)).await;
    }

    /// Process one event and every internal follow-up it causes
    pub async fn handle(&mut self, event: BotEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let follow_ups = self.step(event).await;
            queue.extend(follow_ups);
        }
    }

    async fn step(&mut self, event: BotEvent) -> Vec<BotEvent> {
        match event {
            BotEvent::Session(event) => {
                let before = self.session.status();
                let actions = self.session.handle(event);
                self.log_session_change(before);
                self.run_session_actions(actions).await
            }
            BotEvent::Link(event) => {
                let actions = self.link.handle(event);
                self.run_link_actions(actions).await
            }
            BotEvent::LinkSettled => {
                let actions = self.gate.on_link_settled();
                self.run_playback_actions(actions).await
            }
            BotEvent::VoiceState(change) => self.on_voice_state(change).await,
            BotEvent::Playback(PlaybackEvent::Finished) => {
                let actions = self.gate.on_finished();
                self.run_playback_actions(actions).await
            }
            BotEvent::Playback(PlaybackEvent::Failed(error)) => {
                let actions = self.gate.on_failed(error);
                self.run_playback_actions(actions).await
            }
            BotEvent::PlaybackRetryDue => {
                let actions = self.gate.on_retry_due(self.link.is_ready());
                self.run_playback_actions(actions).await
            }
            BotEvent::TaskFailed { task, error } => self.on_task_failed(task, error).await,
        }
    }

    /// Record the failure and release whatever state machine was waiting on the task
    async fn on_task_failed(&mut self, task: &'static str, error: BotError) -> Vec<BotEvent> {
        tracing::error!("Unhandled failure in {}: {}", task, error);
        self.reporter
            .apply(StatusChange::Error(format!("{}: {}", task, error)))
            .await;

        match task {
            TOKEN_CHECK => vec![BotEvent::Session(SessionEvent::TokenChecked(Err(error)))],
            GATEWAY_SESSION => vec![BotEvent::Session(SessionEvent::Ended(error))],
            VOICE_JOIN => vec![BotEvent::Link(LinkEvent::JoinFailed(error))],
            WELCOME_SOUND if self.gate.in_progress() => {
                vec![BotEvent::Playback(PlaybackEvent::Failed(error))]
            }
            _ => Vec::new(),
        }
    }

    fn log_session_change(&self, before: SessionStatus) {
        let session = self.session.session();
        if session.status == before {
            return;
        }
        match &session.identity {
            Some(identity) => tracing::debug!(
                "Session {} -> {} as {}",
                before.as_str(),
                session.status.as_str(),
                identity
            ),
            None => tracing::debug!("Session {} -> {}", before.as_str(), session.status.as_str()),
        }
    }

    async fn on_voice_state(&mut self, change: VoiceStateChange) -> Vec<BotEvent> {
        match self.parser.classify(&change) {
            VoiceTransition::JoinedTarget => {
                let actions = self.gate.on_member_joined(&change.user, self.link.is_ready());
                self.run_playback_actions(actions).await
            }
            VoiceTransition::LeftTarget => {
                tracing::debug!("{} left the voice channel", change.user);
                Vec::new()
            }
            VoiceTransition::Unrelated => Vec::new(),
        }
    }

    async fn run_session_actions(&mut self, actions: Vec<SessionAction>) -> Vec<BotEvent> {
        let mut follow_ups: Vec<BotEvent> = Vec::new();
        for action in actions {
            match action {
                SessionAction::ValidateToken => {
                    let validator = self.deps.validator.clone();
                    let credential = self.credential();
                    spawn_supervised(&self.sink, TOKEN_CHECK, async move {
                        let result = validator.validate(&credential).await;
                        Ok(Some(BotEvent::Session(SessionEvent::TokenChecked(result))))
                    });
                }
                SessionAction::Connect { attempt } => {
                    let gateway = self.deps.gateway.clone();
                    let credential = self.credential();
                    spawn_supervised(&self.sink, GATEWAY_SESSION, async move {
                        tracing::debug!("Gateway connect (attempt {})", attempt);
                        let error = match gateway.connect(&credential).await {
                            Ok(()) => BotError::Network("gateway session closed".to_string()),
                            Err(e) => e,
                        };
                        Ok(Some(BotEvent::Session(SessionEvent::Ended(error))))
                    });
                }
                SessionAction::ScheduleRetry { attempt, delay } => {
                    self.timers.schedule(
                        TimerKey::SessionRetry,
                        delay,
                        SessionEvent::RetryDue { attempt }.into(),
                    );
                }
                SessionAction::SetPresence => {
                    let gateway = self.deps.gateway.clone();
                    let presence = self.settings.presence.clone();
                    spawn_supervised(&self.sink, PRESENCE, async move {
                        // Best-effort, never retried
                        if let Err(e) = gateway.set_presence(&presence).await {
                            tracing::warn!("Failed to set presence: {}", e);
                        }
                        Ok(None)
                    });
                }
                SessionAction::Announce(identity) => {
                    tracing::info!("Voice bot ready! Logged in as {}", identity);
                    follow_ups.push(LinkEvent::JoinRequested.into());
                }
                SessionAction::Lost => follow_ups.push(LinkEvent::SessionLost.into()),
                SessionAction::Report(change) => self.reporter.apply(change).await,
            }
        }
        follow_ups
    }

    async fn run_link_actions(&mut self, actions: Vec<LinkAction>) -> Vec<BotEvent> {
        let mut follow_ups: Vec<BotEvent> = Vec::new();
        for action in actions {
            match action {
                LinkAction::Join { channel_id } => {
                    let transport = self.deps.transport.clone();
                    spawn_supervised(&self.sink, VOICE_JOIN, async move {
                        let event = match transport.join(channel_id).await {
                            Ok(()) => LinkEvent::Joined,
                            Err(e) => LinkEvent::JoinFailed(e),
                        };
                        Ok(Some(BotEvent::Link(event)))
                    });
                }
                LinkAction::Destroy => {
                    let transport = self.deps.transport.clone();
                    spawn_supervised(&self.sink, VOICE_TEARDOWN, async move {
                        if let Err(e) = transport.destroy().await {
                            tracing::warn!("Failed to tear down voice link: {}", e);
                        }
                        Ok(None)
                    });
                }
                LinkAction::StartResumeTimer { epoch, after } => {
                    self.timers.schedule(
                        TimerKey::ResumeWait,
                        after,
                        LinkEvent::ResumeTimedOut { epoch }.into(),
                    );
                }
                LinkAction::CancelResumeTimer => {
                    if self.timers.is_pending(TimerKey::ResumeWait) {
                        tracing::debug!("Resume wait cancelled");
                    }
                    self.timers.cancel(TimerKey::ResumeWait);
                }
                LinkAction::ScheduleRejoin { after } => {
                    self.timers
                        .schedule(TimerKey::Rejoin, after, LinkEvent::RejoinDue.into());
                }
                LinkAction::CancelRejoin => self.timers.cancel(TimerKey::Rejoin),
                LinkAction::Settled => follow_ups.push(BotEvent::LinkSettled),
                LinkAction::Report(change) => self.reporter.apply(change).await,
            }
        }
        follow_ups
    }

    async fn run_playback_actions(&mut self, actions: Vec<PlaybackAction>) -> Vec<BotEvent> {
        let mut follow_ups: Vec<BotEvent> = Vec::new();
        for action in actions {
            match action {
                PlaybackAction::Play { member } => {
                    let transport = self.deps.transport.clone();
                    let clip = self.settings.welcome_sound.clone();
                    spawn_supervised(&self.sink, WELCOME_SOUND, async move {
                        match transport.play(&clip).await {
                            Ok(()) => {
                                tracing::debug!("Clip streaming for {}", member);
                                Ok(None)
                            }
                            Err(e) => Ok(Some(BotEvent::Playback(PlaybackEvent::Failed(e)))),
                        }
                    });
                }
                PlaybackAction::RequestJoin => follow_ups.push(LinkEvent::JoinRequested.into()),
                PlaybackAction::ScheduleRetry { after } => {
                    self.timers
                        .schedule(TimerKey::PlaybackRetry, after, BotEvent::PlaybackRetryDue);
                }
                PlaybackAction::Report(change) => self.reporter.apply(change).await,
            }
        }
        follow_ups
    }

    fn credential(&self) -> String {
        self.settings.credential.clone().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests;
