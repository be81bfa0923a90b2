//! Session connector - supervises the single gateway session
//!
//! Pure state machine: events go in, actions come out. The dispatcher performs the actions.

use std::time::Duration;

use super::status_reporter::StatusChange;
use super::token_validator::TokenCheck;
use crate::application::errors::BotError;
use crate::domain::entities::{BotIdentity, BotSession, SessionStatus};

/// Retry policy for gateway logins
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub token_check: TokenCheck,
}

impl SessionPolicy {
    /// Delay after the given failed attempt: base, 2×base, ...
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        self.backoff_base * failed_attempt.max(1)
    }
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(15),
            token_check: TokenCheck::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Validating { attempt: u32 },
    Connecting { attempt: u32 },
    /// Waiting before attempt `attempt`
    Backoff { attempt: u32 },
    Ready { identity: BotIdentity },
    Errored { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    MissingCredential,
    TokenChecked(Result<BotIdentity, BotError>),
    Ready(BotIdentity),
    /// The connect future resolved; the session is over
    Ended(BotError),
    RetryDue { attempt: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    ValidateToken,
    Connect { attempt: u32 },
    ScheduleRetry { attempt: u32, delay: Duration },
    SetPresence,
    /// Readiness observed by the voice link manager
    Announce(BotIdentity),
    /// A Ready session ended; anything bound to it is gone
    Lost,
    Report(StatusChange),
}

pub struct SessionConnector {
    state: SessionState,
    policy: SessionPolicy,
}

impl SessionConnector {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            state: SessionState::Disconnected,
            policy,
        }
    }

    pub fn status(&self) -> SessionStatus {
        match self.state {
            SessionState::Disconnected | SessionState::Backoff { .. } => SessionStatus::Disconnected,
            SessionState::Validating { .. } | SessionState::Connecting { .. } => SessionStatus::Connecting,
            SessionState::Ready { .. } => SessionStatus::Ready,
            SessionState::Errored { .. } => SessionStatus::Errored,
        }
    }

    pub fn session(&self) -> BotSession {
        let identity = match &self.state {
            SessionState::Ready { identity } => Some(identity.clone()),
            _ => None,
        };
        BotSession {
            identity,
            status: self.status(),
        }
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<SessionAction> {
        let state = std::mem::replace(&mut self.state, SessionState::Disconnected);
        let (next, actions) = self.transition(state, event);
        self.state = next;
        actions
    }

    fn transition(&self, state: SessionState, event: SessionEvent) -> (SessionState, Vec<SessionAction>) {
        use SessionAction as A;
        use SessionEvent as E;
        use SessionState as S;

        match (state, event) {
            (S::Disconnected, E::Start) => self.begin_attempt(1, false),

            (S::Disconnected, E::MissingCredential) => {
                self.give_up("DISCORD_BOT_TOKEN is not set".to_string())
            }

            (S::Validating { attempt }, E::TokenChecked(Ok(identity))) => {
                tracing::debug!("Credential check passed for {}", identity);
                (S::Connecting { attempt }, vec![A::Connect { attempt }])
            }

            (S::Validating { .. }, E::TokenChecked(Err(e))) => {
                self.give_up(format!("Credential check failed: {}", e))
            }

            (S::Connecting { .. } | S::Ready { .. }, E::Ready(identity)) => (
                S::Ready { identity: identity.clone() },
                vec![
                    A::Report(StatusChange::Ready),
                    A::Report(StatusChange::ClearError),
                    A::SetPresence,
                    A::Announce(identity),
                ],
            ),

            (S::Connecting { attempt }, E::Ended(e)) => self.fail_attempt(attempt, e),

            // A session that was Ready and then ended starts a fresh retry series
            (S::Ready { identity }, E::Ended(e)) => {
                tracing::warn!("Gateway session for {} ended: {}", identity, e);
                let (next, mut actions) = self.fail_attempt(1, e);
                actions.insert(0, A::Lost);
                (next, actions)
            }

            (S::Backoff { attempt }, E::RetryDue { attempt: due }) if attempt == due => {
                self.begin_attempt(attempt, true)
            }

            (state, event) => {
                tracing::debug!("Ignoring session event {:?} in state {:?}", event, state);
                (state, Vec::new())
            }
        }
    }

    fn begin_attempt(&self, attempt: u32, after_failure: bool) -> (SessionState, Vec<SessionAction>) {
        let validate = match self.policy.token_check {
            TokenCheck::Always => true,
            TokenCheck::OnFailure => after_failure,
            TokenCheck::Never => false,
        };

        tracing::info!("Gateway login attempt {}/{}", attempt, self.policy.max_attempts);
        if validate {
            (SessionState::Validating { attempt }, vec![SessionAction::ValidateToken])
        } else {
            (SessionState::Connecting { attempt }, vec![SessionAction::Connect { attempt }])
        }
    }

    fn fail_attempt(&self, attempt: u32, error: BotError) -> (SessionState, Vec<SessionAction>) {
        if !error.is_retryable() {
            return self.give_up(format!("Gateway login failed: {}", error));
        }

        if attempt >= self.policy.max_attempts {
            return self.give_up(format!(
                "Gateway login failed after {} attempts: {}",
                attempt, error
            ));
        }

        let delay = self.policy.backoff(attempt);
        let message = format!(
            "Gateway login attempt {}/{} failed: {}",
            attempt, self.policy.max_attempts, error
        );
        tracing::warn!("{}; retrying in {}s", message, delay.as_secs());

        (
            SessionState::Backoff { attempt: attempt + 1 },
            vec![
                SessionAction::Report(StatusChange::NotReady),
                SessionAction::Report(StatusChange::Error(message)),
                SessionAction::ScheduleRetry {
                    attempt: attempt + 1,
                    delay,
                },
            ],
        )
    }

    fn give_up(&self, reason: String) -> (SessionState, Vec<SessionAction>) {
        tracing::error!("{}", reason);
        (
            SessionState::Errored {
                reason: reason.clone(),
            },
            vec![
                SessionAction::Report(StatusChange::NotReady),
                SessionAction::Report(StatusChange::Error(reason)),
            ],
        )
    }
}
