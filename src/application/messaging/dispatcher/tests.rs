//! Dispatcher scenarios, driven under a paused tokio clock

use super::*;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use crate::application::services::TokenCheck;
use crate::domain::entities::{BotIdentity, SessionStatus, User, VoiceLinkStatus};
use crate::domain::traits::IdentityLookup;

const CHANNEL: u64 = 1396967239948701859;
const OTHER_CHANNEL: u64 = 42;

enum Login {
    Ready,
    Fail(BotError),
}

struct FakeGateway {
    sink: EventSink,
    script: Mutex<VecDeque<Login>>,
    connects: AtomicU32,
    presence: Mutex<Vec<String>>,
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn connect(&self, _credential: &str) -> Result<(), BotError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Login::Ready);
        match next {
            Login::Ready => {
                self.sink
                    .emit(SessionEvent::Ready(BotIdentity::new(1, "greeter#0001")));
                std::future::pending::<()>().await;
                Ok(())
            }
            Login::Fail(e) => Err(e),
        }
    }

    async fn set_presence(&self, activity: &str) -> Result<(), BotError> {
        self.presence.lock().unwrap().push(activity.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct FakeTransport {
    join_results: Mutex<VecDeque<Result<(), BotError>>>,
    play_error: Mutex<Option<BotError>>,
    joins: AtomicU32,
    destroys: AtomicU32,
    plays: AtomicU32,
}

#[async_trait]
impl VoiceTransport for FakeTransport {
    async fn join(&self, channel_id: u64) -> Result<(), BotError> {
        assert_eq!(channel_id, CHANNEL);
        self.joins.fetch_add(1, Ordering::SeqCst);
        self.join_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn destroy(&self) -> Result<(), BotError> {
        self.destroys.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self, clip: &Path) -> Result<(), BotError> {
        assert_eq!(clip, Path::new("welcome.wav"));
        self.plays.fetch_add(1, Ordering::SeqCst);
        match self.play_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct FakeLookup(Result<BotIdentity, BotError>);

#[async_trait]
impl IdentityLookup for FakeLookup {
    async fn lookup(&self, _credential: &str) -> Result<BotIdentity, BotError> {
        self.0.clone()
    }
}

struct Harness {
    dispatcher: Dispatcher,
    gateway: Arc<FakeGateway>,
    transport: Arc<FakeTransport>,
    reporter: StatusReporter,
}

struct Options {
    credential: Option<String>,
    token_check: TokenCheck,
    logins: Vec<Login>,
    joins: Vec<Result<(), BotError>>,
    lookup: Result<BotIdentity, BotError>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            credential: Some("token".to_string()),
            token_check: TokenCheck::Never,
            logins: Vec::new(),
            joins: Vec::new(),
            lookup: Ok(BotIdentity::new(1, "greeter")),
        }
    }
}

fn harness(options: Options) -> Harness {
    let (sink, events) = EventSink::channel();
    let gateway = Arc::new(FakeGateway {
        sink: sink.clone(),
        script: Mutex::new(options.logins.into_iter().collect()),
        connects: AtomicU32::new(0),
        presence: Mutex::new(Vec::new()),
    });
    let transport = Arc::new(FakeTransport {
        join_results: Mutex::new(options.joins.into_iter().collect()),
        ..FakeTransport::default()
    });
    let reporter = StatusReporter::new();

    let settings = DispatcherSettings {
        credential: options.credential,
        channel_id: CHANNEL,
        presence: "Welcome sounds".to_string(),
        welcome_sound: PathBuf::from("welcome.wav"),
        session: SessionPolicy {
            token_check: options.token_check,
            ..SessionPolicy::default()
        },
        link: LinkPolicy::default(),
        playback_retry: Duration::from_millis(500),
    };
    let deps = Collaborators {
        gateway: gateway.clone(),
        transport: transport.clone(),
        validator: TokenValidator::new(
            Arc::new(FakeLookup(options.lookup)),
            TokenValidator::DEFAULT_TIMEOUT,
        ),
    };

    Harness {
        dispatcher: Dispatcher::new(settings, deps, reporter.clone(), sink, events),
        gateway,
        transport,
        reporter,
    }
}

impl Harness {
    /// Let spawned work finish and feed everything it reported back into the loop
    async fn settle(&mut self) {
        loop {
            tokio::time::sleep(Duration::from_millis(1)).await;
            let mut idle = true;
            while let Ok(event) = self.dispatcher.events.try_recv() {
                idle = false;
                self.dispatcher.handle(event).await;
            }
            if idle {
                break;
            }
        }
    }

    async fn advance(&mut self, by: Duration) {
        tokio::time::sleep(by).await;
        self.settle().await;
    }

    async fn start(&mut self) {
        self.dispatcher.start().await;
        self.settle().await;
    }

    async fn send(&mut self, event: impl Into<BotEvent>) {
        self.dispatcher.handle(event.into()).await;
        self.settle().await;
    }

    fn joins(&self) -> u32 {
        self.transport.joins.load(Ordering::SeqCst)
    }

    fn destroys(&self) -> u32 {
        self.transport.destroys.load(Ordering::SeqCst)
    }

    fn plays(&self) -> u32 {
        self.transport.plays.load(Ordering::SeqCst)
    }

    fn connects(&self) -> u32 {
        self.gateway.connects.load(Ordering::SeqCst)
    }

    fn link_status(&self) -> VoiceLinkStatus {
        self.dispatcher.link.status()
    }
}

fn joined(id: u64) -> VoiceStateChange {
    VoiceStateChange::new(User::new(id, format!("member{}", id)), Some(OTHER_CHANNEL), Some(CHANNEL))
}

async fn ready_harness() -> Harness {
    let mut h = harness(Options::default());
    h.start().await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);
    h
}

#[tokio::test(start_paused = true)]
async fn test_startup_joins_target_channel() {
    let h = ready_harness().await;

    assert_eq!(h.connects(), 1);
    assert_eq!(h.joins(), 1);
    assert_eq!(h.dispatcher.session.status(), SessionStatus::Ready);
    assert_eq!(*h.gateway.presence.lock().unwrap(), vec!["Welcome sounds".to_string()]);

    let health = h.reporter.snapshot().await;
    assert!(health.ready);
    assert!(health.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_member_join_plays_once_and_completes() {
    let mut h = ready_harness().await;

    h.send(joined(2)).await;
    assert_eq!(h.plays(), 1);
    assert!(h.dispatcher.gate.in_progress());

    h.send(PlaybackEvent::Finished).await;
    assert!(!h.dispatcher.gate.in_progress());
}

#[tokio::test(start_paused = true)]
async fn test_two_joins_during_clip_play_once() {
    let mut h = ready_harness().await;

    h.send(joined(2)).await;
    h.advance(Duration::from_millis(100)).await;
    h.send(joined(3)).await;

    assert_eq!(h.plays(), 1);
    assert!(h.reporter.snapshot().await.last_error.is_none());

    h.send(PlaybackEvent::Finished).await;
    h.send(joined(4)).await;
    assert_eq!(h.plays(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_bot_join_never_plays() {
    let mut h = ready_harness().await;
    let bot = VoiceStateChange::new(User::new(9, "music-bot").bot(), None, Some(CHANNEL));

    h.send(bot.clone()).await;
    assert_eq!(h.plays(), 0);

    // Not even when the link is down
    h.send(LinkEvent::TransportDisconnected).await;
    h.send(bot).await;
    assert_eq!(h.plays(), 0);
    assert_eq!(h.joins(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_other_channel_is_ignored() {
    let mut h = ready_harness().await;

    h.send(VoiceStateChange::new(User::new(2, "member2"), None, Some(OTHER_CHANNEL)))
        .await;
    h.send(VoiceStateChange::new(User::new(2, "member2"), Some(CHANNEL), None))
        .await;
    assert_eq!(h.plays(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_join_without_link_defers_single_retry() {
    let mut h = harness(Options {
        joins: vec![Err(BotError::ChannelNotFound(CHANNEL.to_string()))],
        ..Options::default()
    });
    h.start().await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Idle);
    assert_eq!(h.joins(), 1);

    // Both arrive before the join attempt completes
    h.dispatcher.handle(joined(2).into()).await;
    h.dispatcher.handle(joined(3).into()).await;
    h.settle().await;
    assert_eq!(h.joins(), 2);
    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);
    assert_eq!(h.plays(), 0);

    h.advance(Duration::from_millis(600)).await;
    assert_eq!(h.plays(), 1);

    h.advance(Duration::from_secs(10)).await;
    assert_eq!(h.joins(), 2);
    assert_eq!(h.plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initial_join_failure_is_not_retried() {
    let mut h = harness(Options {
        joins: vec![Err(BotError::ChannelNotFound(CHANNEL.to_string()))],
        ..Options::default()
    });
    h.start().await;
    h.advance(Duration::from_secs(60)).await;

    assert_eq!(h.joins(), 1);
    assert_eq!(h.link_status(), VoiceLinkStatus::Idle);
    let health = h.reporter.snapshot().await;
    assert!(health.ready);
    assert!(health.last_error.unwrap().contains("Voice channel not found"));
}

#[tokio::test(start_paused = true)]
async fn test_resume_within_bound_keeps_link() {
    let mut h = ready_harness().await;

    h.send(LinkEvent::TransportDisconnected).await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Disconnected);

    h.advance(Duration::from_secs(2)).await;
    h.send(LinkEvent::TransportConnecting).await;
    h.send(LinkEvent::TransportReady).await;
    h.advance(Duration::from_secs(10)).await;

    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);
    assert_eq!(h.destroys(), 0);
    assert_eq!(h.joins(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missed_resume_rejoins_exactly_once() {
    let mut h = ready_harness().await;

    h.send(LinkEvent::TransportDisconnected).await;
    h.advance(Duration::from_secs(6)).await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Destroyed);
    assert_eq!(h.destroys(), 1);
    assert_eq!(h.joins(), 1);

    h.advance(Duration::from_secs(4)).await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);
    assert_eq!(h.joins(), 2);

    h.advance(Duration::from_secs(60)).await;
    assert_eq!(h.destroys(), 1);
    assert_eq!(h.joins(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_every_drop_gets_its_own_cycle() {
    let mut h = ready_harness().await;

    for cycle in 1..=3 {
        h.send(LinkEvent::TransportDisconnected).await;
        h.advance(Duration::from_secs(6)).await;
        h.advance(Duration::from_secs(4)).await;
        assert_eq!(h.destroys(), cycle);
        assert_eq!(h.joins(), cycle + 1);
        assert_eq!(h.link_status(), VoiceLinkStatus::Ready);
    }
}

#[tokio::test(start_paused = true)]
async fn test_login_fails_three_times_then_stops() {
    let network = || Login::Fail(BotError::Network("websocket closed".into()));
    let mut h = harness(Options {
        logins: vec![network(), network(), network()],
        ..Options::default()
    });
    h.start().await;
    assert_eq!(h.connects(), 1);

    h.advance(Duration::from_secs(16)).await;
    assert_eq!(h.connects(), 2);

    h.advance(Duration::from_secs(31)).await;
    assert_eq!(h.connects(), 3);

    h.advance(Duration::from_secs(600)).await;
    assert_eq!(h.connects(), 3);
    assert_eq!(h.dispatcher.session.status(), SessionStatus::Errored);

    let health = h.reporter.snapshot().await;
    assert!(!health.ready);
    assert!(health.last_error.unwrap().contains("failed"));
}

#[tokio::test(start_paused = true)]
async fn test_login_recovers_on_second_attempt() {
    let mut h = harness(Options {
        logins: vec![Login::Fail(BotError::Network("websocket closed".into()))],
        ..Options::default()
    });
    h.start().await;
    assert!(h.reporter.snapshot().await.last_error.is_some());

    h.advance(Duration::from_secs(16)).await;
    assert_eq!(h.connects(), 2);
    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);

    let health = h.reporter.snapshot().await;
    assert!(health.ready);
    assert!(health.last_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_invalid_credential_never_logs_in() {
    let mut h = harness(Options {
        token_check: TokenCheck::Always,
        lookup: Err(BotError::CredentialInvalid("identity check returned 401 Unauthorized".into())),
        ..Options::default()
    });
    h.start().await;
    h.advance(Duration::from_secs(3600)).await;

    assert_eq!(h.connects(), 0);
    assert_eq!(h.dispatcher.session.status(), SessionStatus::Errored);
    let health = h.reporter.snapshot().await;
    assert!(!health.ready);
    assert!(health.last_error.unwrap().contains("Credential check failed"));
}

#[tokio::test(start_paused = true)]
async fn test_on_failure_check_stops_retry_with_bad_credential() {
    let mut h = harness(Options {
        token_check: TokenCheck::OnFailure,
        logins: vec![Login::Fail(BotError::Network("rate limited".into()))],
        lookup: Err(BotError::CredentialInvalid("revoked".into())),
        ..Options::default()
    });
    h.start().await;
    h.advance(Duration::from_secs(16)).await;
    h.advance(Duration::from_secs(600)).await;

    assert_eq!(h.connects(), 1);
    assert_eq!(h.dispatcher.session.status(), SessionStatus::Errored);
}

#[tokio::test(start_paused = true)]
async fn test_missing_credential_reports_and_stays_down() {
    let mut h = harness(Options {
        credential: None,
        ..Options::default()
    });
    h.start().await;

    assert_eq!(h.connects(), 0);
    let health = h.reporter.snapshot().await;
    assert!(!health.ready);
    assert_eq!(health.last_error.as_deref(), Some("DISCORD_BOT_TOKEN is not set"));
}

#[tokio::test(start_paused = true)]
async fn test_playback_failure_is_isolated() {
    let mut h = ready_harness().await;
    *h.transport.play_error.lock().unwrap() = Some(BotError::Playback("welcome.wav: not found".into()));

    h.send(joined(2)).await;
    assert_eq!(h.plays(), 1);
    assert!(!h.dispatcher.gate.in_progress());
    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);
    assert_eq!(
        h.reporter.snapshot().await.last_error.as_deref(),
        Some("Playback failed: welcome.wav: not found")
    );

    // The next join is not blocked by the failed one
    *h.transport.play_error.lock().unwrap() = None;
    h.send(joined(3)).await;
    assert_eq!(h.plays(), 2);
    assert!(h.dispatcher.gate.in_progress());
}

#[tokio::test(start_paused = true)]
async fn test_task_failure_is_recorded() {
    let mut h = ready_harness().await;
    h.send(BotEvent::TaskFailed {
        task: "voice join",
        error: BotError::Unhandled("voice join panicked".into()),
    })
    .await;

    let health = h.reporter.snapshot().await;
    assert!(health.ready);
    assert_eq!(
        health.last_error.as_deref(),
        Some("voice join: Unhandled async failure: voice join panicked")
    );
}

#[tokio::test(start_paused = true)]
async fn test_crashed_playback_task_releases_gate() {
    let mut h = ready_harness().await;
    h.send(joined(2)).await;
    assert!(h.dispatcher.gate.in_progress());

    h.send(BotEvent::TaskFailed {
        task: WELCOME_SOUND,
        error: BotError::Unhandled("welcome sound panicked".into()),
    })
    .await;
    assert!(!h.dispatcher.gate.in_progress());

    h.send(joined(3)).await;
    assert_eq!(h.plays(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_crashed_join_task_returns_link_to_idle() {
    let mut h = harness(Options {
        joins: vec![Err(BotError::ChannelNotFound(CHANNEL.to_string()))],
        ..Options::default()
    });
    h.start().await;

    h.dispatcher.handle(LinkEvent::JoinRequested.into()).await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Connecting);

    h.dispatcher
        .handle(BotEvent::TaskFailed {
            task: VOICE_JOIN,
            error: BotError::Unhandled("voice join panicked".into()),
        })
        .await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Idle);

    // A late report from the crashed attempt changes nothing
    h.settle().await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_join_during_resume_window_plays_after_resume() {
    let mut h = ready_harness().await;

    h.send(LinkEvent::TransportDisconnected).await;
    h.send(joined(2)).await;
    assert_eq!(h.plays(), 0);
    assert_eq!(h.joins(), 1);

    h.send(LinkEvent::TransportReady).await;
    h.advance(Duration::from_millis(600)).await;
    assert_eq!(h.plays(), 1);
    h.send(PlaybackEvent::Finished).await;

    // A later rejoin cycle must not greet member2 again
    h.send(LinkEvent::TransportDisconnected).await;
    h.advance(Duration::from_secs(6)).await;
    h.advance(Duration::from_secs(4)).await;
    assert_eq!(h.joins(), 2);
    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);
    assert_eq!(h.plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_join_during_rejoin_cycle_is_deferred_again() {
    let mut h = ready_harness().await;

    h.send(LinkEvent::TransportDisconnected).await;
    h.send(joined(2)).await;
    h.send(LinkEvent::TransportReady).await;
    h.advance(Duration::from_millis(600)).await;
    h.send(PlaybackEvent::Finished).await;

    // Second drop is not resumed; the join waits for the rejoin
    h.send(LinkEvent::TransportDisconnected).await;
    h.send(joined(3)).await;
    h.advance(Duration::from_secs(6)).await;
    assert_eq!(h.plays(), 1);

    h.advance(Duration::from_secs(4)).await;
    assert_eq!(h.joins(), 2);
    assert_eq!(h.plays(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lost_session_rejoins_voice_on_reconnect() {
    let mut h = ready_harness().await;

    h.send(SessionEvent::Ended(BotError::Network("websocket closed".into())))
        .await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Idle);
    assert_eq!(h.destroys(), 1);
    assert!(!h.reporter.snapshot().await.ready);

    h.advance(Duration::from_secs(16)).await;
    assert_eq!(h.connects(), 2);
    assert_eq!(h.joins(), 2);
    assert_eq!(h.link_status(), VoiceLinkStatus::Ready);

    h.send(joined(2)).await;
    assert_eq!(h.plays(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_lost_session_drops_pending_rejoin() {
    let mut h = ready_harness().await;

    h.send(LinkEvent::TransportDisconnected).await;
    h.advance(Duration::from_secs(6)).await;
    assert_eq!(h.link_status(), VoiceLinkStatus::Destroyed);

    h.send(SessionEvent::Ended(BotError::Network("websocket closed".into())))
        .await;
    assert!(!h.dispatcher.timers.is_pending(TimerKey::Rejoin));

    // The rejoin delay passes without a join; the retried session brings the link back
    h.advance(Duration::from_secs(4)).await;
    assert_eq!(h.joins(), 1);
    h.advance(Duration::from_secs(12)).await;
    assert_eq!(h.joins(), 2);
    assert_eq!(h.destroys(), 1);
}
