//! Cancellable timers and supervised tasks
//!
//! Both deliver their outcome as an event into the dispatcher loop, so timeout-driven
//! transitions can be tested under a paused tokio clock.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::events::{BotEvent, EventSink};
use crate::application::errors::BotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    SessionRetry,
    ResumeWait,
    Rejoin,
    PlaybackRetry,
}

/// One pending timer per key; rescheduling replaces the previous one
pub struct Timers {
    sink: EventSink,
    pending: HashMap<TimerKey, JoinHandle<()>>,
}

impl Timers {
    pub fn new(sink: EventSink) -> Self {
        Self {
            sink,
            pending: HashMap::new(),
        }
    }

    pub fn schedule(&mut self, key: TimerKey, after: Duration, event: BotEvent) {
        let sink = self.sink.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            sink.emit(event);
        });
        if let Some(previous) = self.pending.insert(key, handle) {
            previous.abort();
        }
    }

    pub fn cancel(&mut self, key: TimerKey) {
        if let Some(handle) = self.pending.remove(&key) {
            handle.abort();
        }
    }

    pub fn is_pending(&self, key: TimerKey) -> bool {
        self.pending.get(&key).is_some_and(|h| !h.is_finished())
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.pending.drain() {
            handle.abort();
        }
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Run `work` in the background. Its follow-up event, an error, or a panic all come back
/// through the sink; nothing escapes to take the process down.
pub fn spawn_supervised<F>(sink: &EventSink, task: &'static str, work: F)
where
    F: Future<Output = Result<Option<BotEvent>, BotError>> + Send + 'static,
{
    let sink = sink.clone();
    let inner = tokio::spawn(work);
    tokio::spawn(async move {
        match inner.await {
            Ok(Ok(Some(event))) => sink.emit(event),
            Ok(Ok(None)) => {}
            Ok(Err(error)) => sink.emit(BotEvent::TaskFailed { task, error }),
            Err(join_error) => {
                let error = if join_error.is_panic() {
                    BotError::Unhandled(format!("{} panicked", task))
                } else {
                    BotError::Unhandled(format!("{} was cancelled", task))
                };
                sink.emit(BotEvent::TaskFailed { task, error });
            }
        }
    });
}
