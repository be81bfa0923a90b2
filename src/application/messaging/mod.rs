//! Messaging - Event-driven control loop

pub mod dispatcher;
pub mod events;
pub mod parser;
pub mod scheduler;

pub use dispatcher::{Collaborators, Dispatcher, DispatcherSettings};
pub use events::{EventSink, PlaybackEvent};
