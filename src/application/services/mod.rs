//! Application services - Connection-resilience state machines

pub mod playback_gate;
pub mod session_connector;
pub mod status_reporter;
pub mod token_validator;
pub mod voice_link_manager;

pub use playback_gate::{PlaybackAction, PlaybackGate};
pub use session_connector::{SessionAction, SessionConnector, SessionEvent, SessionPolicy};
pub use status_reporter::{StatusChange, StatusReporter};
pub use token_validator::{TokenCheck, TokenValidator};
pub use voice_link_manager::{LinkAction, LinkEvent, LinkPolicy, VoiceLinkManager};
