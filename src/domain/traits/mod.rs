//! Domain traits - Abstractions for infrastructure implementations

pub mod bot;
pub mod identity;
pub mod voice;

pub use bot::Gateway;
pub use identity::IdentityLookup;
pub use voice::VoiceTransport;
