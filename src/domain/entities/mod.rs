//! Domain entities - Process-lifetime state, never persisted

pub mod health;
pub mod identity;
pub mod playback;
pub mod session;
pub mod user;
pub mod voice_link;
pub mod voice_state;

pub use health::{HealthSnapshot, HealthStatus};
pub use identity::BotIdentity;
pub use playback::PlaybackState;
pub use session::{BotSession, SessionStatus};
pub use user::User;
pub use voice_link::{VoiceLink, VoiceLinkStatus};
pub use voice_state::VoiceStateChange;
