//! Application layer - Use cases and business logic
//! 
//! This layer contains:
//! - Services: Session, voice link and playback state machines
//! - Errors: Domain-specific errors
//! - Messaging: Event types, voice state parsing, timers and the dispatcher loop

pub mod errors;
pub mod services;
pub mod messaging;
