//! Domain layer - Core bot state with no external dependencies
//!
//! This layer contains:
//! - Entities: Session, voice link, playback and health state
//! - Traits: Abstractions for the gateway, voice transport and identity check

pub mod entities;
pub mod traits;
