//! Infrastructure layer - External concerns
//! 
//! This layer contains:
//! - Config: Configuration loading
//! - Adapters: Discord gateway, voice transport and REST identity checks
//! - Http: Status and health endpoints

pub mod config;
pub mod adapters;
pub mod http;
