//! Credential check against the Discord REST API

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::application::errors::BotError;
use crate::domain::entities::BotIdentity;
use crate::domain::traits::IdentityLookup;

/// Discord API base URL
const API_BASE: &str = "https://discord.com/api/v10";

/// Asks `GET /users/@me` who the credential belongs to
pub struct RestIdentityLookup {
    client: Client,
    base: String,
}

impl RestIdentityLookup {
    pub fn new() -> Self {
        Self::with_base(API_BASE)
    }

    pub fn with_base(base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base: base.into(),
        }
    }
}

impl Default for RestIdentityLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct CurrentUser {
    id: String,
    username: String,
    discriminator: Option<String>,
}

impl CurrentUser {
    /// Legacy `name#1234` tags, plain names for migrated accounts
    fn tag(&self) -> String {
        match self.discriminator.as_deref() {
            Some(d) if d != "0" => format!("{}#{}", self.username, d),
            _ => self.username.clone(),
        }
    }
}

#[async_trait]
impl IdentityLookup for RestIdentityLookup {
    async fn lookup(&self, credential: &str) -> Result<BotIdentity, BotError> {
        let url = format!("{}/users/@me", self.base);
        let response = self
            .client
            .get(&url)
            .header(AUTHORIZATION, format!("Bot {}", credential))
            .send()
            .await
            .map_err(|e| BotError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(BotError::CredentialInvalid(format!(
                "identity check returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(BotError::Network(format!("Discord API error: {}", status)));
        }

        let user: CurrentUser = response
            .json()
            .await
            .map_err(|e| BotError::Network(format!("unreadable identity response: {}", e)))?;

        let id = user
            .id
            .parse()
            .map_err(|_| BotError::Network(format!("invalid user id '{}'", user.id)))?;

        Ok(BotIdentity::new(id, user.tag()))
    }
}
