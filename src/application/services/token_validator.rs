use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::application::errors::{BotError, ConfigError};
use crate::domain::entities::BotIdentity;
use crate::domain::traits::IdentityLookup;

/// When to verify the credential over REST before a gateway login
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenCheck {
    /// Before every connection attempt
    Always,
    /// Only before a retry that follows a failed login
    #[default]
    OnFailure,
    /// Rely on the gateway login alone
    Never,
}

impl FromStr for TokenCheck {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(TokenCheck::Always),
            "on-failure" | "on_failure" => Ok(TokenCheck::OnFailure),
            "never" => Ok(TokenCheck::Never),
            other => Err(ConfigError::InvalidValue(format!("token check strategy: {}", other))),
        }
    }
}

impl fmt::Display for TokenCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenCheck::Always => "always",
            TokenCheck::OnFailure => "on-failure",
            TokenCheck::Never => "never",
        };
        write!(f, "{}", name)
    }
}

/// Fail-fast credential check
#[derive(Clone)]
pub struct TokenValidator {
    lookup: Arc<dyn IdentityLookup>,
    timeout: Duration,
}

impl TokenValidator {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(lookup: Arc<dyn IdentityLookup>, timeout: Duration) -> Self {
        Self { lookup, timeout }
    }

    /// Any failure, including a timeout, is reported as `CredentialInvalid`
    pub async fn validate(&self, credential: &str) -> Result<BotIdentity, BotError> {
        if credential.trim().is_empty() {
            return Err(BotError::CredentialInvalid("credential is empty".to_string()));
        }

        match tokio::time::timeout(self.timeout, self.lookup.lookup(credential)).await {
            Ok(Ok(identity)) => {
                tracing::info!("Credential belongs to {}", identity);
                Ok(identity)
            }
            Ok(Err(BotError::CredentialInvalid(reason))) => Err(BotError::CredentialInvalid(reason)),
            Ok(Err(e)) => Err(BotError::CredentialInvalid(e.to_string())),
            Err(_) => Err(BotError::CredentialInvalid(format!(
                "identity check timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}
