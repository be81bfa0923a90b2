//! Configuration management

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::application::errors::ConfigError;
use crate::application::services::{LinkPolicy, PlaybackGate, SessionPolicy, TokenCheck, TokenValidator};

/// Bot configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub bot: BotConfig,
    pub discord: DiscordConfig,
    pub audio: AudioConfig,
    pub http: HttpConfig,
    pub session: SessionConfig,
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BotConfig {
    pub name: String,
    /// Shown as "Listening to ..."
    pub presence: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct DiscordConfig {
    pub token: Option<String>,
    pub voice_channel_id: u64,
    pub token_check: TokenCheck,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AudioConfig {
    pub welcome_sound: PathBuf,
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SessionConfig {
    pub max_attempts: u32,
    pub backoff_base_secs: u64,
    pub validate_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct VoiceConfig {
    pub resume_timeout_secs: u64,
    pub rejoin_delay_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "voice-greeter".to_string(),
            presence: "welcome sounds".to_string(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            welcome_sound: PathBuf::from("welcome.wav"),
            retry_delay_ms: PlaybackGate::DEFAULT_RETRY_DELAY.as_millis() as u64,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let policy = SessionPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_base_secs: policy.backoff_base.as_secs(),
            validate_timeout_secs: TokenValidator::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        let policy = LinkPolicy::default();
        Self {
            resume_timeout_secs: policy.resume_timeout.as_secs(),
            rejoin_delay_secs: policy.rejoin_delay.as_secs(),
        }
    }
}

impl Config {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::Parse(format!("Failed to read config: {}", e)))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {}", e)))
    }

    /// Overlay environment variables; `lookup` is `std::env::var` outside tests
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("DISCORD_BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.discord.token = Some(token.trim().to_string());
        }

        if let Some(id) = lookup("VOICE_CHANNEL_ID") {
            self.discord.voice_channel_id = id.trim().parse().map_err(|_| {
                ConfigError::InvalidValue(format!("VOICE_CHANNEL_ID must be a snowflake, got '{}'", id))
            })?;
        }

        if let Some(port) = lookup("PORT") {
            self.http.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(format!("PORT must be a port number, got '{}'", port)))?;
        }

        if let Some(path) = lookup("WELCOME_SOUND") {
            self.audio.welcome_sound = PathBuf::from(path);
        }

        if let Some(strategy) = lookup("TOKEN_CHECK") {
            self.discord.token_check = strategy.parse()?;
        }

        if let Some(name) = lookup("BOT_NAME") {
            self.bot.name = name;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.voice_channel_id == 0 {
            return Err(ConfigError::MissingField(
                "discord.voice-channel-id (or VOICE_CHANNEL_ID)".to_string(),
            ));
        }
        if self.session.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "session.max-attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.http.bind, self.http.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue(format!("http bind address: {}", e)))
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_secs(self.session.backoff_base_secs)
    }

    pub fn validate_timeout(&self) -> Duration {
        Duration::from_secs(self.session.validate_timeout_secs)
    }

    pub fn resume_timeout(&self) -> Duration {
        Duration::from_secs(self.voice.resume_timeout_secs)
    }

    pub fn rejoin_delay(&self) -> Duration {
        Duration::from_secs(self.voice.rejoin_delay_secs)
    }

    pub fn playback_retry(&self) -> Duration {
        Duration::from_millis(self.audio.retry_delay_ms)
    }
}
