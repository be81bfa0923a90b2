//! Gateway session over serenity

use async_trait::async_trait;
use serenity::all::{
    ActivityData, Client, Context, EventHandler, GatewayIntents, OnlineStatus, Ready, VoiceServerUpdateEvent,
    VoiceState,
};
use serenity::gateway::GatewayError;
use serenity::http::HttpError;
use serenity::Error as SerenityError;
use songbird::Songbird;

use super::{LiveSession, SessionHandles};
use crate::application::errors::BotError;
use crate::application::messaging::EventSink;
use crate::application::services::{LinkEvent, SessionEvent};
use crate::domain::entities::{BotIdentity, User, VoiceStateChange};
use crate::domain::traits::Gateway;

/// Guild structure, voice states and member names
fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES | GatewayIntents::GUILD_MEMBERS
}

pub struct DiscordGateway {
    sink: EventSink,
    handles: SessionHandles,
}

impl DiscordGateway {
    pub fn new(sink: EventSink, handles: SessionHandles) -> Self {
        Self { sink, handles }
    }
}

#[async_trait]
impl Gateway for DiscordGateway {
    async fn connect(&self, credential: &str) -> Result<(), BotError> {
        let songbird = Songbird::serenity();
        let handler = Handler {
            sink: self.sink.clone(),
            handles: self.handles.clone(),
        };

        let mut client = Client::builder(credential, intents())
            .event_handler(handler)
            .voice_manager_arc(songbird.clone())
            .await
            .map_err(map_serenity_error)?;

        self.handles
            .install(LiveSession {
                http: client.http.clone(),
                cache: client.cache.clone(),
                songbird,
                shard: None,
            })
            .await;

        let result = client.start().await;

        self.handles.clear().await;
        client.shard_manager.shutdown_all().await;

        result.map_err(map_serenity_error)
    }

    async fn set_presence(&self, activity: &str) -> Result<(), BotError> {
        let shard = self
            .handles
            .current()
            .await
            .and_then(|session| session.shard)
            .ok_or_else(|| BotError::Network("no gateway shard is connected".to_string()))?;

        shard.set_presence(Some(ActivityData::listening(activity)), OnlineStatus::Online);
        Ok(())
    }
}

struct Handler {
    sink: EventSink,
    handles: SessionHandles,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!(
            "Gateway ready as {} in {} guild(s)",
            ready.user.tag(),
            ready.guilds.len()
        );
        self.handles.set_shard(ctx.shard.clone()).await;
        self.sink.emit(SessionEvent::Ready(BotIdentity::new(
            ready.user.id.get(),
            ready.user.tag(),
        )));
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Our own state belongs to songbird
        if new.user_id == ctx.cache.current_user().id {
            return;
        }

        let user = match &new.member {
            Some(member) => member_user(member.user.id.get(), member.display_name(), member.user.bot),
            None => match new.user_id.to_user(&ctx).await {
                Ok(user) => {
                    let name = user.global_name.clone().unwrap_or_else(|| user.name.clone());
                    member_user(user.id.get(), &name, user.bot)
                }
                Err(e) => {
                    tracing::warn!("Could not resolve user {}: {}", new.user_id, e);
                    return;
                }
            },
        };

        let change = VoiceStateChange::new(
            user,
            old.and_then(|state| state.channel_id).map(|id| id.get()),
            new.channel_id.map(|id| id.get()),
        );
        self.sink.emit(change);
    }

    /// The bot holds a single voice connection, so any server update is about it
    async fn voice_server_update(&self, _ctx: Context, event: VoiceServerUpdateEvent) {
        tracing::debug!("Voice server update for guild {:?}", event.guild_id);
        self.sink.emit(LinkEvent::TransportConnecting);
    }
}

fn member_user(id: u64, name: &str, is_bot: bool) -> User {
    let user = User::new(id, name);
    if is_bot {
        user.bot()
    } else {
        user
    }
}

/// Rejected credentials and intents end the session for good; the rest may be retried
fn map_serenity_error(error: SerenityError) -> BotError {
    match &error {
        SerenityError::Gateway(
            GatewayError::InvalidAuthentication
            | GatewayError::DisallowedGatewayIntents
            | GatewayError::InvalidGatewayIntents,
        ) => BotError::AuthFailure(error.to_string()),
        SerenityError::Http(HttpError::UnsuccessfulRequest(response))
            if response.status_code.as_u16() == 401 =>
        {
            BotError::AuthFailure(error.to_string())
        }
        _ => BotError::Network(error.to_string()),
    }
}
