//! Voice transport over songbird

use async_trait::async_trait;
use serenity::cache::Cache;
use serenity::http::HttpError;
use serenity::model::channel::{Channel, ChannelType, GuildChannel};
use serenity::model::id::{ChannelId, GuildId};
use serenity::Error as SerenityError;
use songbird::error::JoinError;
use songbird::events::{CoreEvent, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent};
use songbird::tracks::PlayMode;
use std::path::Path;
use tokio::sync::RwLock;

use super::{clip, LiveSession, SessionHandles};
use crate::application::errors::BotError;
use crate::application::messaging::{EventSink, PlaybackEvent};
use crate::application::services::LinkEvent;
use crate::domain::traits::VoiceTransport;

pub struct SongbirdTransport {
    sink: EventSink,
    handles: SessionHandles,
    /// Guild of the channel last joined
    guild: RwLock<Option<GuildId>>,
}

impl SongbirdTransport {
    pub fn new(sink: EventSink, handles: SessionHandles) -> Self {
        Self {
            sink,
            handles,
            guild: RwLock::new(None),
        }
    }

    async fn session(&self) -> Result<LiveSession, BotError> {
        self.handles
            .current()
            .await
            .ok_or_else(|| BotError::Network("gateway session is not connected".to_string()))
    }
}

#[async_trait]
impl VoiceTransport for SongbirdTransport {
    async fn join(&self, channel_id: u64) -> Result<(), BotError> {
        let session = self.session().await?;
        let channel = resolve_channel(&session, channel_id).await?;
        *self.guild.write().await = Some(channel.guild_id);

        let call = session
            .songbird
            .join(channel.guild_id, channel.id)
            .await
            .map_err(|e| BotError::Network(format!("voice join failed: {}", e)))?;

        let mut call = call.lock().await;
        call.remove_all_global_events();
        for (event, link_event) in [
            (CoreEvent::DriverConnect, LinkEvent::TransportReady),
            (CoreEvent::DriverReconnect, LinkEvent::TransportReady),
            (CoreEvent::DriverDisconnect, LinkEvent::TransportDisconnected),
        ] {
            call.add_global_event(
                Event::Core(event),
                LinkNotifier {
                    sink: self.sink.clone(),
                    event: link_event,
                },
            );
        }

        if let Err(e) = call.deafen(false).await {
            tracing::warn!("Could not undeafen in {}: {}", channel.name, e);
        }

        tracing::info!("Voice connection ready in #{}", channel.name);
        Ok(())
    }

    async fn destroy(&self) -> Result<(), BotError> {
        let Some(session) = self.handles.current().await else {
            return Ok(());
        };
        let Some(guild_id) = *self.guild.read().await else {
            return Ok(());
        };

        match session.songbird.remove(guild_id).await {
            Ok(()) | Err(JoinError::NoCall) => Ok(()),
            Err(e) => Err(BotError::Network(format!("voice teardown failed: {}", e))),
        }
    }

    async fn play(&self, path: &Path) -> Result<(), BotError> {
        let session = self.session().await?;
        let guild_id = (*self.guild.read().await)
            .ok_or_else(|| BotError::Playback("no voice channel joined".to_string()))?;

        let info = clip::probe(path).await?;
        tracing::debug!("Streaming {}", info);

        let call = session
            .songbird
            .get(guild_id)
            .ok_or_else(|| BotError::Playback("no active voice call".to_string()))?;
        let mut call = call.lock().await;

        let track = call.play_input(songbird::input::File::new(path.to_path_buf()).into());
        for event in [TrackEvent::End, TrackEvent::Error] {
            track
                .add_event(
                    Event::Track(event),
                    TrackNotifier {
                        sink: self.sink.clone(),
                    },
                )
                .map_err(|e| BotError::Playback(e.to_string()))?;
        }
        Ok(())
    }
}

async fn resolve_channel(session: &LiveSession, channel_id: u64) -> Result<GuildChannel, BotError> {
    let id = ChannelId::new(channel_id);
    let channel = match session.http.get_channel(id).await {
        Ok(Channel::Guild(channel)) => Some(channel),
        Ok(_) => None,
        Err(SerenityError::Http(HttpError::UnsuccessfulRequest(response)))
            if matches!(response.status_code.as_u16(), 403 | 404) =>
        {
            None
        }
        Err(e) => return Err(BotError::Network(format!("channel lookup failed: {}", e))),
    };

    match channel {
        Some(channel) if is_voice(channel.kind) => Ok(channel),
        Some(channel) => {
            tracing::error!("Channel #{} ({}) is not a voice channel", channel.name, channel.id);
            log_voice_channels(&session.cache);
            Err(BotError::ChannelNotFound(format!("{} is not a voice channel", channel_id)))
        }
        None => {
            log_voice_channels(&session.cache);
            Err(BotError::ChannelNotFound(channel_id.to_string()))
        }
    }
}

fn is_voice(kind: ChannelType) -> bool {
    matches!(kind, ChannelType::Voice | ChannelType::Stage)
}

/// Help the operator pick a valid channel id
fn log_voice_channels(cache: &Cache) {
    tracing::info!("Available voice channels:");
    for guild_id in cache.guilds() {
        let Some(guild) = cache.guild(guild_id) else {
            continue;
        };
        for channel in guild.channels.values().filter(|c| is_voice(c.kind)) {
            tracing::info!("  {} / #{} ({})", guild.name, channel.name, channel.id);
        }
    }
}

struct LinkNotifier {
    sink: EventSink,
    event: LinkEvent,
}

#[async_trait]
impl VoiceEventHandler for LinkNotifier {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<Event> {
        self.sink.emit(self.event.clone());
        None
    }
}

struct TrackNotifier {
    sink: EventSink,
}

#[async_trait]
impl VoiceEventHandler for TrackNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let EventContext::Track(tracks) = ctx else {
            return None;
        };

        let failure = tracks.iter().find_map(|(state, _)| match &state.playing {
            PlayMode::Errored(e) => Some(format!("{:?}", e)),
            _ => None,
        });

        let event = match failure {
            Some(reason) => PlaybackEvent::Failed(BotError::Playback(reason)),
            None => PlaybackEvent::Finished,
        };
        self.sink.emit(event);
        None
    }
}
