//! Welcome clip probing
//!
//! The clip is opened and its container header read before each playback, so a missing or
//! unreadable file surfaces as a playback error instead of a silent track.

use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::errors::BotError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipInfo {
    pub path: PathBuf,
    pub sample_rate: Option<u32>,
    pub channels: Option<usize>,
}

impl fmt::Display for ClipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())?;
        match (self.sample_rate, self.channels) {
            (Some(rate), Some(channels)) => write!(f, " ({} Hz, {} ch)", rate, channels),
            (Some(rate), None) => write!(f, " ({} Hz)", rate),
            _ => Ok(()),
        }
    }
}

pub async fn probe(path: &Path) -> Result<ClipInfo, BotError> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || probe_file(&path))
        .await
        .map_err(|e| BotError::Playback(format!("clip probe aborted: {}", e)))?
}

fn probe_file(path: &Path) -> Result<ClipInfo, BotError> {
    let file = File::open(path).map_err(|e| BotError::Playback(format!("{}: {}", path.display(), e)))?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| BotError::Playback(format!("{}: unsupported audio: {}", path.display(), e)))?;

    let track = probed
        .format
        .default_track()
        .ok_or_else(|| BotError::Playback(format!("{}: no audio track", path.display())))?;

    Ok(ClipInfo {
        path: path.to_path_buf(),
        sample_rate: track.codec_params.sample_rate,
        channels: track.codec_params.channels.map(|c| c.count()),
    })
}
