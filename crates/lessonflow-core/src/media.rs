//! The media playback primitive the engine drives.
//!
//! Mutations are fire-and-forget: completion arrives later as a
//! [`MediaEvent`] fed back into the engine by the host.

use std::sync::Arc;

#[derive(Debug, Clone, thiserror::Error)]
pub enum MediaError {
    #[error("no media source is loaded")]
    NoSource,
    #[error("the current source cannot seek")]
    SeekUnsupported,
    #[error("playback was rejected: {0}")]
    PlayRejected(String),
    #[error("failed to open {origin}: {reason}")]
    Open { origin: String, reason: String },
}

/// Read-only view of the media clock.
pub trait MediaClock {
    fn current_time(&self) -> f64;
    fn duration(&self) -> Option<f64>;
    fn playback_rate(&self) -> f64;
    fn is_paused(&self) -> bool;
}

pub trait MediaElement: MediaClock {
    /// Starts a seek; a [`MediaEvent::Seeked`] reports completion.
    fn seek(&mut self, seconds: f64) -> Result<(), MediaError>;
    fn play(&mut self) -> Result<(), MediaError>;
    fn pause(&mut self);
    fn set_playback_rate(&mut self, rate: f64);
    fn volume(&self) -> f32;
    fn set_volume(&mut self, volume: f32);
    fn is_muted(&self) -> bool;
    fn set_muted(&mut self, muted: bool);
    /// Replaces the source; a [`MediaEvent::MetadataLoaded`] follows.
    fn load(&mut self, source: MediaSource) -> Result<(), MediaError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaEvent {
    MetadataLoaded,
    TimeUpdate,
    Seeked,
    CanPlay,
    Playing,
    Paused,
    Ended,
    RateChanged,
}

#[derive(Debug, Clone)]
pub enum MediaSource {
    /// Addressed directly (file path or URL); seeking depends on the origin.
    Stream { origin: String },
    /// Entire resource held in memory, always seekable.
    Buffered { origin: String, bytes: Arc<[u8]> },
}

impl MediaSource {
    pub fn stream(origin: impl Into<String>) -> Self {
        MediaSource::Stream {
            origin: origin.into(),
        }
    }

    pub fn origin(&self) -> &str {
        match self {
            MediaSource::Stream { origin } | MediaSource::Buffered { origin, .. } => origin,
        }
    }

    pub fn is_buffered(&self) -> bool {
        matches!(self, MediaSource::Buffered { .. })
    }
}
