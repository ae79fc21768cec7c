//! Desktop [`MediaElement`] on top of `rodio`.
//!
//! rodio has no notion of a playhead, so position is tracked against the wall
//! clock and re-anchored on every play, pause, seek and rate change. Seeking
//! rebuilds the sink from a fresh decoder positioned at the target.

use lessonflow_core::{MediaClock, MediaElement, MediaError, MediaEvent, MediaSource};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

trait MediaReader: Read + Seek + Send + Sync {}

impl<T: Read + Seek + Send + Sync> MediaReader for T {}

type MediaDecoder = Decoder<Box<dyn MediaReader>>;

/// Seconds before the known end at which `play` starts over from zero.
const RESTART_MARGIN: f64 = 0.05;

/// A [`MediaElement`] that raises its own events, polled by the runtime.
pub trait HostMedia: MediaElement {
    /// Events raised since the last call, oldest first.
    fn drain_events(&mut self) -> Vec<MediaEvent>;
    /// Periodic check standing in for the element's own progress events.
    fn poll(&mut self);
}

pub struct RodioMedia {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    source: Option<MediaSource>,
    duration: Option<f64>,
    playhead: Playhead,
    volume: f32,
    muted: bool,
    events: VecDeque<MediaEvent>,
}

impl RodioMedia {
    pub fn open_default() -> anyhow::Result<Self> {
        use anyhow::Context;
        let (stream, handle) = OutputStream::try_default().context("Opening audio output")?;
        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            source: None,
            duration: None,
            playhead: Playhead::default(),
            volume: 1.0,
            muted: false,
            events: VecDeque::new(),
        })
    }

    fn output_volume(&self) -> f32 {
        if self.muted { 0.0 } else { self.volume }
    }

    fn rebuild(&mut self, at: f64) -> Result<(), MediaError> {
        let source = self.source.as_ref().ok_or(MediaError::NoSource)?;
        let sink = Sink::try_new(&self.handle)
            .map_err(|err| MediaError::PlayRejected(err.to_string()))?;
        sink.pause();
        sink.set_speed(self.playhead.rate as f32);
        sink.set_volume(self.output_volume());
        if at > 0.0 {
            let position = Duration::from_secs_f64(at);
            let mut decoder = open_decoder(source)?;
            match decoder.try_seek(position) {
                Ok(()) => sink.append(decoder),
                Err(err) => {
                    debug!(at, "Decoder cannot seek ({err}); skipping forward instead");
                    sink.append(open_decoder(source)?.skip_duration(position));
                }
            }
        } else {
            sink.append(open_decoder(source)?);
        }
        if let Some(previous) = self.sink.replace(sink) {
            previous.stop();
        }
        Ok(())
    }

    fn clamp_to_duration(&self, seconds: f64) -> f64 {
        let seconds = seconds.max(0.0);
        match self.duration {
            Some(duration) => seconds.min(duration),
            None => seconds,
        }
    }
}

impl HostMedia for RodioMedia {
    fn drain_events(&mut self) -> Vec<MediaEvent> {
        self.events.drain(..).collect()
    }

    fn poll(&mut self) {
        if !self.playhead.is_running() {
            return;
        }
        let drained = self.sink.as_ref().map(Sink::empty).unwrap_or(true);
        if drained {
            let now = Instant::now();
            self.playhead.stop(now);
            if let Some(duration) = self.duration {
                self.playhead.jump(duration, now);
            }
            debug!(position = self.playhead.position, "Playback reached end of track");
            self.events.push_back(MediaEvent::Ended);
        } else {
            self.events.push_back(MediaEvent::TimeUpdate);
        }
    }
}

impl MediaClock for RodioMedia {
    fn current_time(&self) -> f64 {
        self.clamp_to_duration(self.playhead.at(Instant::now()))
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn playback_rate(&self) -> f64 {
        self.playhead.rate
    }

    fn is_paused(&self) -> bool {
        !self.playhead.is_running()
    }
}

impl MediaElement for RodioMedia {
    fn seek(&mut self, seconds: f64) -> Result<(), MediaError> {
        if !seconds.is_finite() {
            return Err(MediaError::SeekUnsupported);
        }
        let target = self.clamp_to_duration(seconds);
        self.rebuild(target)?;
        let now = Instant::now();
        if self.playhead.is_running() {
            if let Some(sink) = &self.sink {
                sink.play();
            }
        }
        self.playhead.jump(target, now);
        self.events.push_back(MediaEvent::Seeked);
        self.events.push_back(MediaEvent::CanPlay);
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.source.is_none() {
            return Err(MediaError::NoSource);
        }
        if self.playhead.is_running() {
            return Ok(());
        }
        let now = Instant::now();
        let mut at = self.playhead.position;
        if self.duration.is_some_and(|duration| at >= duration - RESTART_MARGIN) {
            at = 0.0;
            self.playhead.jump(at, now);
        }
        let drained = self.sink.as_ref().map(Sink::empty).unwrap_or(true);
        if drained {
            self.rebuild(at)?;
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        self.playhead.start(now);
        self.events.push_back(MediaEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        if !self.playhead.is_running() {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.playhead.stop(Instant::now());
        self.events.push_back(MediaEvent::Paused);
    }

    fn set_playback_rate(&mut self, rate: f64) {
        if !rate.is_finite() || rate <= 0.0 || (rate - self.playhead.rate).abs() < f64::EPSILON {
            return;
        }
        self.playhead.set_rate(rate, Instant::now());
        if let Some(sink) = &self.sink {
            sink.set_speed(rate as f32);
        }
        self.events.push_back(MediaEvent::RateChanged);
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        let output = self.output_volume();
        if let Some(sink) = &self.sink {
            sink.set_volume(output);
        }
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        let output = self.output_volume();
        if let Some(sink) = &self.sink {
            sink.set_volume(output);
        }
    }

    fn load(&mut self, source: MediaSource) -> Result<(), MediaError> {
        let duration = open_decoder(&source)?
            .total_duration()
            .map(|duration| duration.as_secs_f64());
        info!(
            origin = source.origin(),
            buffered = source.is_buffered(),
            duration = ?duration,
            "Loading media source"
        );
        if let Some(previous) = self.sink.take() {
            previous.stop();
        }
        self.source = Some(source);
        self.duration = duration;
        self.playhead = Playhead {
            rate: self.playhead.rate,
            ..Playhead::default()
        };
        if let Err(err) = self.rebuild(0.0) {
            warn!("Failed to prepare decoder: {err}");
            self.source = None;
            return Err(err);
        }
        self.events.push_back(MediaEvent::MetadataLoaded);
        self.events.push_back(MediaEvent::CanPlay);
        Ok(())
    }
}

fn open_decoder(source: &MediaSource) -> Result<MediaDecoder, MediaError> {
    let origin = source.origin().to_string();
    let reader: Box<dyn MediaReader> = match source {
        MediaSource::Buffered { bytes, .. } => Box::new(Cursor::new(bytes.clone())),
        MediaSource::Stream { origin } => {
            if is_remote(origin) {
                return Err(MediaError::Open {
                    origin: origin.clone(),
                    reason: "remote audio has to be buffered before playback".to_string(),
                });
            }
            let file = File::open(origin).map_err(|err| MediaError::Open {
                origin: origin.clone(),
                reason: err.to_string(),
            })?;
            Box::new(BufReader::new(file))
        }
    };
    Decoder::new(reader).map_err(|err| MediaError::Open {
        origin,
        reason: err.to_string(),
    })
}

pub fn is_remote(origin: &str) -> bool {
    origin.starts_with("http://") || origin.starts_with("https://")
}

/// Wall-clock playhead: `position` as of `started`, advancing at `rate`.
#[derive(Debug, Clone, PartialEq)]
struct Playhead {
    position: f64,
    started: Option<Instant>,
    rate: f64,
}

impl Default for Playhead {
    fn default() -> Self {
        Self {
            position: 0.0,
            started: None,
            rate: 1.0,
        }
    }
}

impl Playhead {
    fn is_running(&self) -> bool {
        self.started.is_some()
    }

    fn at(&self, now: Instant) -> f64 {
        match self.started {
            Some(started) => {
                self.position + now.saturating_duration_since(started).as_secs_f64() * self.rate
            }
            None => self.position,
        }
    }

    fn start(&mut self, now: Instant) {
        if self.started.is_none() {
            self.started = Some(now);
        }
    }

    fn stop(&mut self, now: Instant) {
        self.position = self.at(now);
        self.started = None;
    }

    fn jump(&mut self, position: f64, now: Instant) {
        self.position = position;
        if self.started.is_some() {
            self.started = Some(now);
        }
    }

    fn set_rate(&mut self, rate: f64, now: Instant) {
        self.position = self.at(now);
        if self.started.is_some() {
            self.started = Some(now);
        }
        self.rate = rate;
    }
}
