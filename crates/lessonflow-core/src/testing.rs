//! Deterministic media element for unit tests.

use crate::media::{MediaClock, MediaElement, MediaError, MediaSource};

#[derive(Debug, Clone)]
pub struct FakeMedia {
    pub time: f64,
    pub duration: Option<f64>,
    pub rate: f64,
    pub paused: bool,
    pub volume: f32,
    pub muted: bool,
    /// Added to every seek target to simulate a server ignoring ranges.
    pub seek_offset: f64,
    pub seek_error: Option<MediaError>,
    pub play_error: Option<String>,
    pub seeks: Vec<f64>,
    pub plays: usize,
    pub pauses: usize,
    pub loads: Vec<String>,
}

impl FakeMedia {
    pub fn new(duration: f64) -> Self {
        Self {
            time: 0.0,
            duration: Some(duration),
            rate: 1.0,
            paused: true,
            volume: 1.0,
            muted: false,
            seek_offset: 0.0,
            seek_error: None,
            play_error: None,
            seeks: Vec::new(),
            plays: 0,
            pauses: 0,
            loads: Vec::new(),
        }
    }
}

impl MediaClock for FakeMedia {
    fn current_time(&self) -> f64 {
        self.time
    }

    fn duration(&self) -> Option<f64> {
        self.duration
    }

    fn playback_rate(&self) -> f64 {
        self.rate
    }

    fn is_paused(&self) -> bool {
        self.paused
    }
}

impl MediaElement for FakeMedia {
    fn seek(&mut self, seconds: f64) -> Result<(), MediaError> {
        if let Some(err) = self.seek_error.clone() {
            return Err(err);
        }
        self.seeks.push(seconds);
        self.time = (seconds + self.seek_offset).max(0.0);
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        self.plays += 1;
        if let Some(reason) = &self.play_error {
            return Err(MediaError::PlayRejected(reason.clone()));
        }
        self.paused = false;
        Ok(())
    }

    fn pause(&mut self) {
        self.pauses += 1;
        self.paused = true;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn volume(&self) -> f32 {
        self.volume
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
    }

    fn is_muted(&self) -> bool {
        self.muted
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn load(&mut self, source: MediaSource) -> Result<(), MediaError> {
        self.loads.push(source.origin().to_string());
        self.time = 0.0;
        self.rate = 1.0;
        self.paused = true;
        if source.is_buffered() {
            self.seek_offset = 0.0;
        }
        Ok(())
    }
}
