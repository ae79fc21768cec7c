//! Ordered sentence records for one lesson.
//!
//! Records keep the order of the timed-text file. `end` is derived from the
//! following record's start when the file does not carry it; the last record
//! stays open until the media reports its duration, which is applied at most
//! once through [`Transcript::bind_media_duration`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Playback length assumed for a record whose end is unknown.
pub const FALLBACK_MIN_DURATION: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceRecord {
    pub start: f64,
    /// `0.0` while unset.
    pub end: f64,
    pub text: String,
    pub translation: String,
}

impl SentenceRecord {
    pub fn new(start: f64, text: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            start,
            end: 0.0,
            text: text.into(),
            translation: translation.into(),
        }
    }

    pub fn has_authoritative_end(&self) -> bool {
        self.end > self.start
    }

    pub fn has_translation(&self) -> bool {
        !self.translation.trim().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptMeta {
    pub album: String,
    pub artist: String,
    pub title: String,
    pub author: String,
}

#[derive(Debug, Clone, Default)]
pub struct Transcript {
    meta: TranscriptMeta,
    sentences: Vec<SentenceRecord>,
    duration_bound: bool,
}

impl Transcript {
    pub fn new(meta: TranscriptMeta, mut sentences: Vec<SentenceRecord>) -> Self {
        for idx in 1..sentences.len() {
            if sentences[idx].start < sentences[idx - 1].start {
                warn!(
                    index = idx,
                    start = sentences[idx].start,
                    previous = sentences[idx - 1].start,
                    "Transcript start times go backwards"
                );
            }
        }
        let count = sentences.len();
        for idx in 0..count {
            if sentences[idx].end > 0.0 {
                continue;
            }
            sentences[idx].end = if idx + 1 < count {
                sentences[idx + 1].start
            } else {
                0.0
            };
        }
        Self {
            meta,
            sentences,
            duration_bound: false,
        }
    }

    pub fn meta(&self) -> &TranscriptMeta {
        &self.meta
    }

    pub fn sentences(&self) -> &[SentenceRecord] {
        &self.sentences
    }

    pub fn get(&self, index: usize) -> Option<&SentenceRecord> {
        self.sentences.get(index)
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.sentences.len().checked_sub(1)
    }

    pub fn next_start(&self, index: usize) -> Option<f64> {
        self.sentences.get(index + 1).map(|next| next.start)
    }

    /// End used for gapless playback: the derived end when it is meaningful,
    /// otherwise a short fallback past the start.
    pub fn effective_end(&self, index: usize) -> Option<f64> {
        let record = self.sentences.get(index)?;
        if record.has_authoritative_end() {
            Some(record.end)
        } else {
            Some((record.start + FALLBACK_MIN_DURATION).max(0.0))
        }
    }

    pub fn is_duration_bound(&self) -> bool {
        self.duration_bound
    }

    /// Late-bound correction of the last record once the media duration is
    /// known. Returns true when the last end actually changed.
    pub fn bind_media_duration(&mut self, duration: f64) -> bool {
        if self.duration_bound || !duration.is_finite() || duration <= 0.0 {
            return false;
        }
        let Some(last) = self.sentences.last_mut() else {
            return false;
        };
        self.duration_bound = true;
        if !last.has_authoritative_end() || last.end > duration {
            debug!(previous = last.end, duration, "Binding last sentence end to media duration");
            last.end = duration;
            return true;
        }
        false
    }
}
