//! Reading modes, after-end policies and the rules that combine them.

use crate::boundary::SegmentShape;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ts_rs::TS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum ReadMode {
    /// Free-running playback; the highlight follows the media clock.
    #[default]
    Continuous,
    /// One sentence per request, pausing at its end.
    Single,
    /// Text hidden until revealed; segment-aware like the others.
    Listen,
}

impl ReadMode {
    pub const ALL: [ReadMode; 3] = [ReadMode::Continuous, ReadMode::Single, ReadMode::Listen];

    pub fn allows(self, after: AfterEnd) -> bool {
        match (self, after) {
            (_, AfterEnd::None) => true,
            (ReadMode::Continuous, AfterEnd::RepeatOne) => false,
            (ReadMode::Single, AfterEnd::RepeatAll | AfterEnd::AdvanceNext) => false,
            _ => true,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReadMode::Continuous => "continuous",
            ReadMode::Single => "single",
            ReadMode::Listen => "listen",
        }
    }
}

impl std::fmt::Display for ReadMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ReadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" => Ok(ReadMode::Continuous),
            "single" => Ok(ReadMode::Single),
            "listen" => Ok(ReadMode::Listen),
            other => Err(format!("unknown reading mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export)]
pub enum AfterEnd {
    #[default]
    None,
    RepeatOne,
    RepeatAll,
    AdvanceNext,
}

impl AfterEnd {
    pub fn as_str(self) -> &'static str {
        match self {
            AfterEnd::None => "none",
            AfterEnd::RepeatOne => "repeat-one",
            AfterEnd::RepeatAll => "repeat-all",
            AfterEnd::AdvanceNext => "advance-next",
        }
    }
}

impl std::fmt::Display for AfterEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AfterEnd {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "stop" => Ok(AfterEnd::None),
            "repeat-one" | "one" | "single" => Ok(AfterEnd::RepeatOne),
            "repeat-all" | "all" => Ok(AfterEnd::RepeatAll),
            "advance-next" | "next" => Ok(AfterEnd::AdvanceNext),
            other => Err(format!("unknown after-end policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("`{after}` is not available in {mode} mode")]
pub struct PolicyConflict {
    pub mode: ReadMode,
    pub after: AfterEnd,
}

/// What happens when the media reports the end of the whole track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackEndAction {
    Stop,
    RestartFromFirstContent,
    AdvanceToNextLesson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackPolicy {
    read_mode: ReadMode,
    after_end: AfterEnd,
}

impl PlaybackPolicy {
    /// Builds a policy, dropping an after-end choice the mode does not allow.
    pub fn new(read_mode: ReadMode, after_end: AfterEnd) -> Self {
        let after_end = if read_mode.allows(after_end) {
            after_end
        } else {
            AfterEnd::None
        };
        Self {
            read_mode,
            after_end,
        }
    }

    pub fn read_mode(&self) -> ReadMode {
        self.read_mode
    }

    pub fn after_end(&self) -> AfterEnd {
        self.after_end
    }

    /// Switches the reading mode. When the current after-end policy is not
    /// legal in the new mode it is reset to `None` and the dropped value is
    /// returned.
    pub fn set_read_mode(&mut self, mode: ReadMode) -> Option<AfterEnd> {
        self.read_mode = mode;
        if mode.allows(self.after_end) {
            return None;
        }
        let dropped = self.after_end;
        self.after_end = AfterEnd::None;
        Some(dropped)
    }

    pub fn set_after_end(&mut self, after: AfterEnd) -> Result<(), PolicyConflict> {
        if !self.read_mode.allows(after) {
            return Err(PolicyConflict {
                mode: self.read_mode,
                after,
            });
        }
        self.after_end = after;
        Ok(())
    }

    /// True when playback must halt at every sentence boundary.
    pub fn stops_at_segment_end(&self) -> bool {
        match self.read_mode {
            ReadMode::Single => true,
            ReadMode::Listen => self.after_end == AfterEnd::RepeatOne,
            ReadMode::Continuous => false,
        }
    }

    pub fn is_free_running(&self) -> bool {
        !self.stops_at_segment_end()
    }

    pub fn repeats_segment(&self) -> bool {
        self.after_end == AfterEnd::RepeatOne
    }

    pub fn segment_shape(&self) -> SegmentShape {
        if self.stops_at_segment_end() {
            SegmentShape::Trimmed
        } else {
            SegmentShape::Gapless
        }
    }

    pub fn track_end_action(&self) -> TrackEndAction {
        match (self.read_mode, self.after_end) {
            (ReadMode::Continuous | ReadMode::Listen, AfterEnd::RepeatAll) => {
                TrackEndAction::RestartFromFirstContent
            }
            (ReadMode::Continuous | ReadMode::Listen, AfterEnd::AdvanceNext) => {
                TrackEndAction::AdvanceToNextLesson
            }
            _ => TrackEndAction::Stop,
        }
    }
}
