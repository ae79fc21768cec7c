//! Sentence-level audio/transcript synchronisation for language lessons.
//!
//! The crate is host-agnostic: a [`PlaybackEngine`] drives any
//! [`MediaElement`] and reports everything else (timers, rendering, fetching,
//! navigation) as [`Effect`]s.

pub mod boundary;
pub mod effects;
pub mod engine;
pub mod intro;
pub mod lrc;
pub mod media;
pub mod persistence;
pub mod policy;
pub mod scheduler;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod timing;
pub mod transcript;
pub mod transition;
pub mod unlock;

pub use effects::{
    Command, Direction, Effect, Input, LessonDirectory, LessonRef, Renderer, ScrollBehavior, Wake,
};
pub use engine::{EngineOptions, PlaybackEngine, PlaybackSnapshot};
pub use lrc::parse_lrc;
pub use media::{MediaClock, MediaElement, MediaError, MediaEvent, MediaSource};
pub use persistence::{KeyValueStore, MemoryStore, Persistence, Preferences, StoreError};
pub use policy::{AfterEnd, PlaybackPolicy, ReadMode};
pub use timing::{PlatformProfile, Timing};
pub use transcript::{SentenceRecord, Transcript, TranscriptMeta};
