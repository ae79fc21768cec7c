//! Messages flowing between the engine and its host.
//!
//! The engine never sleeps or renders. It answers every [`Input`] with a list
//! of [`Effect`]s; timers come back as [`Input::Wake`] once they elapse.

use crate::media::{MediaEvent, MediaSource};
use crate::policy::{AfterEnd, ReadMode};
use crate::scheduler::SchedulerWake;
use crate::transition::TransitionWake;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonRef {
    pub book_id: String,
    pub lesson_id: String,
    pub filename: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

pub trait LessonDirectory {
    /// `None` covers both "no neighbour" and lookup failures.
    fn resolve_neighbor(&self, book_id: &str, lesson_id: &str, direction: Direction)
    -> Option<LessonRef>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    Smooth,
    Instant,
}

pub trait Renderer {
    fn set_active_sentence(&mut self, index: usize);
    fn set_revealed(&mut self, listen_mode: bool, revealed: &[usize]);
    fn scroll_into_view(&mut self, index: usize, behavior: ScrollBehavior);
    fn show_policy(&mut self, read_mode: ReadMode, after_end: AfterEnd);
    fn notify(&mut self, message: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum Wake {
    Scheduler(SchedulerWake),
    Transition(TransitionWake),
    PlayStarted { generation: u64 },
    RepeatOne { ticket: u64 },
    Scroll { generation: u64, index: usize },
    UnlockSettle { play_requests: u64, restore_muted: bool },
    RestartTrack,
    Navigate(LessonRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `wake` after `after` of wall-clock time.
    Arm { wake: Wake, after: Duration },
    /// Deliver `wake` on the next animation frame.
    NextFrame(Wake),
    Highlight { index: usize },
    ScrollIntoView { index: usize, behavior: ScrollBehavior },
    Revealed { listen_mode: bool, revealed: Vec<usize> },
    PolicyChanged { read_mode: ReadMode, after_end: AfterEnd },
    Notify(String),
    /// Buffer the whole resource; answer with [`Input::FullSourceReady`].
    FetchFullSource { seq: u64, origin: String },
    /// Answer with [`Input::NeighborResolved`].
    ResolveNeighbor { book_id: String, lesson_id: String, direction: Direction },
    Navigate(LessonRef),
    /// Install a once-only gesture listener; answer with [`Input::Gesture`].
    ArmGestureUnlock,
}

impl Effect {
    /// Forwards view-only effects to `renderer`. Returns false for effects the
    /// host has to run itself.
    pub fn render(&self, renderer: &mut dyn Renderer) -> bool {
        match self {
            Effect::Highlight { index } => renderer.set_active_sentence(*index),
            Effect::ScrollIntoView { index, behavior } => renderer.scroll_into_view(*index, *behavior),
            Effect::Revealed {
                listen_mode,
                revealed,
            } => renderer.set_revealed(*listen_mode, revealed),
            Effect::PolicyChanged {
                read_mode,
                after_end,
            } => renderer.show_policy(*read_mode, *after_end),
            Effect::Notify(message) => renderer.notify(message),
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone)]
pub enum Input {
    Media(MediaEvent),
    Wake(Wake),
    Command(Command),
    FullSourceReady {
        seq: u64,
        result: Result<MediaSource, String>,
    },
    NeighborResolved(Option<LessonRef>),
    Gesture,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    TogglePlayPause,
    Pause,
    PlaySentence(usize),
    Next,
    Previous,
    Replay,
    ToggleReveal(Option<usize>),
    Reveal(usize),
    SetReadMode(ReadMode),
    SetAfterEnd(AfterEnd),
    CycleRate,
    VolumeUp,
    VolumeDown,
    SeekFraction(f64),
    SetAutoFollow(bool),
    SetSkipIntro(bool),
    ResetPreferences,
}
