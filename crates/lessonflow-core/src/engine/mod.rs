//! The playback engine: one reducer over media events, timer wakes and user
//! commands.
//!
//! The engine owns the media element and the per-lesson session. Inputs are
//! handled synchronously and answered with [`Effect`]s that the host runs:
//! timers, renderer updates, fetches and navigation. All mutation happens on
//! the caller's thread; stale continuations are filtered by generation and
//! transition sequence numbers instead of locks.

mod commands;
mod media_events;
mod wakes;

#[cfg(test)]
mod tests;

use crate::effects::{Effect, Input, LessonRef, ScrollBehavior, Wake};
use crate::media::MediaElement;
use crate::persistence::{PersistedPosition, Persistence, Preferences};
use crate::policy::{AfterEnd, PlaybackPolicy, ReadMode};
use crate::scheduler::{Scheduler, Tick};
use crate::session::PlaybackSession;
use crate::timing::Timing;
use crate::transcript::Transcript;
use crate::transition::{Strategy, TransitionController, TransitionRequest};
use crate::unlock::UnlockGate;
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};
use ts_rs::TS;

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timing: Timing,
    /// Used until the user changes something; stored preferences win.
    pub defaults: Preferences,
    pub require_unlock: bool,
    /// Where the full-source fallback fetches from.
    pub media_origin: String,
}

/// Renderer-facing view of the engine.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PlaybackSnapshot {
    pub lesson_id: String,
    pub title: String,
    pub current: Option<usize>,
    pub segment_end: Option<f64>,
    pub read_mode: ReadMode,
    pub after_end: AfterEnd,
    pub playing: bool,
    pub time: f64,
    pub duration: Option<f64>,
    pub playback_rate: f64,
    pub volume: f32,
    pub muted: bool,
    pub revealed: Vec<usize>,
    pub first_content_index: usize,
    pub auto_follow: bool,
    pub skip_intro: bool,
    #[ts(type = "number")]
    pub transition_seq: u64,
}

pub struct PlaybackEngine<M: MediaElement> {
    media: M,
    session: PlaybackSession,
    timing: Timing,
    scheduler: Scheduler,
    transitions: TransitionController,
    unlock: UnlockGate,
    persistence: Persistence,
    preferences: Preferences,
    defaults: Preferences,
    pending_seek: Option<f64>,
    play_generation: u64,
    scroll_generation: u64,
    last_follow: Option<Instant>,
    last_autosave: Option<Instant>,
}

impl<M: MediaElement> PlaybackEngine<M> {
    pub fn load(
        lesson: LessonRef,
        transcript: Transcript,
        mut media: M,
        persistence: Persistence,
        options: EngineOptions,
        now: Instant,
    ) -> (Self, Vec<Effect>) {
        let EngineOptions {
            timing,
            defaults,
            require_unlock,
            media_origin,
        } = options;
        let defaults = defaults.sanitized();
        let preferences = persistence
            .load_preferences()
            .unwrap_or_else(|| defaults.clone());
        let policy = PlaybackPolicy::new(preferences.read_mode, preferences.after_end);
        let revealed = persistence.load_revealed(&lesson.lesson_id);
        let session = PlaybackSession::new(
            lesson,
            transcript,
            policy,
            preferences.skip_intro,
            revealed,
        );
        media.set_playback_rate(preferences.playback_rate);
        media.set_volume(preferences.volume);

        let mut engine = Self {
            media,
            session,
            scheduler: Scheduler::new(timing.clone()),
            transitions: TransitionController::new(timing.clone(), media_origin),
            timing,
            unlock: UnlockGate::new(require_unlock),
            persistence,
            preferences,
            defaults,
            pending_seek: None,
            play_generation: 0,
            scroll_generation: 0,
            last_follow: None,
            last_autosave: None,
        };

        let mut effects = Vec::new();
        info!(
            lesson_id = %engine.session.lesson().lesson_id,
            sentences = engine.session.transcript().len(),
            first_content = engine.session.first_content_index(),
            read_mode = %engine.session.policy().read_mode(),
            after_end = %engine.session.policy().after_end(),
            "Loaded lesson"
        );
        engine.push_policy(&mut effects);
        engine.push_revealed(&mut effects);
        engine.touch_recent();
        engine.unlock.arm(&mut effects);
        engine.restore_position(now, &mut effects);
        (engine, effects)
    }

    pub fn handle(&mut self, input: Input, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        match input {
            Input::Media(event) => self.handle_media_event(event, now, &mut effects),
            Input::Wake(wake) => self.handle_wake(wake, now, &mut effects),
            Input::Command(command) => self.handle_command(command, now, &mut effects),
            Input::FullSourceReady { seq, result } => {
                self.transitions
                    .on_full_source(seq, result, &mut self.media, &mut effects);
            }
            Input::NeighborResolved(next) => self.handle_neighbor_resolved(next, &mut effects),
            Input::Gesture => self.unlock.on_gesture(&mut self.media, &mut effects),
        }
        effects
    }

    /// Moves playback to sentence `index`. Manual transitions come from the
    /// user and cancel any pending automatic repeat.
    pub fn transition_to(&mut self, index: usize, manual: bool, now: Instant) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.start_transition(index, manual, now, &mut effects);
        effects
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let policy = self.session.policy();
        PlaybackSnapshot {
            lesson_id: self.session.lesson().lesson_id.clone(),
            title: self.session.lesson().title.clone(),
            current: self.session.current(),
            segment_end: self.session.segment_end(),
            read_mode: policy.read_mode(),
            after_end: policy.after_end(),
            playing: !self.media.is_paused(),
            time: self.media.current_time(),
            duration: self.media.duration(),
            playback_rate: self.media.playback_rate(),
            volume: self.media.volume(),
            muted: self.media.is_muted(),
            revealed: self.session.revealed().to_vec(),
            first_content_index: self.session.first_content_index(),
            auto_follow: self.preferences.auto_follow,
            skip_intro: self.preferences.skip_intro,
            transition_seq: self.session.transition_seq(),
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn media_mut(&mut self) -> &mut M {
        &mut self.media
    }

    pub fn persistence(&self) -> &Persistence {
        &self.persistence
    }

    /// Saves the position and stops everything in flight.
    pub fn shutdown(&mut self) {
        self.save_position();
        self.scheduler.clear();
        self.scheduler.cancel_repeat();
        self.session.next_transition_seq();
        self.transitions.abandon(&mut self.media);
        if !self.media.is_paused() {
            self.media.pause();
        }
        info!(lesson_id = %self.session.lesson().lesson_id, "Playback engine shut down");
    }

    fn restore_position(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        let lesson_id = self.session.lesson().lesson_id.clone();
        let marker = self.persistence.take_resume();
        let autoplay = marker
            .as_ref()
            .is_some_and(|marker| marker.lesson_id == lesson_id && marker.autoplay);
        if marker.is_some() && !autoplay {
            debug!(lesson_id, "Dropping resume marker for another lesson");
        }

        let first_content = self.session.first_content_index();
        let restored = self
            .persistence
            .load_position(&lesson_id, self.session.transcript().len())
            .map(|position| {
                if position.sentence_index < first_content {
                    let start = self
                        .session
                        .transcript()
                        .get(first_content)
                        .map_or(position.time, |record| record.start);
                    (first_content, start)
                } else {
                    (position.sentence_index, position.time)
                }
            });

        if autoplay {
            let index = restored.map_or(first_content, |(index, _)| index);
            info!(lesson_id, index, "Resuming lesson with autoplay");
            self.start_transition(index, true, now, effects);
            return;
        }
        let Some((index, time)) = restored else {
            return;
        };
        info!(lesson_id, index, time, "Restoring saved position");
        self.session.set_current(index, now);
        effects.push(Effect::Highlight { index });
        self.request_scroll(index, true, effects);
        if self.transitions.metadata_ready() {
            self.seek_directly(time);
        } else {
            self.pending_seek = Some(time);
        }
    }

    fn start_transition(
        &mut self,
        index: usize,
        manual: bool,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let Some(target) = self.session.transcript().get(index).map(|record| record.start) else {
            debug!(index, "Ignoring transition outside the transcript");
            return;
        };
        // Checked before the seq bump so the live transition's wakes stay valid.
        if !manual && self.session.current() == Some(index) && !self.media.is_paused() {
            debug!(index, "Sentence already playing; skipping transition");
            return;
        }

        let seq = self.session.next_transition_seq();
        self.scheduler.clear();
        if manual && self.scheduler.cancel_repeat() {
            debug!(seq, "Manual transition cancelled pending repeat");
        }
        self.pending_seek = None;
        let strategy = if self.session.policy().is_free_running() && !self.media.is_paused() {
            Strategy::Seamless
        } else {
            Strategy::Discrete
        };
        self.unlock.ensure_unlocked(&mut self.media);
        self.unlock.note_play_request();

        self.session.set_current(index, now);
        info!(index, seq, manual, ?strategy, target, "Transitioning to sentence");
        effects.push(Effect::Highlight { index });
        self.request_scroll(index, manual, effects);
        self.transitions.begin(
            TransitionRequest {
                seq,
                target,
                strategy,
            },
            &mut self.media,
            effects,
        );
    }

    fn rearm(&mut self, effects: &mut Vec<Effect>) {
        if !self.transitions.is_idle() {
            return;
        }
        let tick = self.scheduler.rearm(
            &self.media,
            self.session.policy(),
            self.session.segment_end(),
        );
        self.apply_tick(tick, effects);
    }

    fn apply_tick(&mut self, tick: Tick, effects: &mut Vec<Effect>) {
        match tick {
            Tick::Idle => {}
            Tick::Arm(after, wake) => effects.push(Effect::Arm {
                wake: Wake::Scheduler(wake),
                after,
            }),
            Tick::Frame(wake) => effects.push(Effect::NextFrame(Wake::Scheduler(wake))),
            Tick::BoundaryReached { end } => self.on_boundary_reached(end, effects),
        }
    }

    fn on_boundary_reached(&mut self, end: f64, effects: &mut Vec<Effect>) {
        if self.scheduler.repeat_pending() {
            debug!(end, "Repeat already pending; ignoring boundary");
            return;
        }
        self.scheduler.clear();
        if !self.media.is_paused() {
            self.media.pause();
        }
        if let Err(err) = self.media.seek(end) {
            warn!(end, %err, "Failed to snap to segment end");
        }
        if self.session.policy().repeats_segment() {
            if let Some(ticket) = self.scheduler.arm_repeat() {
                debug!(end, ticket, "Scheduling sentence repeat");
                effects.push(Effect::Arm {
                    wake: Wake::RepeatOne { ticket },
                    after: self.timing.repeat_delay,
                });
            }
        } else {
            info!(index = ?self.session.current(), end, "Stopped at end of sentence");
        }
    }

    fn request_scroll(&mut self, index: usize, immediate: bool, effects: &mut Vec<Effect>) {
        if !self.preferences.auto_follow {
            return;
        }
        self.scroll_generation = self.scroll_generation.wrapping_add(1);
        if immediate {
            effects.push(Effect::ScrollIntoView {
                index,
                behavior: ScrollBehavior::Instant,
            });
        } else {
            effects.push(Effect::Arm {
                wake: Wake::Scroll {
                    generation: self.scroll_generation,
                    index,
                },
                after: self.timing.scroll_debounce,
            });
        }
    }

    fn seek_directly(&mut self, time: f64) {
        if let Err(err) = self.media.seek(time) {
            warn!(time, %err, "Failed to seek to saved position");
        }
    }

    fn save_position(&mut self) {
        let Some(index) = self.session.current() else {
            return;
        };
        let position = PersistedPosition::new(self.media.current_time(), index);
        let lesson_id = self.session.lesson().lesson_id.clone();
        self.persistence.save_position(&lesson_id, &position);
    }

    fn save_preferences(&mut self) {
        self.persistence.save_preferences(&self.preferences);
    }

    fn touch_recent(&mut self) {
        let lesson = self.session.lesson().clone();
        self.persistence
            .touch_recent(&lesson.lesson_id, &lesson.book_id, &lesson.title);
    }

    fn push_policy(&self, effects: &mut Vec<Effect>) {
        let policy = self.session.policy();
        effects.push(Effect::PolicyChanged {
            read_mode: policy.read_mode(),
            after_end: policy.after_end(),
        });
    }

    fn push_revealed(&self, effects: &mut Vec<Effect>) {
        effects.push(Effect::Revealed {
            listen_mode: self.session.policy().read_mode() == ReadMode::Listen,
            revealed: self.session.revealed().to_vec(),
        });
    }
}
