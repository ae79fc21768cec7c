use super::PlaybackEngine;
use crate::effects::{Direction, Effect, Wake};
use crate::media::{MediaElement, MediaEvent};
use crate::policy::TrackEndAction;
use std::time::Instant;
use tracing::{debug, info, warn};

impl<M: MediaElement> PlaybackEngine<M> {
    pub(super) fn handle_media_event(
        &mut self,
        event: MediaEvent,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        self.transitions
            .on_media_event(event, &mut self.media, effects);
        match event {
            MediaEvent::MetadataLoaded => self.handle_metadata_loaded(effects),
            MediaEvent::TimeUpdate => self.handle_time_update(now, effects),
            MediaEvent::Seeked => self.rearm(effects),
            MediaEvent::CanPlay => {}
            MediaEvent::Playing => self.handle_playing(effects),
            MediaEvent::Paused => self.handle_paused(),
            MediaEvent::Ended => self.handle_ended(effects),
            MediaEvent::RateChanged => self.handle_rate_changed(effects),
        }
    }

    fn handle_metadata_loaded(&mut self, effects: &mut Vec<Effect>) {
        if let Some(duration) = self.media.duration() {
            if self.session.transcript_mut().bind_media_duration(duration) {
                let last = self.session.transcript().last_index();
                if last.is_some() && self.session.current() == last {
                    self.session.refresh_segment_end();
                    self.rearm(effects);
                }
            }
        }
        let rate = self.preferences.playback_rate;
        if (self.media.playback_rate() - rate).abs() > f64::EPSILON {
            debug!(rate, "Re-applying saved playback rate");
            self.media.set_playback_rate(rate);
        }
        if let Some(time) = self.pending_seek.take() {
            debug!(time, "Seeking to restored position");
            self.seek_directly(time);
        }
    }

    fn handle_time_update(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if self.media.is_paused() || !self.transitions.is_idle() {
            return;
        }
        let time = self.media.current_time();
        if self.session.policy().stops_at_segment_end() {
            if let Some(end) = self.session.segment_end() {
                if time >= end {
                    debug!(time, end, "Time update passed the segment end");
                    self.on_boundary_reached(end, effects);
                    return;
                }
            }
        } else {
            self.follow_media_clock(time, now, effects);
        }

        let autosave_due = self
            .last_autosave
            .is_none_or(|last| now.duration_since(last) >= self.timing.autosave_interval);
        if autosave_due {
            self.last_autosave = Some(now);
            self.save_position();
        }
    }

    fn follow_media_clock(&mut self, time: f64, now: Instant, effects: &mut Vec<Effect>) {
        if let Some(last) = self.last_follow {
            if now.duration_since(last) < self.timing.follow_throttle {
                return;
            }
        }
        if let Some(started) = self.session.segment_started_at() {
            if now.duration_since(started) < self.timing.follow_quiet {
                return;
            }
        }
        self.last_follow = Some(now);
        let Some(index) = self.session.index_at(time) else {
            return;
        };
        if self.session.current() == Some(index) {
            return;
        }
        debug!(index, time, "Highlight follows the media clock");
        self.session.set_current(index, now);
        effects.push(Effect::Highlight { index });
        self.request_scroll(index, false, effects);
    }

    fn handle_playing(&mut self, effects: &mut Vec<Effect>) {
        self.play_generation = self.play_generation.wrapping_add(1);
        effects.push(Effect::Arm {
            wake: Wake::PlayStarted {
                generation: self.play_generation,
            },
            after: self.timing.play_settle,
        });
        self.touch_recent();
    }

    fn handle_paused(&mut self) {
        self.scheduler.clear();
        self.scroll_generation = self.scroll_generation.wrapping_add(1);
        if self.transitions.take_internal_pause() {
            debug!("Pause issued by a transition; not saving position");
            return;
        }
        self.save_position();
    }

    fn handle_ended(&mut self, effects: &mut Vec<Effect>) {
        self.scheduler.clear();
        self.save_position();
        match self.session.policy().track_end_action() {
            TrackEndAction::RestartFromFirstContent => {
                info!(
                    first_content = self.session.first_content_index(),
                    "Track ended; restarting"
                );
                effects.push(Effect::Arm {
                    wake: Wake::RestartTrack,
                    after: self.timing.restart_delay,
                });
            }
            TrackEndAction::AdvanceToNextLesson => {
                let lesson = self.session.lesson();
                info!(lesson_id = %lesson.lesson_id, "Track ended; looking up next lesson");
                effects.push(Effect::ResolveNeighbor {
                    book_id: lesson.book_id.clone(),
                    lesson_id: lesson.lesson_id.clone(),
                    direction: Direction::Next,
                });
            }
            TrackEndAction::Stop => info!("Track ended"),
        }
    }

    fn handle_rate_changed(&mut self, effects: &mut Vec<Effect>) {
        let rate = self.media.playback_rate();
        if !rate.is_finite() || rate <= 0.0 {
            warn!(rate, "Ignoring unusable playback rate");
            return;
        }
        if (rate - self.preferences.playback_rate).abs() > f64::EPSILON {
            self.preferences.playback_rate = rate;
            self.save_preferences();
        }
        self.rearm(effects);
    }
}
