use super::PlaybackEngine;
use crate::effects::{Effect, LessonRef, ScrollBehavior, Wake};
use crate::media::MediaElement;
use crate::persistence::{PersistedPosition, ResumeMarker};
use std::time::Instant;
use tracing::{debug, info};

impl<M: MediaElement> PlaybackEngine<M> {
    pub(super) fn handle_wake(&mut self, wake: Wake, now: Instant, effects: &mut Vec<Effect>) {
        match wake {
            Wake::Scheduler(wake) => {
                let tick = self.scheduler.on_wake(wake, &self.media);
                self.apply_tick(tick, effects);
            }
            Wake::Transition(wake) => {
                let live_seq = self.session.transition_seq();
                if self
                    .transitions
                    .on_wake(wake, live_seq, &mut self.media, effects)
                {
                    self.rearm(effects);
                }
            }
            Wake::PlayStarted { generation } => {
                if generation == self.play_generation {
                    self.rearm(effects);
                } else {
                    debug!(generation, current = self.play_generation, "Ignoring stale play wake");
                }
            }
            Wake::RepeatOne { ticket } => {
                if !self.scheduler.take_repeat(ticket) {
                    debug!(ticket, "Repeat was cancelled");
                    return;
                }
                if let Some(index) = self.session.current() {
                    info!(index, "Repeating sentence");
                    self.start_transition(index, false, now, effects);
                }
            }
            Wake::Scroll { generation, index } => {
                if generation == self.scroll_generation && self.session.current() == Some(index) {
                    effects.push(Effect::ScrollIntoView {
                        index,
                        behavior: ScrollBehavior::Smooth,
                    });
                }
            }
            Wake::UnlockSettle {
                play_requests,
                restore_muted,
            } => self
                .unlock
                .settle(play_requests, restore_muted, &mut self.media),
            Wake::RestartTrack => {
                let first = self.session.first_content_index();
                self.start_transition(first, false, now, effects);
            }
            Wake::Navigate(lesson) => effects.push(Effect::Navigate(lesson)),
        }
    }

    pub(super) fn handle_neighbor_resolved(
        &mut self,
        next: Option<LessonRef>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(lesson) = next else {
            info!(lesson_id = %self.session.lesson().lesson_id, "No next lesson");
            effects.push(Effect::Notify("Course complete".to_string()));
            return;
        };
        info!(next = %lesson.lesson_id, title = %lesson.title, "Advancing to next lesson");
        self.persistence.set_resume(&ResumeMarker {
            lesson_id: lesson.lesson_id.clone(),
            autoplay: true,
        });
        self.persistence
            .save_position(&lesson.lesson_id, &PersistedPosition::new(0.0, 0));
        effects.push(Effect::Notify(format!("Up next: {}", lesson.title)));
        effects.push(Effect::Arm {
            wake: Wake::Navigate(lesson),
            after: self.timing.navigate_delay,
        });
    }
}
