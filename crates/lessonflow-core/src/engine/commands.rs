use super::PlaybackEngine;
use crate::effects::{Command, Effect};
use crate::media::MediaElement;
use crate::policy::{AfterEnd, PlaybackPolicy, ReadMode};
use std::time::Instant;
use tracing::{debug, info, warn};

const RATE_STEPS: [f64; 8] = [1.0, 1.25, 1.5, 1.75, 2.0, 2.25, 2.5, 0.75];
const VOLUME_STEP: f32 = 0.1;

impl<M: MediaElement> PlaybackEngine<M> {
    pub(super) fn handle_command(
        &mut self,
        command: Command,
        now: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match command {
            Command::TogglePlayPause => self.handle_toggle_play_pause(now, effects),
            Command::Pause => self.handle_pause(),
            Command::PlaySentence(index) => self.start_transition(index, true, now, effects),
            Command::Next => {
                let target = self
                    .session
                    .current()
                    .map_or(self.session.first_content_index(), |index| index + 1);
                self.start_transition(target, true, now, effects);
            }
            Command::Previous => {
                let target = self
                    .session
                    .current()
                    .map_or(self.session.first_content_index(), |index| {
                        index.saturating_sub(1)
                    });
                self.start_transition(target, true, now, effects);
            }
            Command::Replay => {
                let target = self
                    .session
                    .current()
                    .unwrap_or(self.session.first_content_index());
                self.start_transition(target, true, now, effects);
            }
            Command::ToggleReveal(index) => self.handle_toggle_reveal(index, effects),
            Command::Reveal(index) => self.handle_reveal(index, effects),
            Command::SetReadMode(mode) => self.handle_set_read_mode(mode, effects),
            Command::SetAfterEnd(after) => self.handle_set_after_end(after, effects),
            Command::CycleRate => self.handle_cycle_rate(effects),
            Command::VolumeUp => self.handle_volume_step(VOLUME_STEP, effects),
            Command::VolumeDown => self.handle_volume_step(-VOLUME_STEP, effects),
            Command::SeekFraction(fraction) => self.handle_seek_fraction(fraction, now, effects),
            Command::SetAutoFollow(enabled) => {
                self.preferences.auto_follow = enabled;
                self.save_preferences();
            }
            Command::SetSkipIntro(enabled) => {
                self.preferences.skip_intro = enabled;
                self.session.recompute_first_content(enabled);
                debug!(
                    enabled,
                    first_content = self.session.first_content_index(),
                    "Skip intro changed"
                );
                self.save_preferences();
            }
            Command::ResetPreferences => self.handle_reset_preferences(effects),
        }
    }

    fn handle_toggle_play_pause(&mut self, now: Instant, effects: &mut Vec<Effect>) {
        if !self.media.is_paused() {
            self.handle_pause();
            return;
        }
        let Some(index) = self.session.current() else {
            let first = self.session.first_content_index();
            self.start_transition(first, true, now, effects);
            return;
        };
        if self.session.policy().stops_at_segment_end() && self.paused_at_segment_end() {
            let next = index + 1;
            let target = if next < self.session.transcript().len() {
                next
            } else {
                index
            };
            self.start_transition(target, true, now, effects);
            return;
        }
        self.scheduler.cancel_repeat();
        self.unlock.ensure_unlocked(&mut self.media);
        self.unlock.note_play_request();
        if let Err(err) = self.media.play() {
            warn!(%err, "Play rejected");
        }
    }

    fn paused_at_segment_end(&self) -> bool {
        self.session.segment_end().is_some_and(|end| {
            self.media.current_time() >= end - self.timing.at_end_tolerance
        })
    }

    fn handle_pause(&mut self) {
        if self.scheduler.cancel_repeat() {
            debug!("Pause cancelled pending repeat");
        }
        if !self.media.is_paused() {
            self.scheduler.clear();
            self.media.pause();
        }
    }

    fn handle_toggle_reveal(&mut self, index: Option<usize>, effects: &mut Vec<Effect>) {
        if self.session.policy().read_mode() != ReadMode::Listen {
            debug!("Reveal is only available in listen mode");
            return;
        }
        let Some(index) = index.or(self.session.current()) else {
            return;
        };
        if index >= self.session.transcript().len() {
            return;
        }
        let revealed = self.session.revealed_mut().toggle(index);
        debug!(index, revealed, "Toggled sentence reveal");
        self.save_revealed();
        self.push_revealed(effects);
    }

    fn handle_reveal(&mut self, index: usize, effects: &mut Vec<Effect>) {
        if self.session.policy().read_mode() != ReadMode::Listen
            || index >= self.session.transcript().len()
        {
            return;
        }
        if self.session.revealed_mut().insert(index) {
            self.save_revealed();
            self.push_revealed(effects);
        }
    }

    fn save_revealed(&mut self) {
        let lesson_id = self.session.lesson().lesson_id.clone();
        let revealed = self.session.revealed().clone();
        self.persistence.save_revealed(&lesson_id, &revealed);
    }

    fn handle_set_read_mode(&mut self, mode: ReadMode, effects: &mut Vec<Effect>) {
        if self.session.policy().read_mode() == mode {
            return;
        }
        if let Some(dropped) = self.session.policy_mut().set_read_mode(mode) {
            info!(%mode, %dropped, "After-end policy reset by mode change");
            effects.push(Effect::Notify(format!(
                "{dropped} is not available in {mode} mode; after-end reset to none"
            )));
        }
        info!(%mode, "Reading mode changed");
        self.policy_updated(effects);
        self.push_revealed(effects);
    }

    fn handle_set_after_end(&mut self, after: AfterEnd, effects: &mut Vec<Effect>) {
        if let Err(conflict) = self.session.policy_mut().set_after_end(after) {
            warn!(%conflict, "Rejected after-end policy");
            effects.push(Effect::Notify(conflict.to_string()));
            return;
        }
        info!(%after, "After-end policy changed");
        self.policy_updated(effects);
    }

    fn policy_updated(&mut self, effects: &mut Vec<Effect>) {
        let policy = *self.session.policy();
        self.preferences.read_mode = policy.read_mode();
        self.preferences.after_end = policy.after_end();
        self.save_preferences();
        if !policy.repeats_segment() {
            self.scheduler.cancel_repeat();
        }
        self.session.refresh_segment_end();
        self.push_policy(effects);
        self.rearm(effects);
    }

    fn handle_cycle_rate(&mut self, effects: &mut Vec<Effect>) {
        let current = self.media.playback_rate();
        let next = RATE_STEPS
            .iter()
            .position(|step| (step - current).abs() < 0.001)
            .map_or(1.0, |position| RATE_STEPS[(position + 1) % RATE_STEPS.len()]);
        info!(rate = next, "Playback rate changed");
        self.media.set_playback_rate(next);
        self.preferences.playback_rate = next;
        self.save_preferences();
        effects.push(Effect::Notify(format!("Speed {next}x")));
        self.rearm(effects);
    }

    fn handle_volume_step(&mut self, delta: f32, effects: &mut Vec<Effect>) {
        let volume = ((self.media.volume() + delta) * 10.0).round() / 10.0;
        let volume = volume.clamp(0.0, 1.0);
        self.media.set_volume(volume);
        self.preferences.volume = volume;
        self.save_preferences();
        effects.push(Effect::Notify(format!("Volume {:.0}%", volume * 100.0)));
    }

    fn handle_seek_fraction(&mut self, fraction: f64, now: Instant, effects: &mut Vec<Effect>) {
        if !fraction.is_finite() {
            warn!(fraction, "Ignoring non-finite seek fraction");
            return;
        }
        let Some(duration) = self
            .media
            .duration()
            .filter(|duration| duration.is_finite() && *duration > 0.0)
        else {
            debug!("Seek requested before duration is known");
            return;
        };
        let target = fraction.clamp(0.0, 1.0) * duration;
        self.session.next_transition_seq();
        self.transitions.abandon(&mut self.media);
        self.scheduler.clear();
        self.scheduler.cancel_repeat();
        self.pending_seek = None;
        if let Err(err) = self.media.seek(target) {
            warn!(target, %err, "Seek rejected");
            return;
        }
        if let Some(index) = self.session.index_at(target) {
            if self.session.current() != Some(index) {
                self.session.set_current(index, now);
                effects.push(Effect::Highlight { index });
                self.request_scroll(index, true, effects);
            }
        }
    }

    fn handle_reset_preferences(&mut self, effects: &mut Vec<Effect>) {
        self.preferences = self.defaults.clone();
        self.persistence.clear_preferences();
        *self.session.policy_mut() =
            PlaybackPolicy::new(self.preferences.read_mode, self.preferences.after_end);
        self.session
            .recompute_first_content(self.preferences.skip_intro);
        self.session.refresh_segment_end();
        self.scheduler.cancel_repeat();
        self.media.set_playback_rate(self.preferences.playback_rate);
        self.media.set_volume(self.preferences.volume);
        info!("Preferences reset to defaults");
        self.push_policy(effects);
        self.push_revealed(effects);
        effects.push(Effect::Notify("Preferences reset".to_string()));
        self.rearm(effects);
    }
}
