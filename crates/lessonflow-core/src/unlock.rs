//! Gesture-gated audio unlock for platforms that refuse unsolicited playback.

use crate::effects::{Effect, Wake};
use crate::media::MediaElement;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default)]
pub struct UnlockGate {
    required: bool,
    unlocked: bool,
    armed: bool,
    play_requests: u64,
}

impl UnlockGate {
    pub fn new(required: bool) -> Self {
        Self {
            required,
            ..Self::default()
        }
    }

    pub fn is_unlocked(&self) -> bool {
        !self.required || self.unlocked
    }

    /// Installs the once-only gesture listener if the platform needs one.
    pub fn arm(&mut self, effects: &mut Vec<Effect>) {
        if self.is_unlocked() || self.armed {
            return;
        }
        self.armed = true;
        effects.push(Effect::ArmGestureUnlock);
    }

    /// Counts a real playback request so a queued unlock pause does not undo it.
    pub fn note_play_request(&mut self) {
        self.play_requests = self.play_requests.wrapping_add(1);
    }

    /// Muted play inside the gesture; the pause and unmute are queued.
    pub fn on_gesture<M: MediaElement + ?Sized>(&mut self, media: &mut M, effects: &mut Vec<Effect>) {
        if self.is_unlocked() {
            return;
        }
        self.armed = false;
        let restore_muted = media.is_muted();
        media.set_muted(true);
        match media.play() {
            Ok(()) => {
                info!("Audio unlocked by user gesture");
                self.unlocked = true;
                effects.push(Effect::Arm {
                    wake: Wake::UnlockSettle {
                        play_requests: self.play_requests,
                        restore_muted,
                    },
                    after: Duration::ZERO,
                });
            }
            Err(err) => {
                warn!(%err, "Unlock playback rejected; waiting for the next gesture");
                media.set_muted(restore_muted);
                self.arm(effects);
            }
        }
    }

    /// Unlocks in place ahead of a transition that is about to play.
    pub fn ensure_unlocked<M: MediaElement + ?Sized>(&mut self, media: &mut M) {
        if self.is_unlocked() {
            return;
        }
        let restore_muted = media.is_muted();
        media.set_muted(true);
        match media.play() {
            Ok(()) => {
                debug!("Audio unlocked ahead of transition");
                self.unlocked = true;
                media.pause();
            }
            Err(err) => warn!(%err, "Unlock playback rejected"),
        }
        media.set_muted(restore_muted);
    }

    pub fn settle<M: MediaElement + ?Sized>(
        &mut self,
        play_requests: u64,
        restore_muted: bool,
        media: &mut M,
    ) {
        if play_requests == self.play_requests {
            media.pause();
        } else {
            debug!("Playback requested since unlock; keeping it running");
        }
        media.set_muted(restore_muted);
    }
}
