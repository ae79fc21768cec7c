//! Moves the media element between segments.
//!
//! Two strategies exist. A seamless transition mutes, seeks and unmutes a
//! couple of frames after the seek settles, without ever pausing. A discrete
//! transition pauses, seeks, verifies where the media actually landed and
//! retries; sources that cannot seek precisely are swapped once for a fully
//! buffered copy. Every continuation carries the transition sequence number
//! it was started under and is dropped when a newer transition exists.

use crate::effects::{Effect, Wake};
use crate::media::{MediaElement, MediaError, MediaEvent, MediaSource};
use crate::timing::Timing;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionWake {
    MetadataTimeout { seq: u64 },
    SeekTimeout { seq: u64, attempt: u32 },
    Settle { seq: u64, frames_left: u8, step: SettleStep },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStep {
    Unmute,
    Rearm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Seamless,
    Discrete,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionRequest {
    pub seq: u64,
    pub target: f64,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Stage {
    Idle,
    AwaitingMetadata(TransitionRequest),
    Seamless {
        seq: u64,
    },
    Discrete {
        seq: u64,
        target: f64,
        attempt: u32,
        fallback_tried: bool,
    },
    AwaitingFullSource {
        seq: u64,
        target: f64,
    },
    AwaitingSwappedMetadata {
        seq: u64,
        target: f64,
    },
}

#[derive(Debug, Clone, Copy)]
struct SwapRestore {
    rate: f64,
    volume: f32,
    muted: bool,
}

#[derive(Debug)]
pub struct TransitionController {
    timing: Timing,
    stage: Stage,
    metadata_ready: bool,
    primary_origin: String,
    full_source: Option<MediaSource>,
    using_full_source: bool,
    fallback_failed: bool,
    fallback_notified: bool,
    saved_mute: Option<bool>,
    swap_restore: Option<SwapRestore>,
    internal_pause: bool,
}

impl TransitionController {
    pub fn new(timing: Timing, primary_origin: impl Into<String>) -> Self {
        Self {
            timing,
            stage: Stage::Idle,
            metadata_ready: false,
            primary_origin: primary_origin.into(),
            full_source: None,
            using_full_source: false,
            fallback_failed: false,
            fallback_notified: false,
            saved_mute: None,
            swap_restore: None,
            internal_pause: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.stage, Stage::Idle)
    }

    pub fn metadata_ready(&self) -> bool {
        self.metadata_ready
    }

    pub fn using_full_source(&self) -> bool {
        self.using_full_source
    }

    /// True once per pause issued by a transition.
    pub fn take_internal_pause(&mut self) -> bool {
        std::mem::take(&mut self.internal_pause)
    }

    pub fn begin<M: MediaElement + ?Sized>(
        &mut self,
        request: TransitionRequest,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        if !self.metadata_ready {
            debug!(seq = request.seq, "Deferring transition until media metadata is ready");
            self.stage = Stage::AwaitingMetadata(request);
            effects.push(arm(
                TransitionWake::MetadataTimeout { seq: request.seq },
                self.timing.metadata_timeout,
            ));
            return;
        }
        self.run(request, media, effects);
    }

    /// Drops whatever transition is in flight, e.g. for a direct seek.
    pub fn abandon<M: MediaElement + ?Sized>(&mut self, media: &mut M) {
        self.stage = Stage::Idle;
        self.restore_mute(media);
    }

    pub fn on_media_event<M: MediaElement + ?Sized>(
        &mut self,
        event: MediaEvent,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        match (self.stage, event) {
            (_, MediaEvent::MetadataLoaded) => self.on_metadata(media, effects),
            (Stage::Seamless { seq }, MediaEvent::Seeked | MediaEvent::CanPlay) => {
                debug!(seq, ?event, "Seamless seek settled");
                self.stage = Stage::Idle;
                effects.push(self.settle(seq, SettleStep::Unmute));
            }
            (
                Stage::Discrete {
                    seq,
                    target,
                    attempt,
                    fallback_tried,
                },
                MediaEvent::Seeked,
            ) => self.verify(seq, target, attempt, fallback_tried, media, effects),
            _ => {}
        }
    }

    /// Returns true when the scheduler should be re-armed.
    pub fn on_wake<M: MediaElement + ?Sized>(
        &mut self,
        wake: TransitionWake,
        live_seq: u64,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) -> bool {
        match wake {
            TransitionWake::MetadataTimeout { seq } => match self.stage {
                Stage::AwaitingMetadata(request) if request.seq == seq => {
                    warn!(seq, "Media metadata did not arrive in time; transitioning anyway");
                    self.run(request, media, effects);
                }
                Stage::AwaitingSwappedMetadata { seq: pending, target } if pending == seq => {
                    warn!(seq, "Buffered source metadata timed out; seeking anyway");
                    self.apply_swap_restore(media);
                    self.attempt_seek(seq, target, 0, true, media, effects);
                }
                _ => debug!(seq, "Ignoring stale metadata timeout"),
            },
            TransitionWake::SeekTimeout { seq, attempt } => match self.stage {
                Stage::Seamless { seq: pending } if pending == seq => {
                    warn!(seq, "Seek signal did not arrive; settling anyway");
                    self.stage = Stage::Idle;
                    effects.push(self.settle(seq, SettleStep::Unmute));
                }
                Stage::Discrete {
                    seq: pending,
                    target,
                    attempt: pending_attempt,
                    fallback_tried,
                } if pending == seq && pending_attempt == attempt => {
                    warn!(seq, attempt, target, "Seek did not complete in time; treating it as done");
                    self.verify(seq, target, attempt, fallback_tried, media, effects);
                }
                _ => debug!(seq, attempt, "Ignoring stale seek timeout"),
            },
            TransitionWake::Settle {
                seq,
                frames_left,
                step,
            } => {
                if seq != live_seq {
                    debug!(seq, live_seq, "Ignoring settle frame from superseded transition");
                    return false;
                }
                if frames_left > 1 {
                    effects.push(Effect::NextFrame(Wake::Transition(TransitionWake::Settle {
                        seq,
                        frames_left: frames_left - 1,
                        step,
                    })));
                    return false;
                }
                if step == SettleStep::Unmute {
                    self.restore_mute(media);
                }
                return true;
            }
        }
        false
    }

    pub fn on_full_source<M: MediaElement + ?Sized>(
        &mut self,
        fetched_seq: u64,
        result: Result<MediaSource, String>,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        match result {
            Ok(source) => {
                info!(fetched_seq, origin = source.origin(), "Full audio source buffered");
                self.full_source = Some(source.clone());
                if let Stage::AwaitingFullSource { seq, target } = self.stage {
                    self.swap(seq, target, source, media, effects);
                }
            }
            Err(reason) => {
                warn!(fetched_seq, %reason, "Full audio fetch failed");
                self.fallback_failed = true;
                if let Stage::AwaitingFullSource { seq, .. } = self.stage {
                    effects.push(Effect::Notify(
                        "Could not load the full audio; playback may start off target".to_string(),
                    ));
                    self.land(seq, media, effects);
                }
            }
        }
    }

    fn on_metadata<M: MediaElement + ?Sized>(&mut self, media: &mut M, effects: &mut Vec<Effect>) {
        self.metadata_ready = true;
        match self.stage {
            Stage::AwaitingMetadata(request) => self.run(request, media, effects),
            Stage::AwaitingSwappedMetadata { seq, target } => {
                self.apply_swap_restore(media);
                self.attempt_seek(seq, target, 0, true, media, effects);
            }
            _ => {}
        }
    }

    fn run<M: MediaElement + ?Sized>(
        &mut self,
        request: TransitionRequest,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        let TransitionRequest {
            seq,
            target,
            strategy,
        } = request;
        debug!(seq, target, ?strategy, "Starting transition");
        match strategy {
            Strategy::Seamless => {
                if self.saved_mute.is_none() {
                    self.saved_mute = Some(media.is_muted());
                }
                media.set_muted(true);
                match media.seek(target) {
                    Ok(()) => {
                        self.stage = Stage::Seamless { seq };
                        effects.push(arm(
                            TransitionWake::SeekTimeout { seq, attempt: 0 },
                            self.timing.seek_timeout,
                        ));
                    }
                    Err(err) => {
                        warn!(seq, %err, "Seamless seek rejected");
                        self.stage = Stage::Idle;
                        effects.push(self.settle(seq, SettleStep::Unmute));
                    }
                }
            }
            Strategy::Discrete => {
                if !media.is_paused() {
                    self.internal_pause = true;
                    media.pause();
                }
                self.restore_mute(media);
                self.attempt_seek(seq, target, 0, false, media, effects);
            }
        }
    }

    fn attempt_seek<M: MediaElement + ?Sized>(
        &mut self,
        seq: u64,
        target: f64,
        attempt: u32,
        fallback_tried: bool,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        self.stage = Stage::Discrete {
            seq,
            target,
            attempt,
            fallback_tried,
        };
        match media.seek(target) {
            Ok(()) => effects.push(arm(
                TransitionWake::SeekTimeout { seq, attempt },
                self.timing.seek_timeout,
            )),
            Err(MediaError::SeekUnsupported) => {
                warn!(seq, target, "Source cannot seek");
                self.escalate(seq, target, fallback_tried, media, effects);
            }
            Err(err) => {
                warn!(seq, target, %err, "Seek rejected; playing from the current position");
                self.land(seq, media, effects);
            }
        }
    }

    fn verify<M: MediaElement + ?Sized>(
        &mut self,
        seq: u64,
        target: f64,
        attempt: u32,
        fallback_tried: bool,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        let actual = media.current_time();
        if self.timing.seek_landed(target, actual) {
            self.land(seq, media, effects);
        } else if attempt < self.timing.seek_retries {
            debug!(seq, target, actual, attempt = attempt + 1, "Seek landed off target; retrying");
            self.attempt_seek(seq, target, attempt + 1, fallback_tried, media, effects);
        } else {
            self.escalate(seq, target, fallback_tried, media, effects);
        }
    }

    fn escalate<M: MediaElement + ?Sized>(
        &mut self,
        seq: u64,
        target: f64,
        fallback_tried: bool,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        if fallback_tried || self.using_full_source || self.fallback_failed {
            warn!(
                seq,
                target,
                actual = media.current_time(),
                "Seek still off target; continuing best-effort"
            );
            self.land(seq, media, effects);
            return;
        }
        if !self.fallback_notified {
            self.fallback_notified = true;
            effects.push(Effect::Notify(
                "Seeking is unreliable for this audio; loading the full file".to_string(),
            ));
        }
        self.stage = Stage::AwaitingFullSource { seq, target };
        match self.full_source.clone() {
            Some(source) => self.swap(seq, target, source, media, effects),
            None => effects.push(Effect::FetchFullSource {
                seq,
                origin: self.primary_origin.clone(),
            }),
        }
    }

    fn swap<M: MediaElement + ?Sized>(
        &mut self,
        seq: u64,
        target: f64,
        source: MediaSource,
        media: &mut M,
        effects: &mut Vec<Effect>,
    ) {
        let restore = SwapRestore {
            rate: media.playback_rate(),
            volume: media.volume(),
            muted: media.is_muted(),
        };
        self.metadata_ready = false;
        match media.load(source) {
            Ok(()) => {
                info!(seq, target, "Switched to buffered audio source");
                self.using_full_source = true;
                self.swap_restore = Some(restore);
                self.stage = Stage::AwaitingSwappedMetadata { seq, target };
                effects.push(arm(
                    TransitionWake::MetadataTimeout { seq },
                    self.timing.metadata_timeout,
                ));
            }
            Err(err) => {
                warn!(seq, %err, "Buffered source rejected by the media element");
                self.metadata_ready = true;
                self.fallback_failed = true;
                self.land(seq, media, effects);
            }
        }
    }

    fn land<M: MediaElement + ?Sized>(&mut self, seq: u64, media: &mut M, effects: &mut Vec<Effect>) {
        self.stage = Stage::Idle;
        self.restore_mute(media);
        if let Err(err) = media.play() {
            warn!(seq, %err, "Play rejected after seek");
        }
        effects.push(self.settle(seq, SettleStep::Rearm));
    }

    fn apply_swap_restore<M: MediaElement + ?Sized>(&mut self, media: &mut M) {
        if let Some(restore) = self.swap_restore.take() {
            media.set_playback_rate(restore.rate);
            media.set_volume(restore.volume);
            media.set_muted(restore.muted);
        }
    }

    fn restore_mute<M: MediaElement + ?Sized>(&mut self, media: &mut M) {
        if let Some(muted) = self.saved_mute.take() {
            media.set_muted(muted);
        }
    }

    fn settle(&self, seq: u64, step: SettleStep) -> Effect {
        Effect::NextFrame(Wake::Transition(TransitionWake::Settle {
            seq,
            frames_left: self.timing.settle_frames,
            step,
        }))
    }
}

fn arm(wake: TransitionWake, after: Duration) -> Effect {
    Effect::Arm {
        wake: Wake::Transition(wake),
        after,
    }
}
