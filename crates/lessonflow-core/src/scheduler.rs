//! Stop-at-boundary scheduling against the media clock.
//!
//! Coarse timers bound drift over long segments; once the boundary is within
//! the near window the scheduler switches to per-frame checks. Every wake
//! carries the generation it was armed under, so clearing the scheduler
//! invalidates anything still pending on the host side.

use crate::media::MediaClock;
use crate::policy::PlaybackPolicy;
use crate::timing::Timing;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerState {
    Idle,
    Scheduled { end: f64 },
    NearWindow { end: f64, guard: f64 },
    Fired { end: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerWake {
    Coarse { generation: u64 },
    Frame { generation: u64 },
}

impl SchedulerWake {
    fn generation(self) -> u64 {
        match self {
            SchedulerWake::Coarse { generation } | SchedulerWake::Frame { generation } => generation,
        }
    }
}

/// What the host has to do next on behalf of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Idle,
    Arm(Duration, SchedulerWake),
    Frame(SchedulerWake),
    BoundaryReached { end: f64 },
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    state: SchedulerState,
    generation: u64,
    timing: Timing,
    repeat_ticket: u64,
    repeat_pending: Option<u64>,
}

impl Scheduler {
    pub fn new(timing: Timing) -> Self {
        Self {
            state: SchedulerState::Idle,
            generation: 0,
            timing,
            repeat_ticket: 0,
            repeat_pending: None,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Drops the armed boundary. Pending coarse timers and frame watches
    /// become stale.
    pub fn clear(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.state = SchedulerState::Idle;
    }

    pub fn rearm(
        &mut self,
        clock: &impl MediaClock,
        policy: &PlaybackPolicy,
        segment_end: Option<f64>,
    ) -> Tick {
        self.clear();
        if policy.is_free_running() {
            return Tick::Idle;
        }
        let Some(end) = segment_end else {
            return Tick::Idle;
        };
        if clock.is_paused() {
            return Tick::Idle;
        }
        self.evaluate(clock, end)
    }

    pub fn on_wake(&mut self, wake: SchedulerWake, clock: &impl MediaClock) -> Tick {
        if wake.generation() != self.generation {
            debug!(
                generation = wake.generation(),
                current = self.generation,
                "Ignoring stale scheduler wake"
            );
            return Tick::Idle;
        }
        match (self.state, wake) {
            (SchedulerState::Scheduled { end }, SchedulerWake::Coarse { .. }) => {
                if clock.is_paused() {
                    self.state = SchedulerState::Idle;
                    return Tick::Idle;
                }
                self.evaluate(clock, end)
            }
            (SchedulerState::NearWindow { end, guard }, SchedulerWake::Frame { .. }) => {
                if clock.is_paused() {
                    self.state = SchedulerState::Idle;
                    return Tick::Idle;
                }
                if clock.current_time() >= end - guard {
                    debug!(end, time = clock.current_time(), guard, "Segment boundary reached");
                    self.state = SchedulerState::Fired { end };
                    Tick::BoundaryReached { end }
                } else {
                    Tick::Frame(wake)
                }
            }
            _ => Tick::Idle,
        }
    }

    fn evaluate(&mut self, clock: &impl MediaClock, end: f64) -> Tick {
        let rate = clock.playback_rate().max(0.0001);
        let remaining = (end - clock.current_time()) / rate;
        if !remaining.is_finite() {
            self.state = SchedulerState::Idle;
            return Tick::Idle;
        }
        if remaining <= self.timing.near_window.as_secs_f64() {
            let guard = self.timing.guard_ahead(rate);
            self.state = SchedulerState::NearWindow { end, guard };
            return Tick::Frame(SchedulerWake::Frame {
                generation: self.generation,
            });
        }
        self.state = SchedulerState::Scheduled { end };
        let delay = Duration::from_secs_f64(remaining)
            .min(self.timing.max_timer_chunk)
            .max(self.timing.min_timer);
        Tick::Arm(
            delay,
            SchedulerWake::Coarse {
                generation: self.generation,
            },
        )
    }

    pub fn repeat_pending(&self) -> bool {
        self.repeat_pending.is_some()
    }

    /// Latches a repeat. Returns `None` when one is already in flight.
    pub fn arm_repeat(&mut self) -> Option<u64> {
        if self.repeat_pending.is_some() {
            return None;
        }
        self.repeat_ticket = self.repeat_ticket.wrapping_add(1);
        self.repeat_pending = Some(self.repeat_ticket);
        Some(self.repeat_ticket)
    }

    /// Releases the latch when `ticket` is the pending repeat.
    pub fn take_repeat(&mut self, ticket: u64) -> bool {
        if self.repeat_pending == Some(ticket) {
            self.repeat_pending = None;
            return true;
        }
        false
    }

    pub fn cancel_repeat(&mut self) -> bool {
        self.repeat_pending.take().is_some()
    }
}
