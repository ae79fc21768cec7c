//! Timing constants for scheduling and seeking, tuned per platform.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformProfile {
    #[default]
    Standard,
    /// Audio blocked until a user gesture; coarser timers and slower seeks.
    GestureRestricted,
}

impl PlatformProfile {
    pub fn requires_unlock(self) -> bool {
        matches!(self, PlatformProfile::GestureRestricted)
    }
}

impl std::fmt::Display for PlatformProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlatformProfile::Standard => "standard",
            PlatformProfile::GestureRestricted => "gesture-restricted",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub profile: PlatformProfile,
    /// Wall-clock distance to a boundary below which frame polling starts.
    pub near_window: Duration,
    pub max_timer_chunk: Duration,
    pub min_timer: Duration,
    /// Guard offset at 1x, in seconds of media time.
    pub guard_base: f64,
    /// Extra guard per unit of playback rate above 1x.
    pub guard_slope: f64,
    pub seek_timeout: Duration,
    pub metadata_timeout: Duration,
    /// Largest acceptable gap between requested and achieved seek position.
    pub seek_epsilon: f64,
    /// Targets at or below this are not verified.
    pub seek_verify_floor: f64,
    pub seek_retries: u32,
    pub settle_frames: u8,
    pub repeat_delay: Duration,
    pub restart_delay: Duration,
    pub navigate_delay: Duration,
    pub play_settle: Duration,
    pub scroll_debounce: Duration,
    pub follow_throttle: Duration,
    pub follow_quiet: Duration,
    pub autosave_interval: Duration,
    /// How close to a paused segment end counts as "stopped at the end".
    pub at_end_tolerance: f64,
}

impl Timing {
    pub fn for_profile(profile: PlatformProfile) -> Self {
        let restricted = profile == PlatformProfile::GestureRestricted;
        Self {
            profile,
            near_window: Duration::from_millis(if restricted { 160 } else { 120 }),
            max_timer_chunk: Duration::from_secs(10),
            min_timer: Duration::from_millis(10),
            guard_base: if restricted { 0.08 } else { 0.06 },
            guard_slope: if restricted { 0.03 } else { 0.02 },
            seek_timeout: Duration::from_millis(if restricted { 2500 } else { 1200 }),
            metadata_timeout: Duration::from_secs(5),
            seek_epsilon: 0.25,
            seek_verify_floor: 0.5,
            seek_retries: 2,
            settle_frames: 2,
            repeat_delay: Duration::from_millis(300),
            restart_delay: Duration::from_millis(100),
            navigate_delay: Duration::from_secs(2),
            play_settle: Duration::from_millis(50),
            scroll_debounce: Duration::from_millis(420),
            follow_throttle: Duration::from_millis(200),
            follow_quiet: Duration::from_millis(350),
            autosave_interval: Duration::from_secs(2),
            at_end_tolerance: 0.1,
        }
    }

    /// Guard offset in media seconds; grows with playback rate.
    pub fn guard_ahead(&self, rate: f64) -> f64 {
        let rate = if rate.is_finite() { rate } else { 1.0 };
        let rate = rate.clamp(0.5, 3.0);
        self.guard_base + (rate - 1.0) * self.guard_slope
    }

    pub fn seek_landed(&self, target: f64, actual: f64) -> bool {
        if !target.is_finite() || target <= self.seek_verify_floor {
            return true;
        }
        (actual - target).abs() <= self.seek_epsilon
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::for_profile(PlatformProfile::Standard)
    }
}
