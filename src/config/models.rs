use lessonflow_core::{AfterEnd, PlatformProfile, Preferences, ReadMode, Timing};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Resolved application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub read_mode: ReadMode,
    pub after_end: AfterEnd,
    pub auto_follow: bool,
    pub skip_intro: bool,
    pub playback_rate: f64,
    pub volume: f32,
    pub platform: PlatformProfile,
    /// Overrides for the profile's timing constants, in milliseconds.
    pub near_window_ms: Option<u64>,
    pub guard_base_ms: Option<u64>,
    pub seek_timeout_ms: Option<u64>,
    pub cache_dir: String,
    pub lesson_data_path: String,
    pub log_level: LogLevel,
}

impl Default for AppConfig {
    fn default() -> Self {
        use crate::config::defaults;
        AppConfig {
            read_mode: defaults::default_read_mode(),
            after_end: defaults::default_after_end(),
            auto_follow: defaults::default_auto_follow(),
            skip_intro: defaults::default_skip_intro(),
            playback_rate: defaults::default_playback_rate(),
            volume: defaults::default_volume(),
            platform: defaults::default_platform(),
            near_window_ms: None,
            guard_base_ms: None,
            seek_timeout_ms: None,
            cache_dir: defaults::default_cache_dir(),
            lesson_data_path: defaults::default_lesson_data_path(),
            log_level: defaults::default_log_level(),
        }
    }
}

impl AppConfig {
    /// Preferences used until the learner stores their own.
    pub fn preferences(&self) -> Preferences {
        Preferences {
            read_mode: self.read_mode,
            after_end: self.after_end,
            auto_follow: self.auto_follow,
            skip_intro: self.skip_intro,
            playback_rate: self.playback_rate,
            volume: self.volume,
        }
        .sanitized()
    }

    pub fn timing(&self) -> Timing {
        let mut timing = Timing::for_profile(self.platform);
        if let Some(ms) = self.near_window_ms {
            timing.near_window = Duration::from_millis(ms);
        }
        if let Some(ms) = self.guard_base_ms {
            timing.guard_base = ms as f64 / 1000.0;
        }
        if let Some(ms) = self.seek_timeout_ms {
            timing.seek_timeout = Duration::from_millis(ms);
        }
        timing
    }

    pub fn cache_path(&self) -> PathBuf {
        PathBuf::from(&self.cache_dir)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_overrides_replace_profile_values() {
        let config = AppConfig {
            platform: PlatformProfile::GestureRestricted,
            near_window_ms: Some(200),
            guard_base_ms: Some(50),
            ..AppConfig::default()
        };
        let timing = config.timing();
        assert_eq!(timing.profile, PlatformProfile::GestureRestricted);
        assert_eq!(timing.near_window, Duration::from_millis(200));
        assert!((timing.guard_base - 0.05).abs() < 1e-9);
        assert_eq!(timing.seek_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn preferences_are_clamped() {
        let config = AppConfig {
            playback_rate: 9.0,
            volume: 3.0,
            ..AppConfig::default()
        };
        let preferences = config.preferences();
        assert_eq!(preferences.playback_rate, 4.0);
        assert_eq!(preferences.volume, 1.0);
    }
}
