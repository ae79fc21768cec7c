use crate::config::LogLevel;
use lessonflow_core::{AfterEnd, PlatformProfile, ReadMode};

pub(crate) fn default_read_mode() -> ReadMode {
    ReadMode::Continuous
}

pub(crate) fn default_after_end() -> AfterEnd {
    AfterEnd::None
}

pub(crate) fn default_auto_follow() -> bool {
    true
}

pub(crate) fn default_skip_intro() -> bool {
    true
}

pub(crate) fn default_playback_rate() -> f64 {
    1.0
}

pub(crate) fn default_volume() -> f32 {
    1.0
}

pub(crate) fn default_platform() -> PlatformProfile {
    PlatformProfile::Standard
}

pub(crate) fn default_cache_dir() -> String {
    ".cache".to_string()
}

pub(crate) fn default_lesson_data_path() -> String {
    "static/data.json".to_string()
}

pub(crate) fn default_log_level() -> LogLevel {
    LogLevel::Info
}
