use super::defaults;
use super::models::{AppConfig, LogLevel};
use lessonflow_core::{AfterEnd, PlatformProfile, ReadMode};
use serde::Deserialize;

/// On-disk layout of `config.toml`.
#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    playback: PlaybackConfig,
    #[serde(default)]
    timing: TimingConfig,
    #[serde(default)]
    storage: StorageConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            read_mode: tables.playback.read_mode,
            after_end: tables.playback.after_end,
            auto_follow: tables.playback.auto_follow,
            skip_intro: tables.playback.skip_intro,
            playback_rate: tables.playback.playback_rate,
            volume: tables.playback.volume,
            platform: tables.timing.platform,
            near_window_ms: tables.timing.near_window_ms,
            guard_base_ms: tables.timing.guard_base_ms,
            seek_timeout_ms: tables.timing.seek_timeout_ms,
            cache_dir: tables.storage.cache_dir,
            lesson_data_path: tables.storage.lesson_data_path,
            log_level: tables.logging.log_level,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            playback: PlaybackConfig {
                read_mode: config.read_mode,
                after_end: config.after_end,
                auto_follow: config.auto_follow,
                skip_intro: config.skip_intro,
                playback_rate: config.playback_rate,
                volume: config.volume,
            },
            timing: TimingConfig {
                platform: config.platform,
                near_window_ms: config.near_window_ms,
                guard_base_ms: config.guard_base_ms,
                seek_timeout_ms: config.seek_timeout_ms,
            },
            storage: StorageConfig {
                cache_dir: config.cache_dir.clone(),
                lesson_data_path: config.lesson_data_path.clone(),
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct PlaybackConfig {
    #[serde(default = "defaults::default_read_mode")]
    read_mode: ReadMode,
    #[serde(default = "defaults::default_after_end")]
    after_end: AfterEnd,
    #[serde(default = "defaults::default_auto_follow")]
    auto_follow: bool,
    #[serde(default = "defaults::default_skip_intro")]
    skip_intro: bool,
    #[serde(default = "defaults::default_playback_rate")]
    playback_rate: f64,
    #[serde(default = "defaults::default_volume")]
    volume: f32,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        PlaybackConfig {
            read_mode: defaults::default_read_mode(),
            after_end: defaults::default_after_end(),
            auto_follow: defaults::default_auto_follow(),
            skip_intro: defaults::default_skip_intro(),
            playback_rate: defaults::default_playback_rate(),
            volume: defaults::default_volume(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct TimingConfig {
    #[serde(default = "defaults::default_platform")]
    platform: PlatformProfile,
    #[serde(default)]
    near_window_ms: Option<u64>,
    #[serde(default)]
    guard_base_ms: Option<u64>,
    #[serde(default)]
    seek_timeout_ms: Option<u64>,
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            platform: defaults::default_platform(),
            near_window_ms: None,
            guard_base_ms: None,
            seek_timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct StorageConfig {
    #[serde(default = "defaults::default_cache_dir")]
    cache_dir: String,
    #[serde(default = "defaults::default_lesson_data_path")]
    lesson_data_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            cache_dir: defaults::default_cache_dir(),
            lesson_data_path: defaults::default_lesson_data_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}
