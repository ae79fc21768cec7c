//! Entry point for the lesson player.
//!
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Hand the lesson over to the playback runtime.

mod audio;
mod cache;
mod cancellation;
mod commands;
mod config;
mod directory;
mod fetch;
mod lesson;
mod render;
mod runtime;

use crate::config::{load_config, serialize_config};
use anyhow::{Context, Result, anyhow};
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const CONFIG_PATH: &str = "conf/config.toml";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

enum Invocation {
    Play {
        transcript: PathBuf,
        audio: Option<String>,
    },
    PrintConfig,
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let invocation = parse_args()?;
    let config = load_config(Path::new(CONFIG_PATH));
    set_log_level(reload_handle, config.log_level.as_filter_str());
    match invocation {
        Invocation::PrintConfig => {
            println!("{}", serialize_config(&config)?);
            Ok(())
        }
        Invocation::Play { transcript, audio } => {
            info!(
                transcript = %transcript.display(),
                audio = audio.as_deref().unwrap_or("<sibling>"),
                level = %config.log_level,
                read_mode = %config.read_mode,
                after_end = %config.after_end,
                platform = %config.platform,
                "Starting lesson player"
            );
            runtime::run(config, &transcript, audio).context("Playback loop failed")
        }
    }
}

fn parse_args() -> Result<Invocation> {
    let mut args = env::args().skip(1);
    let first = args
        .next()
        .ok_or_else(|| anyhow!("Usage: lessonflow <lesson.lrc> [audio path or URL] | --print-config"))?;
    if first == "--print-config" {
        return Ok(Invocation::PrintConfig);
    }
    let transcript = PathBuf::from(first);
    if !transcript.exists() {
        return Err(anyhow!("File not found: {}", transcript.display()));
    }
    Ok(Invocation::Play {
        transcript,
        audio: args.next(),
    })
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
