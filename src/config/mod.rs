//! Configuration loading for the lesson player.
//!
//! Settings are loaded from `conf/config.toml` if present. Missing or invalid
//! entries fall back to defaults so a lesson can always be opened.

mod defaults;
mod io;
mod models;
mod tables;

pub use io::{load_config, serialize_config};
pub use models::{AppConfig, LogLevel};
