// src/logging.rs

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{Result, WrapErr};
use directories::ProjectDirs;
use lazy_static::lazy_static;
use time::macros::format_description;
use time::UtcOffset;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, fmt::time::OffsetTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = String::from("alerts.log");
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "nessus-harvester", env!("CARGO_PKG_NAME"))
}

/// Platform data directory, used when the configuration names no log folder.
pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// Filter used when neither `RUST_LOG` nor the project variable is set.
pub fn default_filter(debug: bool) -> String {
    let level = if debug { "debug" } else { "warn" };
    format!("{}={}", env!("CARGO_CRATE_NAME"), level)
}

/// Appends structured log lines to `{log_dir}/alerts.log` and returns that path.
pub fn initialize_logging(log_dir: &Path, debug: bool) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("could not create log directory {}", log_dir.display()))?;
    let log_path = log_dir.join(LOG_FILE.as_str());
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .wrap_err_with(|| format!("could not open log file {}", log_path.display()))?;

    let file_log_level = std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.clone()))
        .unwrap_or_else(|_| default_filter(debug));

    // The local offset can't always be read once threads exist; UTC is fine then.
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(
        offset,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    );

    let file_subscriber = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_timer(timer)
        .with_target(false)
        .with_ansi(false)
        .with_filter(EnvFilter::new(file_log_level));

    tracing_subscriber::registry()
        .with(file_subscriber)
        .with(ErrorLayer::default())
        .try_init()
        .wrap_err("could not install log subscriber")?;

    Ok(log_path)
}
