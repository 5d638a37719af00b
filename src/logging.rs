//! tracing setup. Logs go to a file so the terminal UI stays intact.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::{Error, Result};

pub fn default_log_path() -> PathBuf {
    crate::db::data_dir().join("debug.log")
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`; with
/// `verbose` the same events are mirrored to stderr.
pub fn init(path: &Path, level: &str, verbose: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| {
                Error::Configuration(format!("cannot create {}: {err}", parent.display()))
            })?;
        }
    }
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            Error::Configuration(format!("cannot open log file {}: {err}", path.display()))
        })?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|err| Error::Configuration(format!("invalid log level '{level}': {err}")))?;

    let stderr = verbose.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(log_file)),
        )
        .with(stderr)
        .try_init()
        .map_err(|err| Error::Configuration(format!("logging already initialised: {err}")))
}
