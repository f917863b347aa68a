//! Diagnostics via `tracing`.
//!
//! `RUST_LOG` wins over `logging.level`. Output goes to stderr unless
//! `logging.file` is set, in which case lines are appended to that file
//! without ANSI colors. stdout stays reserved for command output.

use std::fs::{self, OpenOptions};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::io::config::{LogFormat, LoggingConfig};

/// Install the global subscriber. Call once, before anything logs.
///
/// # Example
/// ```bash
/// RUST_LOG=pilot=debug pilot run
/// ```
pub fn init(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .with_context(|| format!("invalid logging.level `{}`", cfg.level))?;

    let (writer, ansi) = match &cfg.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log dir {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match cfg.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(writer).with_ansi(ansi).compact())
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().with_writer(writer).json())
            .try_init(),
    }
    .context("install tracing subscriber")
}

/// Route errors to stderr when [`init`] never ran, e.g. because the settings
/// that configure logging failed to load. No-op once a subscriber exists.
pub fn init_fallback() {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = fmt()
        .with_env_filter(EnvFilter::new("error"))
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
