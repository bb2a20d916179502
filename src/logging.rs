// Logging setup: tracing-subscriber with an EnvFilter

use crate::config::Settings;
use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Where log lines should be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// Plain CLI commands log to stderr
    Stderr,
    /// The terminal UI owns the screen; use `log_file` or drop the logs
    Interactive,
}

pub fn init_tracing(settings: &Settings, target: LogTarget) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.clone()));

    let (writer, ansi) = match (target, settings.log_file.as_ref()) {
        (LogTarget::Stderr, _) => (BoxMakeWriter::new(std::io::stderr), true),
        (LogTarget::Interactive, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        (LogTarget::Interactive, None) => (BoxMakeWriter::new(std::io::sink), false),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false)
                .with_ansi(ansi)
                .with_writer(writer),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(())
}
