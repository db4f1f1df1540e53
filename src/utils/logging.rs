//! Structured logging setup.
//!
//! Installs a `tracing` subscriber driven by [`LoggingConfig`]: console and/or file output,
//! plain or JSON formatting, filtered by `RUST_LOG` when it is set and by the configured
//! level otherwise.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber described by `config`.
///
/// Fails with [`ProtocolError::ConfigError`] if a subscriber is already installed or the
/// log file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        layers.push(if config.json_format {
            fmt::layer().json().with_target(true).boxed()
        } else {
            fmt::layer().with_target(true).with_thread_names(true).boxed()
        });
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError("Log file path required for file logging".to_string())
        })?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = Mutex::new(file);
        layers.push(if config.json_format {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .boxed()
        } else {
            fmt::layer().with_writer(writer).with_ansi(false).boxed()
        });
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(config.log_level))
        .try_init()
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}

/// `RUST_LOG` if set, otherwise `level` for every target
pub fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_env_filter(level))
}

pub fn default_env_filter(level: Level) -> EnvFilter {
    EnvFilter::new(level.as_str().to_ascii_lowercase())
}
