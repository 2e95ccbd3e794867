/// Logging Module
///
/// Installs the global tracing subscriber.
///
/// Log output never goes to stdout, which carries protocol messages only.
/// The filter comes from `RUST_LOG` when set, else from `logging.level`.

use crate::config::LoggingConfig;
use crate::core::{AdminError, Result};
use std::fs::{self, OpenOptions};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn env_filter(level: &str) -> Result<EnvFilter> {
    match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(level),
    }
    .map_err(|e| AdminError::Config(format!("Invalid log level '{}': {}", level, e)))
}

/// Installs the global subscriber, writing to the configured file or to stderr.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(&config.level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => builder.with_writer(std::io::stderr).try_init(),
    };
    installed.map_err(|e| AdminError::Config(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!("Logging initialized: level={}", config.level);
    Ok(())
}
