use super::config::LogLevel;
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),
    #[error("Failed to install tracing subscriber: {0}")]
    InitFailed(String),
}

/// Installs the global tracing subscriber.
///
/// The configured level applies to the crate; the HTTP stack is pinned to
/// `warn` so request plumbing does not drown the pipeline's own events.
pub fn init_logging(level: LogLevel) -> Result<(), LoggingError> {
    let directives = format!("{},hyper=warn,reqwest=warn,h2=warn", level.as_str());
    let filter =
        EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).compact())
        .try_init()
        .map_err(|e| LoggingError::InitFailed(e.to_string()))
}
