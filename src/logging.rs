use std::sync::OnceLock;

use thiserror::Error;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOGGING_INSTALLED: OnceLock<()> = OnceLock::new();

/// Errors that can arise while standing up structured logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging filter: {0}")]
    Filter(#[from] ParseError),
    #[error("failed to install logging subscriber: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter`. The first call wins;
/// later calls are no-ops.
pub fn init_logging(default_filter: &str) -> Result<(), LoggingError> {
    if LOGGING_INSTALLED.get().is_some() {
        return Ok(());
    }

    let filter = build_filter(default_filter)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init()?;

    let _ = LOGGING_INSTALLED.set(());
    Ok(())
}

fn build_filter(default_filter: &str) -> Result<EnvFilter, LoggingError> {
    match std::env::var("RUST_LOG") {
        Ok(directive) if !directive.trim().is_empty() => Ok(EnvFilter::try_new(directive)?),
        _ => Ok(EnvFilter::try_new(default_filter)?),
    }
}
