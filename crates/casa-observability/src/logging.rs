//! Global `tracing` subscriber setup.

use casa_core::{LogFormat, LoggingSettings};
use tracing_subscriber::filter::{Directive, EnvFilter, LevelFilter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log level directive: {0}")]
    InvalidLevel(String),

    #[error("failed to install tracing subscriber: {0}")]
    Install(String),
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `settings.level`. Calling this
/// twice returns `LoggingError::Install` from the second call and leaves the
/// first subscriber in place.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = env_filter(&settings.level)?;

    let fmt_layer = match settings.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Human => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    tracing::debug!(level = %settings.level, format = ?settings.format, "logging initialized");
    Ok(())
}

/// Build the filter used by `init_logging`.
pub fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    let directive: Directive = match level.parse::<LevelFilter>() {
        Ok(level) => level.into(),
        Err(_) => level
            .parse()
            .map_err(|_| LoggingError::InvalidLevel(level.to_string()))?,
    };

    Ok(EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_accepts_levels() {
        assert!(env_filter("info").is_ok());
        assert!(env_filter("debug").is_ok());
        assert!(env_filter("casa_data=trace").is_ok());
    }

    #[test]
    fn test_env_filter_rejects_garbage() {
        assert!(matches!(
            env_filter("casa_data=notalevel"),
            Err(LoggingError::InvalidLevel(_))
        ));
    }
}
