//! Tracing subscriber setup for embedding applications

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `logging.level` when set. Output is pretty-printed
/// unless `logging.format` is `"json"`.
///
/// # Errors
/// Returns error if a global subscriber is already installed
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), crate::error::AppError> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("jaipp={}", logging.level).into());

    let result = if logging.format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
    };

    result.map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e)))
}
