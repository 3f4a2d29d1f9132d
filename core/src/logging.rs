//! logging.rs
//! Subscriber setup for the pipeline's `tracing` events.
//!
//! Stages log with a bracketed stage prefix (`[PRODUCER]`, `[WORKER-3]`,
//! `[CONSUMER]`, `[PIPELINE]`) plus structured fields.

use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Default directive when neither `RUST_LOG` nor the caller sets one.
pub const DEFAULT_FILTER: &str = "framecrypt_core=info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(String),
}

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over `filter`; `filter` wins over [`DEFAULT_FILTER`].
/// Returns `Ok(false)` when a global subscriber was already installed,
/// which makes this safe to call from every test.
pub fn init_tracing(filter: Option<&str>) -> Result<bool, LoggingError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => EnvFilter::try_new(filter.unwrap_or(DEFAULT_FILTER))
            .map_err(|e| LoggingError::Filter(e.to_string()))?,
    };

    let installed = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok();

    Ok(installed)
}
