//! Log subscriber setup.
//!
//! ```rust,no_run
//! use sello::{config::Config, telemetry};
//!
//! # fn main() -> Result<(), sello::Error> {
//! let config = Config::from_env();
//! let _guard = telemetry::init(&config.logging)?;
//! // keep `_guard` alive until shutdown so buffered records are flushed
//! # Ok(())
//! # }
//! ```

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;
use crate::error::Error;

/// Installs the global subscriber.
///
/// Records go to stdout through a dedicated writer thread. Request tasks only
/// push onto a bounded queue; when the queue is full records are dropped
/// rather than stalling a request. `RUST_LOG` overrides `config.level`.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard, Error> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    if config.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .try_init()?;
    }

    Ok(guard)
}
