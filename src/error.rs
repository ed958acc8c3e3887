//! Unified infrastructure error type.

/// The error type returned by sello's fallible setup and serving operations.
///
/// Application-level failures (404, 422, a crashed handler, etc.) are
/// [`HttpError`](crate::HttpError) values that travel through the middleware
/// pipeline. This type surfaces infrastructure failures only: parsing the
/// listen address, binding a socket, or installing the log subscriber.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("telemetry: {0}")]
    Telemetry(#[from] tracing_subscriber::util::TryInitError),

    #[error("telemetry filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
}
