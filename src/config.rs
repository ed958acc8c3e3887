//! Environment-driven configuration.
//!
//! Every variable may be given with a `SELLO_` prefix, which wins over the
//! bare name. Unset or unparsable values keep their defaults.
//!
//! | Variable | Default |
//! |---|---|
//! | `HOST`, `PORT` | `0.0.0.0`, `3000` |
//! | `LOG_LEVEL`, `LOG_JSON` | `info`, `false` |
//! | `REQUEST_ID_POLICY` | `mint` (or `trust`) |
//! | `REQUEST_LOG_ENABLED`, `REQUEST_LOG_BODY_PREVIEW` | `true`, `256` |
//! | `CORS_ENABLED`, `CORS_ORIGINS` | `false`, `*` |

use std::net::SocketAddr;

use crate::error::Error;
use crate::middleware::{CorsConfig, IdPolicy, RequestLogConfig};

const ENV_PREFIX: &str = "SELLO_";

/// Top-level configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub level: String,
    pub json: bool,
}

/// Settings for the correlation stages registered by
/// [`Router::correlated`](crate::Router::correlated).
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub request_id: RequestIdConfig,
    pub request_log: RequestLogConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Default)]
pub struct RequestIdConfig {
    pub policy: IdPolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "0.0.0.0".to_owned(), port: 3000 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_owned(), json: false }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, Error> {
        let addr = format!("{}:{}", self.host, self.port);
        addr.parse().map_err(|source| Error::Addr { addr, source })
    }
}

impl Config {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| {
            std::env::var(format!("{ENV_PREFIX}{key}"))
                .or_else(|_| std::env::var(key))
                .ok()
        })
    }

    /// Builds configuration from an arbitrary key lookup. Keys are the
    /// unprefixed variable names.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let flag = |key: &str| lookup(key).and_then(|v| parse_bool(&v));

        if let Some(host) = lookup("HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.trim().parse().ok()) {
            config.server.port = port;
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(json) = flag("LOG_JSON") {
            config.logging.json = json;
        }

        if let Some(policy) = lookup("REQUEST_ID_POLICY").and_then(|v| IdPolicy::parse(&v)) {
            config.pipeline.request_id.policy = policy;
        }

        if let Some(enabled) = flag("REQUEST_LOG_ENABLED") {
            config.pipeline.request_log.enabled = enabled;
        }
        if let Some(size) = lookup("REQUEST_LOG_BODY_PREVIEW").and_then(|v| v.trim().parse().ok()) {
            config.pipeline.request_log.body_preview = size;
        }

        if let Some(enabled) = flag("CORS_ENABLED") {
            config.pipeline.cors.enabled = enabled;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(str::to_owned)
                .collect();
            if !origins.is_empty() {
                config.pipeline.cors.allowed_origins = origins;
            }
        }

        config
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
