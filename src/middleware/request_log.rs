//! Per-request access logging.

use std::time::Instant;

use chrono::Utc;
use http::{Method, StatusCode};
use tracing::{error, info, warn};

use super::{Middleware, Next};
use crate::context::{RequestContext, RequestId};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;

/// Request logging configuration.
#[derive(Debug, Clone)]
pub struct RequestLogConfig {
    /// Whether [`Router::correlated`](crate::Router::correlated) registers the stage.
    pub enabled: bool,
    /// Log the first N bytes of the request body. 0 disables the preview.
    pub body_preview: usize,
}

impl Default for RequestLogConfig {
    fn default() -> Self {
        Self { enabled: true, body_preview: 256 }
    }
}

/// Logs one `request received` record on arrival and one
/// `request completed` record when the outcome is known.
///
/// Completion is logged at `info` for success, `warn` for `4xx` and
/// `error` for `5xx`. If the request future is dropped first (the client
/// hung up), a `request cancelled` record is logged instead.
///
/// Both records carry the `request_id` of the surrounding
/// [`RequestContext`], so register this stage after
/// [`RequestIdStage`](super::RequestIdStage).
#[derive(Clone, Debug, Default)]
pub struct RequestLog {
    config: RequestLogConfig,
}

impl RequestLog {
    pub fn new(config: RequestLogConfig) -> Self {
        Self { config }
    }
}

impl Middleware for RequestLog {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<Outcome> {
        let ctx = RequestContext::current();
        let request_id = ctx.as_ref().map(|c| c.id().clone());
        let received_at = ctx.map_or_else(Utc::now, |c| c.received_at());
        let preview = body_preview(req.body(), self.config.body_preview);

        info!(
            request_id = request_id.as_ref().map(RequestId::as_str),
            method = %req.method(),
            path = req.path(),
            query = req.query(),
            received_at = %received_at.to_rfc3339(),
            body_bytes = req.body().len(),
            body = preview.as_deref(),
            "request received"
        );

        let in_flight = InFlight {
            request_id,
            method: req.method().clone(),
            path: req.path().to_owned(),
            started: Instant::now(),
            finished: false,
        };

        Box::pin(async move {
            let outcome = next.run(req).await;
            let status = match &outcome {
                Ok(res) => res.status_code(),
                Err(err) => err.status(),
            };
            in_flight.finish(status);
            outcome
        })
    }
}

fn body_preview(body: &[u8], limit: usize) -> Option<String> {
    if limit == 0 || body.is_empty() {
        return None;
    }
    let head = body.get(..limit).unwrap_or(body);
    Some(String::from_utf8_lossy(head).into_owned())
}

/// Tracks one request between receipt and completion.
struct InFlight {
    request_id: Option<RequestId>,
    method: Method,
    path: String,
    started: Instant,
    finished: bool,
}

impl InFlight {
    fn finish(mut self, status: StatusCode) {
        self.finished = true;
        let request_id = self.request_id.as_ref().map(RequestId::as_str);
        let latency_ms = self.started.elapsed().as_millis() as u64;
        let code = status.as_u16();

        if status.is_server_error() {
            error!(request_id, method = %self.method, path = %self.path, status = code, latency_ms, "request completed");
        } else if status.is_client_error() {
            warn!(request_id, method = %self.method, path = %self.path, status = code, latency_ms, "request completed");
        } else {
            info!(request_id, method = %self.method, path = %self.path, status = code, latency_ms, "request completed");
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                request_id = self.request_id.as_ref().map(RequestId::as_str),
                method = %self.method,
                path = %self.path,
                elapsed_ms = self.started.elapsed().as_millis() as u64,
                "request cancelled before completion"
            );
        }
    }
}
