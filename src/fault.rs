//! Classified request failures.
//!
//! Handlers report failure by returning `Err(HttpError)`. The error carries
//! its own HTTP status, and the status class decides the [`Fault`]: `4xx` is
//! the caller's fault, anything else is ours. The classification drives both
//! the log level and what the [`ErrorResponse`](crate::middleware::ErrorResponse)
//! stage is willing to show the caller.
//!
//! ```rust
//! use sello::{HttpError, Request};
//!
//! async fn get_book(req: Request) -> Result<String, HttpError> {
//!     match req.param("id") {
//!         Some("1") => Ok("Dune".to_owned()),
//!         _ => Err(HttpError::not_found("Book not found")),
//!     }
//! }
//! ```
//!
//! Server faults never show their own message to the caller: the rendered
//! body carries [`UNKNOWN_ERROR`] and the request id instead.
//!
//! Failures that nobody classified (an I/O error bubbling up through `?`, a
//! panicking handler) become [`HttpError::internal`]: status 500, the generic
//! message [`UNKNOWN_ERROR`], and the real cause kept in [`HttpError::detail`]
//! where only the log can see it.

use std::borrow::Cow;
use std::fmt;

use http::StatusCode;

use crate::context::RequestId;

/// User-visible message of every server fault.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Who caused a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Malformed input, missing resource, bad credentials (`4xx`).
    Client,
    /// Everything else (`5xx`, or a non-error status used by mistake).
    Server,
}

impl Fault {
    pub fn of(status: StatusCode) -> Self {
        if status.is_client_error() { Self::Client } else { Self::Server }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Server => "server",
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed request: status, user-visible message, and internal detail.
#[derive(Debug, thiserror::Error)]
#[error("{status}: {message}")]
pub struct HttpError {
    status: StatusCode,
    message: Cow<'static, str>,
    detail: Option<String>,
    request_id: Option<RequestId>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self { status, message: message.into(), detail: None, request_id: None }
    }

    pub fn bad_request(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn unprocessable(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// A deliberate server-side failure.
    ///
    /// Like every server fault the caller only sees [`UNKNOWN_ERROR`] and the
    /// request id; `message` goes to the error log.
    pub fn server(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Wraps an unclassified failure.
    ///
    /// The caller only ever sees [`UNKNOWN_ERROR`]; the full source chain is
    /// recorded as detail for the error log.
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error,
    {
        Self::server(UNKNOWN_ERROR).with_detail(source_chain(&err))
    }

    /// Wraps the payload of a panicked handler.
    pub(crate) fn from_panic(payload: &(dyn std::any::Any + Send)) -> Self {
        let text = payload
            .downcast_ref::<&'static str>()
            .copied()
            .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("non-string panic payload");
        Self::server(UNKNOWN_ERROR).with_detail(format!("handler panicked: {text}"))
    }

    /// Attaches internal diagnostic detail. Never rendered into a response.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn fault(&self) -> Fault {
        Fault::of(self.status)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// The id of the request this error was raised under, once it has passed
    /// back through the minting stage.
    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    /// Records the request id if none is recorded yet.
    pub(crate) fn stamp(mut self, id: &RequestId) -> Self {
        if self.request_id.is_none() {
            self.request_id = Some(id.clone());
        }
        self
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request("Invalid JSON body").with_detail(err.to_string())
    }
}

fn source_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut next = err.source();
    while let Some(cause) = next {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        next = cause.source();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("query failed")]
    struct QueryError(#[source] std::io::Error);

    #[test]
    fn fault_follows_status_class() {
        assert_eq!(HttpError::not_found("x").fault(), Fault::Client);
        assert_eq!(HttpError::bad_request("x").fault(), Fault::Client);
        assert_eq!(HttpError::server("x").fault(), Fault::Server);
        assert_eq!(HttpError::new(StatusCode::BAD_GATEWAY, "x").fault(), Fault::Server);
        assert_eq!(HttpError::new(StatusCode::OK, "x").fault(), Fault::Server);
    }

    #[test]
    fn internal_hides_cause_behind_generic_message() {
        let cause = QueryError(std::io::Error::other("connection reset"));
        let err = HttpError::internal(cause);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), UNKNOWN_ERROR);
        assert_eq!(err.detail(), Some("query failed: connection reset"));
    }

    #[test]
    fn panic_payloads_become_detail() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
        let err = HttpError::from_panic(payload.as_ref());
        assert_eq!(err.message(), UNKNOWN_ERROR);
        assert_eq!(err.detail(), Some("handler panicked: boom"));
    }

    #[test]
    fn stamp_keeps_the_first_id() {
        let first = RequestId::new();
        let second = RequestId::new();
        let err = HttpError::not_found("x").stamp(&first).stamp(&second);
        assert_eq!(err.request_id(), Some(&first));
    }

    #[test]
    fn json_errors_are_client_faults() {
        let err: HttpError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.detail().is_some());
    }
}
