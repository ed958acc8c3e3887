//! Per-request ambient context.
//!
//! Every request that passes the [`RequestIdStage`](crate::middleware::RequestIdStage)
//! runs inside a [`tokio::task_local!`] scope holding its [`RequestContext`].
//! Code anywhere below that point (handlers, helpers, repository calls) can
//! read the current request's id without it being threaded through function
//! arguments:
//!
//! ```rust
//! use sello::context::RequestContext;
//!
//! async fn load_book(id: u32) {
//!     if let Some(ctx) = RequestContext::current() {
//!         tracing::debug!(request_id = %ctx.id(), book = id, "loading book");
//!     }
//! }
//! ```
//!
//! The scope belongs to the task, not the thread. Two requests interleaved on
//! one worker thread each see only their own context, and code running
//! outside any request sees `None`, never a stale id.
//!
//! `tokio::spawn` starts a fresh task with no scope. Use [`spawn`] when
//! background work should stay attributed to the request that started it.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Longest inbound id accepted under [`IdPolicy::Trust`](crate::middleware::IdPolicy::Trust).
pub const MAX_INBOUND_ID_LEN: usize = 128;

tokio::task_local! {
    static CURRENT: RequestContext;
}

// ── RequestId ────────────────────────────────────────────────────────────────

/// An opaque, per-request correlation identifier.
///
/// Freshly minted ids are random (v4) UUIDs in hyphenated form. The value is
/// reference-counted so cloning into log fields, headers, and error values
/// does not copy the string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Mints a new 122-bit random identifier.
    ///
    /// Panics only if the operating system's entropy source is unavailable,
    /// which is treated as fatal for the process.
    pub fn new() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string().into())
    }

    /// Accepts an identifier supplied by an upstream hop.
    ///
    /// Returns `None` unless `raw` is 1 to [`MAX_INBOUND_ID_LEN`] characters
    /// drawn from `[A-Za-z0-9._:-]`. Anything else could smuggle control
    /// characters or separators into log lines.
    pub fn from_inbound(raw: &str) -> Option<Self> {
        let valid_len = !raw.is_empty() && raw.len() <= MAX_INBOUND_ID_LEN;
        let valid_chars = raw
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-'));
        (valid_len && valid_chars).then(|| Self(raw.into()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl AsRef<str> for RequestId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── RequestContext ───────────────────────────────────────────────────────────

/// The immutable record created when a request enters the pipeline.
///
/// Exactly one exists per request. It has no setters: once minted the id
/// cannot change mid-request.
#[derive(Clone, Debug)]
pub struct RequestContext {
    id: RequestId,
    received_at: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(id: RequestId) -> Self {
        Self { id, received_at: Utc::now() }
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// The context of the request the calling task is serving, or `None`
    /// outside any request scope.
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// Shorthand for `RequestContext::current().map(|c| c.id().clone())`.
    pub fn current_id() -> Option<RequestId> {
        CURRENT.try_with(|ctx| ctx.id.clone()).ok()
    }

    /// Runs `fut` with `self` as the ambient context. The scope ends when
    /// `fut` completes or is dropped.
    pub async fn scope<F>(self, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT.scope(self, fut).await
    }
}

/// Spawns `fut` on the runtime, carrying the caller's request context (if
/// any) into the new task.
pub fn spawn<F>(fut: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match RequestContext::current() {
        Some(ctx) => tokio::spawn(CURRENT.scope(ctx, fut)),
        None => tokio::spawn(fut),
    }
}
