//! Middleware pipeline.
//!
//! A stage receives the request and a [`Next`] handle to the rest of the
//! pipeline. It may inspect or mutate the request, call `next.run(req)`
//! (at most once), and inspect or replace the resulting [`Outcome`]:
//!
//! ```text
//! RequestIdStage → RequestLog → Cors → ErrorResponse → ErrorLog → route handler
//!      ↑ sees Ok(response) with the error already rendered      ↓ Err(HttpError)
//! ```
//!
//! Errors travel back up as plain `Err` values, so a stage that only wants
//! to observe failures matches on the outcome and returns it unchanged.
//! Stages hold no per-request state of their own; anything that belongs to
//! one request lives in its [`RequestContext`](crate::context::RequestContext).
//!
//! Built-in stages:
//! - [`RequestIdStage`] mints the correlation id and opens the context scope
//! - [`RequestLog`] logs receipt and completion of each request
//! - [`ErrorLog`] logs failures with their full detail
//! - [`ErrorResponse`] renders failures as `{"message", "requestId"?}`
//! - [`Cors`] exposes the id header to browser scripts
//!
//! Ad-hoc stages can be written as closures with [`from_fn`].

mod cors;
mod error_log;
mod error_response;
mod request_id;
mod request_log;

use std::future::Future;
use std::sync::Arc;

pub use cors::{Cors, CorsConfig};
pub use error_log::ErrorLog;
pub use error_response::{ErrorBody, ErrorResponse};
pub(crate) use error_response::fallback;
pub use request_id::{IdPolicy, REQUEST_ID_HEADER, RequestIdStage};
pub use request_log::{RequestLog, RequestLogConfig};

use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::router::Router;

/// One stage of the request pipeline.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<Outcome>;
}

pub(crate) type BoxedMiddleware = Arc<dyn Middleware>;

/// The remainder of the pipeline after the current stage.
pub struct Next {
    router: Arc<Router>,
    index: usize,
}

impl Next {
    pub(crate) fn new(router: Arc<Router>) -> Self {
        Self { router, index: 0 }
    }

    /// Passes the request to the next stage, or to the route handler once
    /// the stack is exhausted.
    pub fn run(self, req: Request) -> BoxFuture<Outcome> {
        let stage = self.router.stack.get(self.index).cloned();
        match stage {
            Some(stage) => {
                let next = Self { router: self.router, index: self.index + 1 };
                stage.handle(req, next)
            }
            None => self.router.endpoint(req),
        }
    }
}

/// Adapts an async closure into a [`Middleware`].
///
/// ```rust
/// use sello::{Router, middleware};
///
/// let app = Router::new().layer(middleware::from_fn(|req, next| async move {
///     let mut outcome = next.run(req).await;
///     if let Ok(res) = &mut outcome {
///         res.headers_mut().insert("x-powered-by", "sello".parse().unwrap());
///     }
///     outcome
/// }));
/// ```
pub fn from_fn<F, Fut>(f: F) -> FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    FromFn(f)
}

/// See [`from_fn`].
pub struct FromFn<F>(F);

impl<F, Fut> Middleware for FromFn<F>
where
    F: Fn(Request, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    fn handle(&self, req: Request, next: Next) -> BoxFuture<Outcome> {
        Box::pin((self.0)(req, next))
    }
}
