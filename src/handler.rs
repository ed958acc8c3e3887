//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! The router holds handlers of *different* types in a single
//! `HashMap<Method, Tree>`, so each one is hidden behind a trait object
//! (`dyn ErasedHandler`) and stored uniformly:
//!
//! ```text
//! async fn get_book(req: Request) -> Result<Json<Book>, HttpError>   ← user writes this
//!        ↓ router.get("/books/{id}", get_book)
//! get_book.into_boxed_handler()                       ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(get_book))                       ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time                  ← one vtable dispatch
//!        ↓
//! Box::pin(async { get_book(req).await.into_outcome() })  ← BoxFuture<Outcome>
//! ```
//!
//! Every handler, whether it returns a plain response or a `Result`, ends up
//! producing an [`Outcome`]. That is the value the middleware pipeline passes
//! from stage to stage.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::fault::HttpError;
use crate::request::Request;
use crate::response::{IntoResponse, Response};

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` let tokio move the future across worker threads.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// What every handler and every middleware stage resolves to.
pub type Outcome = Result<Response, HttpError>;

// ── IntoOutcome ───────────────────────────────────────────────────────────────

/// Conversion of a handler's return value into an [`Outcome`].
///
/// Anything that is [`IntoResponse`] succeeds; a `Result` whose error
/// converts into [`HttpError`] fails with that error.
pub trait IntoOutcome {
    fn into_outcome(self) -> Outcome;
}

impl<T: IntoResponse> IntoOutcome for T {
    fn into_outcome(self) -> Outcome {
        Ok(self.into_response())
    }
}

impl<T, E> IntoOutcome for Result<T, E>
where
    T: IntoResponse,
    E: Into<HttpError>,
{
    fn into_outcome(self) -> Outcome {
        self.map(IntoResponse::into_response).map_err(Into::into)
    }
}

// ── Internal types ────────────────────────────────────────────────────────────

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture<Outcome>;
}

/// A type-erased handler shared across concurrent requests.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Public Handler trait ──────────────────────────────────────────────────────

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is automatically satisfied for any
/// `async fn` with the signature:
///
/// ```text
/// async fn name(req: Request) -> impl IntoOutcome
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, Fut, R> private::Sealed for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
}

impl<F, Fut, R> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

// ── Concrete wrapper ──────────────────────────────────────────────────────────

/// Bridges a concrete handler `F` to [`ErasedHandler`].
struct FnHandler<F>(F);

impl<F, Fut, R> ErasedHandler for FnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoOutcome + Send + 'static,
{
    fn call(&self, req: Request) -> BoxFuture<Outcome> {
        let fut = (self.0)(req);
        Box::pin(async move { fut.await.into_outcome() })
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;
    use crate::request::fixture;

    async fn ok(_req: Request) -> &'static str {
        "ok"
    }

    async fn missing(_req: Request) -> Result<String, HttpError> {
        Err(HttpError::not_found("Book not found"))
    }

    #[tokio::test]
    async fn plain_responses_succeed() {
        let handler = ok.into_boxed_handler();
        let res = handler.call(fixture(Method::GET, "/", b"")).await.unwrap();
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.body(), b"ok");
    }

    #[tokio::test]
    async fn errors_pass_through_untouched() {
        let handler = missing.into_boxed_handler();
        let err = handler.call(fixture(Method::GET, "/", b"")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.message(), "Book not found");
    }
}
