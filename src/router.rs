//! Radix-tree request router and the pipeline entry point.
//!
//! One tree per HTTP method. O(path-length) lookup. Middleware stages
//! registered with [`Router::layer`] wrap every route, outermost first.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures::FutureExt;
use http::Method;
use http_body_util::Full;
use matchit::Router as MatchitRouter;

use crate::config::PipelineConfig;
use crate::fault::HttpError;
use crate::handler::{BoxFuture, BoxedHandler, Handler, Outcome};
use crate::middleware::{
    self, BoxedMiddleware, Cors, ErrorLog, ErrorResponse, Middleware, Next, RequestIdStage,
    RequestLog,
};
use crate::request::Request;

/// The application router.
///
/// Build it once at startup and pass it to [`Server::serve`](crate::Server::serve).
/// Every registration returns `self` so calls chain naturally.
///
/// ```rust,no_run
/// # use sello::{HttpError, Request, Response, Router, config::PipelineConfig};
/// # async fn list_books(_: Request) -> Response { Response::text("") }
/// # async fn get_book(_: Request) -> Result<Response, HttpError> { Ok(Response::text("")) }
/// Router::new()
///     .get("/books",      list_books)
///     .get("/books/{id}", get_book)
///     .correlated(&PipelineConfig::default());
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    pub(crate) stack: Vec<BoxedMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new(), stack: Vec::new() }
    }

    /// Register a handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax; `req.param("name")` retrieves them.
    ///
    /// # Panics
    ///
    /// Panics if `path` is malformed or conflicts with an existing route.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Appends a middleware stage. Stages see the request in registration
    /// order and the outcome in reverse.
    pub fn layer(mut self, stage: impl Middleware) -> Self {
        self.stack.push(Arc::new(stage));
        self
    }

    /// Registers the standard correlation stack:
    /// request id, request log, CORS (when enabled), error response, error log.
    ///
    /// The request log sits outside CORS so preflights answered there are
    /// still logged. The error log sits innermost so it records an error
    /// before the response stage turns it into a body.
    pub fn correlated(self, config: &PipelineConfig) -> Self {
        let mut router = self.layer(RequestIdStage::new(config.request_id.policy));
        if config.request_log.enabled {
            router = router.layer(RequestLog::new(config.request_log.clone()));
        }
        if config.cors.enabled {
            router = router.layer(Cors::new(config.cors.clone()));
        }
        router.layer(ErrorResponse).layer(ErrorLog)
    }

    /// Runs one request through the pipeline and produces the wire response.
    ///
    /// This is what the [`Server`](crate::Server) calls per request; tests can
    /// call it directly without opening a socket.
    pub async fn handle<B>(self: Arc<Self>, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: hyper::body::Body,
        B::Error: std::error::Error,
    {
        let req = Request::from_http(req).await;
        match Next::new(self).run(req).await {
            Ok(res) => res.into_inner(),
            Err(err) => middleware::fallback(err).into_inner(),
        }
    }

    /// The innermost stage: route lookup and handler invocation.
    ///
    /// A panic inside the handler is caught here and surfaces as an
    /// unclassified server fault.
    pub(crate) fn endpoint(&self, mut req: Request) -> BoxFuture<Outcome> {
        if let Some(err) = req.rejection.take() {
            return Box::pin(std::future::ready(Err(err)));
        }
        let Some((handler, params)) = self.lookup(req.method(), req.path()) else {
            let err = if self.matches_other_method(req.method(), req.path()) {
                HttpError::method_not_allowed()
            } else {
                HttpError::not_found("Not found")
            };
            return Box::pin(std::future::ready(Err(err)));
        };
        req.params = params;

        Box::pin(async move {
            match AssertUnwindSafe(async move { handler.call(req).await })
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(panic) => Err(HttpError::from_panic(panic.as_ref())),
            }
        })
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    fn matches_other_method(&self, method: &Method, path: &str) -> bool {
        self.routes
            .iter()
            .any(|(m, tree)| m != method && tree.at(path).is_ok())
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use http::StatusCode;

    use super::*;
    use crate::request::fixture;

    async fn get_book(req: Request) -> String {
        format!("book {}", req.param("id").unwrap_or("?"))
    }

    async fn explode(_req: Request) -> &'static str {
        panic!("disk on fire")
    }

    fn router() -> Router {
        Router::new().get("/books/{id}", get_book).get("/explode", explode)
    }

    #[tokio::test]
    async fn params_reach_the_handler() {
        let res = router().endpoint(fixture(Method::GET, "/books/42", b"")).await.unwrap();
        assert_eq!(res.body(), b"book 42");
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let err = router().endpoint(fixture(Method::GET, "/authors", b"")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn wrong_method_is_not_allowed() {
        let err = router().endpoint(fixture(Method::DELETE, "/books/1", b"")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn panics_become_unclassified_server_faults() {
        let err = router().endpoint(fixture(Method::GET, "/explode", b"")).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message(), crate::fault::UNKNOWN_ERROR);
        assert_eq!(err.detail(), Some("handler panicked: disk on fire"));
    }

    #[tokio::test]
    async fn without_error_stages_the_fallback_is_a_generic_500() {
        let app = Arc::new(router());
        let req = http::Request::get("/explode").body(Full::new(Bytes::new())).unwrap();
        let res = app.handle(req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unreadable_body_is_rejected_before_routing() {
        let mut req = fixture(Method::GET, "/explode", b"");
        req.rejection = Some(HttpError::bad_request("Invalid request body"));
        let err = router().endpoint(req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic_at_startup() {
        let _ = Router::new().get("/books/{id}", get_book).get("/books/{name}", get_book);
    }
}
