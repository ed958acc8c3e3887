//! Minimal CORS handling so browser scripts can read the correlation id.

use http::header::{self, HeaderValue};
use http::{Method, StatusCode};

use super::{Middleware, Next, REQUEST_ID_HEADER, fallback};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::response::Response;

/// CORS configuration.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Exact origins, or `"*"` for any.
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    /// Request headers a browser may send. `x-request-id` is always added.
    pub allowed_headers: Vec<String>,
    pub max_age_seconds: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: vec!["*".to_owned()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE"].map(str::to_owned).to_vec(),
            allowed_headers: vec!["content-type".to_owned()],
            max_age_seconds: 3600,
        }
    }
}

/// Answers preflight requests and decorates responses for allowed origins.
///
/// `x-request-id` is placed in both `access-control-allow-headers` and
/// `access-control-expose-headers`; without the latter a browser hides the
/// header from script even though it arrived.
///
/// An `Err` that reaches this stage unrendered (no
/// [`ErrorResponse`](super::ErrorResponse) registered inside it) is turned
/// into the pipeline's generic 500 here, so that response is decorated too.
#[derive(Clone, Debug)]
pub struct Cors {
    config: CorsConfig,
    allow_headers: HeaderValue,
    allow_methods: HeaderValue,
}

impl Cors {
    pub fn new(config: CorsConfig) -> Self {
        let mut headers = config.allowed_headers.clone();
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(REQUEST_ID_HEADER.as_str())) {
            headers.push(REQUEST_ID_HEADER.as_str().to_owned());
        }
        let allow_headers = HeaderValue::from_str(&headers.join(", "))
            .unwrap_or_else(|_| HeaderValue::from_static("content-type, x-request-id"));
        let allow_methods = HeaderValue::from_str(&config.allowed_methods.join(", "))
            .unwrap_or_else(|_| HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE"));
        Self { config, allow_headers, allow_methods }
    }

    /// The `access-control-allow-origin` value for `origin`, if allowed.
    fn allow_origin(&self, origin: &str) -> Option<HeaderValue> {
        let origins = &self.config.allowed_origins;
        if origins.iter().any(|o| o == "*") {
            Some(HeaderValue::from_static("*"))
        } else if origins.iter().any(|o| o == origin) {
            HeaderValue::from_str(origin).ok()
        } else {
            None
        }
    }

    fn preflight(&self, allow_origin: Option<HeaderValue>) -> Response {
        let mut res = Response::status(StatusCode::NO_CONTENT);
        if let Some(origin) = allow_origin {
            let headers = res.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
            headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.config.max_age_seconds.into());
            headers.insert(header::VARY, HeaderValue::from_static("origin"));
        }
        res
    }
}

impl Middleware for Cors {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<Outcome> {
        let Some(origin) = req.header(header::ORIGIN.as_str()) else {
            return next.run(req);
        };
        let allow_origin = self.allow_origin(origin);

        let is_preflight = req.method() == Method::OPTIONS
            && req.headers().contains_key(header::ACCESS_CONTROL_REQUEST_METHOD);
        if is_preflight {
            return Box::pin(std::future::ready(Ok(self.preflight(allow_origin))));
        }

        let fut = next.run(req);
        Box::pin(async move {
            let outcome = fut.await;
            let Some(origin) = allow_origin else {
                return outcome;
            };
            let mut res = outcome.unwrap_or_else(fallback);
            let headers = res.headers_mut();
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
            headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, HeaderValue::from(REQUEST_ID_HEADER));
            headers.insert(header::VARY, HeaderValue::from_static("origin"));
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use http_body_util::Full;

    use super::*;
    use crate::Router;
    use crate::fault::HttpError;
    use crate::middleware::{IdPolicy, RequestIdStage};

    fn app(origins: &[&str]) -> Arc<Router> {
        let config = CorsConfig {
            enabled: true,
            allowed_origins: origins.iter().map(|o| (*o).to_owned()).collect(),
            ..CorsConfig::default()
        };
        Arc::new(Router::new().get("/books", |_req: Request| async { "[]" }).layer(Cors::new(config)))
    }

    #[tokio::test]
    async fn exposes_the_request_id_header() {
        let req = http::Request::get("/books")
            .header("origin", "https://shelf.example")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let res = app(&["https://shelf.example"]).handle(req).await;
        assert_eq!(res.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "https://shelf.example");
        assert_eq!(res.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS], "x-request-id");
    }

    #[tokio::test]
    async fn preflight_allows_the_request_id_header() {
        let req = http::Request::builder()
            .method(Method::OPTIONS)
            .uri("/books")
            .header("origin", "https://shelf.example")
            .header("access-control-request-method", "GET")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let res = app(&["*"]).handle(req).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let allowed = res.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS].to_str().unwrap();
        assert!(allowed.contains("x-request-id"));
    }

    #[tokio::test]
    async fn unrendered_errors_still_expose_the_request_id() {
        let config = CorsConfig { enabled: true, ..CorsConfig::default() };
        let offline = |_req: Request| async { Err::<&str, _>(HttpError::server("shelf offline")) };
        let app = Arc::new(
            Router::new()
                .get("/books", offline)
                .layer(RequestIdStage::new(IdPolicy::Mint))
                .layer(Cors::new(config)),
        );
        let req = http::Request::get("/books")
            .header("origin", "https://shelf.example")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let res = app.handle(req).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers()[header::ACCESS_CONTROL_EXPOSE_HEADERS], "x-request-id");
        assert!(res.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn unknown_origins_get_no_cors_headers() {
        let req = http::Request::get("/books")
            .header("origin", "https://evil.example")
            .body(Full::new(Bytes::new()))
            .unwrap();
        let res = app(&["https://shelf.example"]).handle(req).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(!res.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }
}
