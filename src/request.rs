//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::{HeaderMap, Method, request::Parts};
use http_body_util::BodyExt;

use crate::context::{RequestContext, RequestId};
use crate::fault::HttpError;

/// An incoming HTTP request with its body fully buffered.
pub struct Request {
    pub(crate) parts: Parts,
    pub(crate) body: Bytes,
    pub(crate) params: HashMap<String, String>,
    /// Set when the body could not be read. The route stage answers with it
    /// instead of calling the handler.
    pub(crate) rejection: Option<HttpError>,
}

impl Request {
    /// Buffers the body of a hyper/http request.
    ///
    /// A body that fails mid-read leaves the request empty with a pending
    /// `400`, so the failure still travels through the middleware stack.
    pub(crate) async fn from_http<B>(req: http::Request<B>) -> Self
    where
        B: hyper::body::Body,
        B::Error: std::error::Error,
    {
        let (parts, body) = req.into_parts();
        let (body, rejection) = match body.collect().await {
            Ok(collected) => (collected.to_bytes(), None),
            Err(e) => (
                Bytes::new(),
                Some(HttpError::bad_request("Invalid request body").with_detail(e.to_string())),
            ),
        };
        Self { parts, body, params: HashMap::new(), rejection }
    }

    pub fn method(&self) -> &Method { &self.parts.method }
    pub fn path(&self) -> &str { self.parts.uri.path() }
    pub fn query(&self) -> Option<&str> { self.parts.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.parts.headers }
    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup. Values that are not visible ASCII
    /// read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name)?.to_str().ok()
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/books/{id}`, `req.param("id")` on `/books/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    /// Deserializes the body as JSON. A malformed body is a client fault.
    pub fn json<T>(&self) -> Result<T, HttpError>
    where
        T: serde::de::DeserializeOwned,
    {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// The correlation id of the request being served.
    pub fn request_id(&self) -> Option<RequestId> {
        RequestContext::current_id()
    }

    pub(crate) fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.parts.headers.insert(name, value);
    }
}

#[cfg(test)]
pub(crate) fn fixture(method: Method, uri: &str, body: &'static [u8]) -> Request {
    let (parts, ()) = http::Request::builder()
        .method(method)
        .uri(uri)
        .body(())
        .unwrap()
        .into_parts();
    Request { parts, body: Bytes::from_static(body), params: HashMap::new(), rejection: None }
}
