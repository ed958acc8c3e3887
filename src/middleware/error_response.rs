//! Error rendering.

use http::StatusCode;
use serde::Serialize;
use tracing::error;

use super::{Middleware, Next, REQUEST_ID_HEADER};
use crate::context::{RequestContext, RequestId};
use crate::fault::{Fault, HttpError, UNKNOWN_ERROR};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;
use crate::response::{IntoResponse, Json, Response};

/// JSON body of an error response.
///
/// ```json
/// {"message":"Book not found"}
/// {"message":"Unknown error","requestId":"0f1c…"}
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub message: &'a str,
    #[serde(rename = "requestId", skip_serializing_if = "Option::is_none")]
    pub request_id: Option<&'a str>,
}

/// Turns a failed outcome into a JSON response.
///
/// Client faults show the [`HttpError`]'s own message and no request id.
/// Server faults show [`UNKNOWN_ERROR`] plus the request id, which the user
/// can quote to support; their message and detail stay in the error log.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorResponse;

impl ErrorResponse {
    pub fn render(err: &HttpError) -> Response {
        let id = RequestContext::current_id().or_else(|| err.request_id().cloned());
        let body = match err.fault() {
            Fault::Client => ErrorBody { message: err.message(), request_id: None },
            Fault::Server => ErrorBody {
                message: UNKNOWN_ERROR,
                request_id: id.as_ref().map(RequestId::as_str),
            },
        };
        (err.status(), Json(body)).into_response()
    }
}

impl Middleware for ErrorResponse {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<Outcome> {
        Box::pin(async move {
            match next.run(req).await {
                Ok(res) => Ok(res),
                Err(err) => Ok(Self::render(&err)),
            }
        })
    }
}

/// What the pipeline answers when no stage rendered the error: a bare 500.
pub(crate) fn fallback(err: HttpError) -> Response {
    let id = err.request_id().cloned().or_else(RequestContext::current_id);
    error!(
        request_id = id.as_ref().map(RequestId::as_str),
        status = err.status().as_u16(),
        error = err.message(),
        detail = err.detail(),
        "unhandled request error"
    );
    let mut res = Response::builder()
        .status(StatusCode::INTERNAL_SERVER_ERROR)
        .text("Internal Server Error");
    if let Some(value) = id.and_then(|id| http::HeaderValue::from_str(id.as_str()).ok()) {
        res.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_of(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[tokio::test]
    async fn client_faults_omit_the_request_id() {
        let id = RequestId::new();
        let res = RequestContext::new(id)
            .scope(async { ErrorResponse::render(&HttpError::not_found("Book not found")) })
            .await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(&res), serde_json::json!({ "message": "Book not found" }));
    }

    #[tokio::test]
    async fn server_faults_carry_the_request_id() {
        let id = RequestId::new();
        let err = HttpError::internal(std::io::Error::other("pool exhausted"));
        let res = RequestContext::new(id.clone())
            .scope(async { ErrorResponse::render(&err) })
            .await;
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body_of(&res),
            serde_json::json!({ "message": UNKNOWN_ERROR, "requestId": id.as_str() })
        );
    }

    #[tokio::test]
    async fn explicit_server_messages_stay_out_of_the_body() {
        let id = RequestId::new();
        let err = HttpError::new(StatusCode::BAD_GATEWAY, "inventory service timed out");
        let res = RequestContext::new(id.clone())
            .scope(async { ErrorResponse::render(&err) })
            .await;
        assert_eq!(res.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_of(&res),
            serde_json::json!({ "message": UNKNOWN_ERROR, "requestId": id.as_str() })
        );
    }

    #[test]
    fn detail_never_reaches_the_body() {
        let err = HttpError::internal(std::io::Error::other("password=hunter2"));
        let res = ErrorResponse::render(&err);
        assert!(!String::from_utf8_lossy(res.body()).contains("hunter2"));
    }

    #[test]
    fn fallback_is_a_generic_500_with_the_stamped_id() {
        let id = RequestId::new();
        let res = fallback(HttpError::not_found("x").stamp(&id));
        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(res.headers()[REQUEST_ID_HEADER], id.as_str());
    }
}
