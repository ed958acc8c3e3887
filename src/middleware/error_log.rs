//! Error logging.

use tracing::{error, warn};

use super::{Middleware, Next};
use crate::context::{RequestContext, RequestId};
use crate::fault::{Fault, HttpError};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;

/// Records every failed outcome and passes it on untouched.
///
/// Server faults are logged at `error`, client faults at `warn`. The record
/// carries the internal detail (source chain, panic text) that the response
/// never shows.
///
/// Register it after [`ErrorResponse`](super::ErrorResponse) so it sees the
/// error before it is rendered.
#[derive(Clone, Copy, Debug, Default)]
pub struct ErrorLog;

impl Middleware for ErrorLog {
    fn handle(&self, req: Request, next: Next) -> BoxFuture<Outcome> {
        Box::pin(async move {
            let outcome = next.run(req).await;
            if let Err(err) = &outcome {
                record(err);
            }
            outcome
        })
    }
}

fn record(err: &HttpError) {
    let request_id = RequestContext::current_id().or_else(|| err.request_id().cloned());
    let request_id = request_id.as_ref().map(RequestId::as_str);
    let status = err.status().as_u16();

    match err.fault() {
        Fault::Server => error!(
            request_id,
            fault = %Fault::Server,
            status,
            error = err.message(),
            detail = err.detail(),
            "request failed"
        ),
        Fault::Client => warn!(
            request_id,
            fault = %Fault::Client,
            status,
            error = err.message(),
            detail = err.detail(),
            "request failed"
        ),
    }
}
