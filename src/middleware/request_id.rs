//! Correlation id minting.

use http::header::{HeaderName, HeaderValue};
use tracing::{Instrument, info_span};

use super::{Middleware, Next};
use crate::context::{RequestContext, RequestId};
use crate::handler::{BoxFuture, Outcome};
use crate::request::Request;

/// Header carrying the correlation id in both directions.
pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// What to do with an `x-request-id` the client already sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum IdPolicy {
    /// Ignore it and mint a fresh id. Use at the edge of your network.
    #[default]
    Mint,
    /// Reuse it when it is well-formed, so a trusted upstream hop's logs join
    /// up with ours. Malformed values are replaced by a fresh id.
    Trust,
}

impl IdPolicy {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mint" => Some(Self::Mint),
            "trust" => Some(Self::Trust),
            _ => None,
        }
    }
}

/// Mints the request's correlation id and runs the rest of the pipeline
/// inside its [`RequestContext`].
///
/// The id is written to the inbound `x-request-id` header (so later stages
/// can read it uniformly), to every outgoing response, and to any error on
/// its way back out. Everything downstream also runs inside a `request`
/// tracing span carrying `request_id`.
///
/// Register it first: stages before it run without a context.
#[derive(Clone, Debug, Default)]
pub struct RequestIdStage {
    policy: IdPolicy,
}

impl RequestIdStage {
    pub fn new(policy: IdPolicy) -> Self {
        Self { policy }
    }

    fn resolve(&self, req: &Request) -> RequestId {
        match self.policy {
            IdPolicy::Mint => RequestId::new(),
            IdPolicy::Trust => req
                .header(REQUEST_ID_HEADER.as_str())
                .and_then(RequestId::from_inbound)
                .unwrap_or_default(),
        }
    }
}

impl Middleware for RequestIdStage {
    fn handle(&self, mut req: Request, next: Next) -> BoxFuture<Outcome> {
        let id = self.resolve(&req);
        let ctx = RequestContext::new(id.clone());

        // Both minted and validated inbound ids are plain visible ASCII.
        let value = HeaderValue::from_str(id.as_str()).ok();
        if let Some(value) = &value {
            req.set_header(REQUEST_ID_HEADER, value.clone());
        }

        let span = info_span!("request", request_id = %id);
        Box::pin(
            async move {
                match ctx.scope(next.run(req)).await {
                    Ok(mut res) => {
                        if let Some(value) = value {
                            res.headers_mut().insert(REQUEST_ID_HEADER, value);
                        }
                        Ok(res)
                    }
                    Err(err) => Err(err.stamp(&id)),
                }
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use http_body_util::{BodyExt, Full};

    use super::*;
    use crate::Router;

    async fn echo_id(req: Request) -> String {
        tokio::task::yield_now().await;
        let from_ctx = RequestContext::current_id().map(|id| id.to_string());
        let from_header = req.header("x-request-id").map(str::to_owned);
        assert_eq!(from_ctx, from_header);
        from_ctx.unwrap_or_default()
    }

    fn app(policy: IdPolicy) -> Arc<Router> {
        Arc::new(Router::new().get("/", echo_id).layer(RequestIdStage::new(policy)))
    }

    async fn call(app: &Arc<Router>, inbound: Option<&str>) -> (String, String) {
        let mut req = http::Request::get("/");
        if let Some(id) = inbound {
            req = req.header("x-request-id", id);
        }
        let res = Arc::clone(app).handle(req.body(Full::new(Bytes::new())).unwrap()).await;
        let header = res.headers()["x-request-id"].to_str().unwrap().to_owned();
        let body = res.into_body().collect().await.unwrap().to_bytes();
        (header, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn header_body_and_context_agree() {
        let (header, body) = call(&app(IdPolicy::Mint), None).await;
        assert_eq!(header, body);
        assert_eq!(header.len(), 36);
    }

    #[tokio::test]
    async fn mint_ignores_inbound_ids() {
        let (header, _) = call(&app(IdPolicy::Mint), Some("upstream-1")).await;
        assert_ne!(header, "upstream-1");
    }

    #[tokio::test]
    async fn trust_reuses_well_formed_inbound_ids() {
        let (header, body) = call(&app(IdPolicy::Trust), Some("upstream-1")).await;
        assert_eq!(header, "upstream-1");
        assert_eq!(body, "upstream-1");
    }

    #[tokio::test]
    async fn trust_replaces_malformed_inbound_ids() {
        let (header, _) = call(&app(IdPolicy::Trust), Some("<script>")).await;
        assert_ne!(header, "<script>");
        assert!(RequestId::from_inbound(&header).is_some());
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!(IdPolicy::parse("Trust"), Some(IdPolicy::Trust));
        assert_eq!(IdPolicy::parse(" mint "), Some(IdPolicy::Mint));
        assert_eq!(IdPolicy::parse("sometimes"), None);
    }
}
