//! Built-in health-check handlers.
//!
//! | Probe | Path | Question |
//! |---|---|---|
//! | **Liveness** | `/healthz` | Is the process alive? Failure means restart. |
//! | **Readiness** | `/readyz` | Can the process serve traffic? Failure means pull from the load balancer. |
//!
//! ```rust,no_run
//! use sello::{Router, health};
//!
//! let app = Router::new()
//!     .get("/healthz", health::liveness)
//!     .get("/readyz", health::readiness);
//! ```
//!
//! Probes pass through the pipeline like any other route, so they get a
//! request id and an access-log record too.

use crate::{Request, Response};

/// Always `200 OK` with body `"ok"`.
pub async fn liveness(_req: Request) -> Response {
    Response::text("ok")
}

/// `200 OK` with body `"ready"`. Replace it with your own handler if
/// readiness depends on downstream services.
pub async fn readiness(_req: Request) -> Response {
    Response::text("ready")
}
