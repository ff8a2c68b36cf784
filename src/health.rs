//! Built-in health check.
//!
//! A load balancer or Kubernetes probe asks one question: can this process
//! answer HTTP at all? The health path is answered before routing, without
//! identity resolution, so a broken identity backend never fails the probe.
//!
//! | Path | Response |
//! |---|---|
//! | [`Config::health_path`](crate::Config) (default `/health`) | `200 OK`, JSON body `"ok"` |

use tracing::info;

use crate::context::RequestContext;
use crate::response::Response;

/// Answers the health probe.
pub(crate) fn respond(ctx: &RequestContext) -> Response {
    info!(local_trace = ctx.is_local_trace(), "health check");
    Response::json(&b"\"ok\""[..])
}
