//! The request pipeline.
//!
//! ```text
//! http request
//!   └─ build RequestContext (once) ── request span { trace_id, method, path }
//!        └─ health path?  ──────────────────────────────▶ "ok"
//!        └─ route lookup  ── miss ─────────────────────▶ 404 (405 if another method matches)
//!        └─ contain(panics) ┐
//!             identity → authorize → bind → enter log → callback → exit log
//!                                                       ▼
//!                                               one Envelope response
//! ```
//!
//! [`Pipeline`] owns everything a request needs that outlives it: the router,
//! the [`Config`], and the application's [`IdentityProvider`]. All of it is
//! fixed at construction and shared read-only across requests.

use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::Full;
use tracing::{Instrument, info_span};

use crate::config::Config;
use crate::context::RequestContext;
use crate::health;
use crate::middleware::access_log::LogLevel;
use crate::middleware::identity::IdentityProvider;
use crate::middleware::recover;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// Per-request log level hook: `(ctx, path, route level) -> level`.
pub type LevelOverride = Arc<dyn Fn(&RequestContext, &str, LogLevel) -> LogLevel + Send + Sync>;

/// State every route dispatch reads.
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) identity: Arc<dyn IdentityProvider>,
    level_override: Option<LevelOverride>,
}

impl Shared {
    pub(crate) fn log_level(&self, ctx: &RequestContext, path: &str, level: LogLevel) -> LogLevel {
        match &self.level_override {
            Some(f) => f(ctx, path, level),
            None => level,
        }
    }
}

/// Router + configuration + identity checks, ready to serve.
pub struct Pipeline {
    router: Router,
    shared: Shared,
}

impl Pipeline {
    pub fn new(config: Config, identity: impl IdentityProvider, router: Router) -> Self {
        Self {
            router,
            shared: Shared { config, identity: Arc::new(identity), level_override: None },
        }
    }

    /// Lets the application adjust a route's log level per request.
    pub fn log_level_override(
        mut self,
        f: impl Fn(&RequestContext, &str, LogLevel) -> LogLevel + Send + Sync + 'static,
    ) -> Self {
        self.shared.level_override = Some(Arc::new(f));
        self
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Runs one request through the pipeline without a socket.
    pub async fn handle(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        self.respond(Request::from(req)).await.into_inner()
    }

    pub(crate) async fn respond(&self, mut req: Request) -> Response {
        let config = &self.shared.config;
        let mut ctx = RequestContext::build(&req, &config.headers);
        let span = info_span!(
            "request",
            trace_id = %ctx.trace_id(),
            method = %req.method(),
            path = req.path(),
        );

        async move {
            if req.path() == config.health_path {
                return health::respond(&ctx);
            }

            let Some((route, params)) = self.router.lookup(req.method(), req.path()) else {
                return if self.router.allows_other(req.method(), req.path()) {
                    Response::status(StatusCode::METHOD_NOT_ALLOWED)
                } else {
                    Response::status(StatusCode::NOT_FOUND)
                };
            };
            req.params = params;

            let chain = route.dispatch(&self.shared, &mut ctx, &req);
            recover::contain(chain, config.profile).await
        }
        .instrument(span)
        .await
    }
}
