//! Route descriptors and the per-request dispatcher.
//!
//! A routed request moves through these states:
//!
//! ```text
//! Start ──identity──▶ Authenticated ──bind──▶ Bound ──callback──▶ Executed ──▶ Responded
//!   │                     │                     │
//!   └─────────────────────┴─────────────────────┴──────────▶ Aborted
//! ```
//!
//! Each stage returns `Result<_, Abort>`; the first `Err` skips every later
//! stage and its envelope becomes the response. Exactly one response value is
//! produced per request, whichever state it ends in.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::bind;
use crate::context::RequestContext;
use crate::envelope::Envelope;
use crate::handler::{BoxFuture, ErasedRoute, Handler};
use crate::middleware::access_log::{self, LogLevel};
use crate::middleware::identity;
use crate::middleware::recover::{self, Fault};
use crate::pipeline::Shared;
use crate::request::Request;
use crate::response::Response;
use crate::validate::{RuleTable, Validate};

/// Where a request is in the dispatch sequence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Start,
    Authenticated,
    Bound,
    Executed,
    Responded,
    Aborted,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start         => "start",
            Self::Authenticated => "authenticated",
            Self::Bound         => "bound",
            Self::Executed      => "executed",
            Self::Responded     => "responded",
            Self::Aborted       => "aborted",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Short-circuit: the stage that failed and the envelope to send instead.
#[derive(Debug)]
pub struct Abort {
    pub from: Stage,
    pub envelope: Envelope<()>,
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// Per-route configuration, fixed at registration.
///
/// ```rust
/// use gatehouse::{BoxFuture, Envelope, LogLevel, RequestContext, Route, Validate};
///
/// #[derive(serde::Deserialize)]
/// struct Profile {}
/// impl Validate for Profile {}
///
/// fn profile(ctx: &mut RequestContext, _req: Profile) -> BoxFuture<'_, Envelope<i64>> {
///     Box::pin(async move { Envelope::ok(ctx.uid()) })
/// }
///
/// let route = Route::new("/profile", profile)
///     .roles(["member"])
///     .log_level(LogLevel::ALL);
/// ```
pub struct Route<T, V> {
    pub(crate) path: String,
    login_exempt: bool,
    roles: Vec<String>,
    products: Vec<i64>,
    log_level: LogLevel,
    not_log_sql: bool,
    handler: Arc<dyn Handler<T, V>>,
}

impl<T, V> Route<T, V>
where
    T: DeserializeOwned + Validate,
    V: Serialize + Send + 'static,
{
    /// A route at `path` (relative to its group) with the default policy:
    /// login required, no role or product restriction, log level `NONE`.
    pub fn new(path: impl Into<String>, handler: impl Handler<T, V>) -> Self {
        Self {
            path: path.into(),
            login_exempt: false,
            roles: Vec::new(),
            products: Vec::new(),
            log_level: LogLevel::NONE,
            not_log_sql: false,
            handler: Arc::new(handler),
        }
    }

    /// Skips identity resolution entirely.
    pub fn login_exempt(mut self) -> Self {
        self.login_exempt = true;
        self
    }

    pub fn roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn products(mut self, products: impl IntoIterator<Item = i64>) -> Self {
        self.products = products.into_iter().collect();
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Marks the request so data-access layers skip SQL logging.
    pub fn no_sql_log(mut self) -> Self {
        self.not_log_sql = true;
        self
    }

    /// Compiles the payload rules and erases the payload and result types.
    pub(crate) fn compile(self) -> RouteEntry<T, V> {
        RouteEntry { rules: RuleTable::compile(), route: self, _types: PhantomData }
    }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────

pub(crate) struct RouteEntry<T, V> {
    route: Route<T, V>,
    rules: RuleTable<T>,
    _types: PhantomData<fn() -> (T, V)>,
}

impl<T, V> RouteEntry<T, V>
where
    T: DeserializeOwned + Validate,
    V: Serialize + Send + 'static,
{
    /// Start → Authenticated → Bound → Executed.
    async fn stages(
        &self,
        shared: &Shared,
        ctx: &mut RequestContext,
        req: &Request,
        level: LogLevel,
    ) -> Result<V, Abort> {
        let route = &self.route;
        let cfg = &shared.config;

        let tier = identity::resolve(
            shared.identity.as_ref(),
            &cfg.tiers,
            &cfg.headers.share_token,
            ctx,
            req,
            route.login_exempt,
        )
        .await
        .map_err(|e| abort(Stage::Start, &e, e.to_envelope()))?;

        if !route.login_exempt {
            identity::authorize(&ctx.identity, &route.roles, &route.products)
                .map_err(|e| abort(Stage::Start, &e, e.to_envelope()))?;
        }
        ctx.identity.skip_sql_log = route.not_log_sql;
        tracing::debug!(%tier, uid = ctx.uid(), "caller resolved");

        let bound = bind::bind(req, &self.rules);
        access_log::before(ctx, req, level);
        let payload = bound
            .map_err(|e| abort(Stage::Authenticated, &e, bind::to_envelope(&e, &self.rules)))?;

        Ok(route.handler.call(ctx, payload).await)
    }

    /// Runs the stages and writes the exit record, whichever state they end in.
    async fn run(&self, shared: &Shared, ctx: &mut RequestContext, req: &Request) -> Response {
        let dispatch_start = Instant::now();
        let profile = shared.config.profile;
        let level = shared.log_level(ctx, req.path(), self.route.log_level);

        let finished = recover::catch(self.stages(shared, ctx, req, level)).await;
        let (response, outcome) = match finished {
            Ok(Ok(value)) => match serde_json::to_vec(&value) {
                Ok(bytes) => (Response::json(bytes), Stage::Responded),
                Err(e) => {
                    error!("serialize result: {e}");
                    let fault = Fault::Error(Box::new(e));
                    (Response::serialize(&fault.to_envelope(profile)), Stage::Aborted)
                }
            },
            Ok(Err(abort)) => (Response::serialize(&abort.envelope), Stage::Aborted),
            Err(fault) => (recover::respond(&fault, profile), Stage::Aborted),
        };

        access_log::after(ctx, response.body(), dispatch_start, level, outcome.as_str());
        response
    }
}

impl<T, V> ErasedRoute for RouteEntry<T, V>
where
    T: DeserializeOwned + Validate,
    V: Serialize + Send + 'static,
{
    fn dispatch<'a>(
        &'a self,
        shared: &'a Shared,
        ctx: &'a mut RequestContext,
        req: &'a Request,
    ) -> BoxFuture<'a, Response> {
        Box::pin(self.run(shared, ctx, req))
    }
}

fn abort(from: Stage, cause: &dyn fmt::Display, envelope: Envelope<()>) -> Abort {
    info!(stage = %from, "request aborted: {cause}");
    Abort { from, envelope }
}
