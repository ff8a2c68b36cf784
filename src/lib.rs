//! # gatehouse
//!
//! The request pipeline that sits between a hyper server and your business
//! functions. For every routed request it:
//!
//! 1. builds one [`RequestContext`] (trace id, tokens, caller identity);
//! 2. classifies the request into an access tier and resolves the caller
//!    through your [`IdentityProvider`];
//! 3. binds the payload from the query string or JSON body and checks its
//!    declared field rules;
//! 4. calls the business function;
//! 5. writes exactly one [`Envelope`] `{ code, message, data }` back,
//!    even when a stage fails or the business function panics.
//!
//! ## What it leaves to others
//!
//! TLS, CORS, rate limiting, metrics and body-size limits belong to the proxy
//! or to other layers. Identity checks belong to the embedding application.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//!
//! use gatehouse::{
//!     AppError, BoxFuture, CallerIdentity, Config, Envelope, IdentityProvider, LogLevel,
//!     Pipeline, RequestContext, Route, Router, Server, Validate,
//! };
//! use gatehouse::validate::{Rule, Schema};
//!
//! struct Accounts;
//!
//! impl IdentityProvider for Accounts {
//!     fn check_api<'a>(&'a self, _: &'a RequestContext, token: &'a str, _: &'a str)
//!         -> BoxFuture<'a, Result<CallerIdentity, AppError>> {
//!         Box::pin(async move {
//!             if token == "abc" { Ok(CallerIdentity::user(42)) } else { Err(AppError::msg("bad token")) }
//!         })
//!     }
//!     fn check_share<'a>(&'a self, _: &'a RequestContext, _: &'a HashMap<String, String>)
//!         -> BoxFuture<'a, Result<CallerIdentity, AppError>> {
//!         Box::pin(async { Ok(CallerIdentity::anonymous()) })
//!     }
//!     fn check_private<'a>(&'a self, _: &'a RequestContext, uid: i64)
//!         -> BoxFuture<'a, Result<CallerIdentity, AppError>> {
//!         Box::pin(async move { Ok(CallerIdentity::user(uid)) })
//!     }
//! }
//!
//! #[derive(serde::Deserialize)]
//! struct NewOrder { amount: Option<i64> }
//!
//! impl Validate for NewOrder {
//!     fn schema() -> Schema<Self> {
//!         Schema::<Self>::new("NewOrder")
//!             .field("amount", |o| o.amount.into(), [Rule::Required])
//!             .message("amount required")
//!     }
//! }
//!
//! fn create_order(ctx: &mut RequestContext, req: NewOrder) -> BoxFuture<'_, Envelope<i64>> {
//!     Box::pin(async move { Envelope::ok(req.amount.unwrap_or_default() + ctx.uid()) })
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let router = Router::new().group("/api", |g| {
//!         g.post(Route::new("/order", create_order).log_level(LogLevel::ALL));
//!     });
//!     let pipeline = Pipeline::new(Config::from_env(), Accounts, router);
//!     Server::bind("0.0.0.0:3000").serve(pipeline).await.unwrap();
//! }
//! ```

mod bind;
mod config;
mod context;
mod envelope;
mod error;
mod handler;
mod health;
mod pipeline;
mod request;
mod response;
mod route;
mod router;
mod server;

pub mod middleware;
pub mod validate;

pub use bind::{bind, to_envelope as bind_error_envelope};
pub use config::{Config, HeaderNames, PROFILE_ENV, Profile, TierPatterns};
pub use context::{CallerIdentity, LOCAL_TRACE_SUFFIX, RequestContext};
pub use envelope::{Envelope, code};
pub use error::{ARGS_INVALID, AppError, AuthError, BindError, Error};
pub use handler::{BoxFuture, Handler};
pub use middleware::access_log::LogLevel;
pub use middleware::identity::{IdentityProvider, Tier};
pub use middleware::recover::Fault;
pub use pipeline::{LevelOverride, Pipeline};
pub use request::Request;
pub use response::Response;
pub use route::{Abort, Route, Stage};
pub use router::{Group, Router};
pub use server::Server;
pub use validate::{RuleTable, Validate};
