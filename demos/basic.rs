//! Minimal gatehouse example: one route per access tier plus the health probe.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/health
//!   curl -H 'token: abc' http://localhost:3000/api/profile
//!   curl 'http://localhost:3000/share/doc?shareToken=xyz&id=7'
//!   curl -X POST http://localhost:3000/private/order \
//!        -H 'private-uid: 42' -H 'content-type: application/json' \
//!        -d '{"amount":3,"currency":"EUR"}'
//!   curl http://localhost:3000/public/news

use std::collections::HashMap;

use gatehouse::validate::{Rule, Schema};
use gatehouse::{
    AppError, BoxFuture, CallerIdentity, Config, Envelope, IdentityProvider, LogLevel, Pipeline,
    RequestContext, Route, Router, Server, Validate,
};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), gatehouse::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let router = Router::new()
        .group("/api", |g| {
            g.get(Route::new("/profile", profile).log_level(LogLevel::RETURN));
        })
        .group("/share", |g| {
            g.get(Route::new("/doc", shared_doc));
        })
        .group("/private", |g| {
            g.post(Route::new("/order", create_order).log_level(LogLevel::ALL).no_sql_log());
        })
        .group("/public", |g| {
            g.get(Route::new("/news", news).login_exempt());
        });

    let pipeline = Pipeline::new(Config::from_env(), Accounts, router);
    Server::bind("0.0.0.0:3000").serve(pipeline).await
}

// ── Identity ──────────────────────────────────────────────────────────────────

/// Fixed tokens standing in for a session store.
struct Accounts;

impl IdentityProvider for Accounts {
    fn check_api<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        token: &'a str,
        _path: &'a str,
    ) -> BoxFuture<'a, Result<CallerIdentity, AppError>> {
        Box::pin(async move {
            match token {
                "abc" => Ok(CallerIdentity::user(42).with_roles(["member"])),
                "" => Ok(CallerIdentity::anonymous()),
                _ => Err(AppError::new(401, "token expired")),
            }
        })
    }

    fn check_share<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        query: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<CallerIdentity, AppError>> {
        Box::pin(async move {
            match query.get("shareToken").map(String::as_str) {
                Some("xyz") => Ok(CallerIdentity::anonymous()),
                _ => Err(AppError::new(403, "share link revoked")),
            }
        })
    }

    fn check_private<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        uid: i64,
    ) -> BoxFuture<'a, Result<CallerIdentity, AppError>> {
        Box::pin(async move { Ok(CallerIdentity::user(uid)) })
    }
}

// ── Payloads ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct Empty {}

impl Validate for Empty {}

#[derive(Deserialize)]
struct DocQuery {
    id: Option<i64>,
}

impl Validate for DocQuery {
    fn schema() -> Schema<Self> {
        Schema::new("DocQuery")
            .field("id", |q| q.id.into(), [Rule::Required, Rule::range(1.0, 1e9)])
    }
}

#[derive(Deserialize)]
struct NewOrder {
    amount: Option<i64>,
    currency: Option<String>,
}

impl Validate for NewOrder {
    fn schema() -> Schema<Self> {
        Schema::<Self>::new("NewOrder")
            .field("amount", |o| o.amount.into(), [Rule::Required, Rule::range(1.0, 1000.0)])
            .message("amount required")
            .field("currency", |o| o.currency.as_ref().into(), [Rule::OneOf(&["EUR", "USD"])])
    }
}

#[derive(Serialize)]
struct Order {
    id: u64,
    owner: i64,
    amount: i64,
}

// ── Handlers ──────────────────────────────────────────────────────────────────

fn profile(ctx: &mut RequestContext, _req: Empty) -> BoxFuture<'_, Envelope<i64>> {
    Box::pin(async move { Envelope::ok(ctx.uid()) })
}

fn shared_doc(_ctx: &mut RequestContext, req: DocQuery) -> BoxFuture<'_, Envelope<String>> {
    Box::pin(async move { Envelope::ok(format!("document {}", req.id.unwrap_or_default())) })
}

fn create_order(ctx: &mut RequestContext, req: NewOrder) -> BoxFuture<'_, Envelope<Order>> {
    Box::pin(async move {
        Envelope::ok(Order { id: 1, owner: ctx.uid(), amount: req.amount.unwrap_or_default() })
    })
}

fn news(_ctx: &mut RequestContext, _req: Empty) -> BoxFuture<'_, Envelope<Vec<&'static str>>> {
    Box::pin(async { Envelope::ok(vec!["gatehouse 0.1 released"]) })
}
