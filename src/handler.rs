//! Business-callback trait and route type erasure.
//!
//! # How typed routes are stored
//!
//! Every route has its own payload type `T` and result type `V`, but the
//! router keeps them all in one radix tree per method. A [`Route<T, V>`] is
//! therefore compiled into a [`RouteEntry`](crate::route) and stored behind
//! `Arc<dyn ErasedRoute>`:
//!
//! ```text
//! fn order(ctx, req: NewOrder) -> BoxFuture<'_, Envelope<Order>>   ← user writes this
//!        ↓ Route::new("/order", order)
//! Route<NewOrder, Envelope<Order>>                                  ← typed descriptor
//!        ↓ router.post(route)
//! Arc<RouteEntry<..>> as BoxedRoute                                 ← rule table compiled once
//!        ↓
//! route.dispatch(shared, &mut ctx, &req)  at request time           ← one vtable call
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::pipeline::Shared;
use crate::request::Request;
use crate::response::Response;

/// A heap-allocated, type-erased future that may borrow for `'a`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Business callbacks ────────────────────────────────────────────────────────

/// A business function: takes the resolved context and the bound payload and
/// returns the value written back to the client.
///
/// Implemented for every function with the signature
///
/// ```text
/// fn name(ctx: &mut RequestContext, req: T) -> BoxFuture<'_, V>
/// ```
///
/// The context is borrowed mutably so the callback may adjust the caller
/// identity; the exit log reads it afterwards.
///
/// ```rust
/// use gatehouse::{BoxFuture, Envelope, RequestContext};
///
/// #[derive(serde::Deserialize)]
/// struct Ping {}
/// impl gatehouse::Validate for Ping {}
///
/// fn ping(ctx: &mut RequestContext, _req: Ping) -> BoxFuture<'_, Envelope<i64>> {
///     Box::pin(async move { Envelope::ok(ctx.uid()) })
/// }
/// ```
pub trait Handler<T, V>: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, req: T) -> BoxFuture<'a, V>;
}

impl<F, T, V> Handler<T, V> for F
where
    F: for<'a> Fn(&'a mut RequestContext, T) -> BoxFuture<'a, V> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut RequestContext, req: T) -> BoxFuture<'a, V> {
        (self)(ctx, req)
    }
}

// ── Route erasure ─────────────────────────────────────────────────────────────

/// Internal dispatch interface every registered route implements.
pub(crate) trait ErasedRoute: Send + Sync {
    fn dispatch<'a>(
        &'a self,
        shared: &'a Shared,
        ctx: &'a mut RequestContext,
        req: &'a Request,
    ) -> BoxFuture<'a, Response>;
}

/// A type-erased route shared across concurrent requests.
pub(crate) type BoxedRoute = Arc<dyn ErasedRoute>;
