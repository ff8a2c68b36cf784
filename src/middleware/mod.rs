//! Middleware layer.
//!
//! The cross-cutting stages every routed request passes through:
//!
//! - [`identity`] — classify the request into an access tier and resolve the
//!   caller through the embedding application's [`IdentityProvider`](identity::IdentityProvider)
//! - [`access_log`] — enter/exit records at the route's [`LogLevel`](access_log::LogLevel)
//! - [`recover`] — contain panics and translate them into an envelope
//!
//! Stages are plain functions called in a fixed order by the route
//! dispatcher; there is no user-assembled middleware stack.

pub mod access_log;
pub mod identity;
pub mod recover;
