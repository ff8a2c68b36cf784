//! Per-request context.
//!
//! One [`RequestContext`] is built by the outermost wrapper of the pipeline
//! and passed by `&mut` through every stage and into the business callback.
//! It is never stored anywhere that outlives the request.

use std::time::Instant;

use uuid::Uuid;

use crate::config::HeaderNames;
use crate::request::Request;

/// Suffix marking a trace id generated here rather than supplied by the client.
pub const LOCAL_TRACE_SUFFIX: &str = "-cr";

/// Who is calling. Filled in by identity resolution (or the business callback).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallerIdentity {
    /// `0` means unauthenticated.
    pub uid: i64,
    pub roles: Vec<String>,
    pub product: Option<i64>,
    /// Hint for data-access layers not to log SQL for this request.
    pub skip_sql_log: bool,
}

impl CallerIdentity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(uid: i64) -> Self {
        Self { uid, ..Self::default() }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_product(mut self, product: i64) -> Self {
        self.product = Some(product);
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.uid != 0
    }
}

/// Request-scoped state shared by every pipeline stage.
#[derive(Debug)]
pub struct RequestContext {
    trace_id: String,
    token: String,
    share_token: String,
    platform: String,
    profile: String,
    private_uid: Option<String>,
    created_at: Instant,
    pub identity: CallerIdentity,
}

impl RequestContext {
    /// Extracts the context fields from `req`.
    ///
    /// Headers win; tokens fall back to a query parameter of the same name.
    /// Missing fields default to empty. Never fails.
    pub fn build(req: &Request, names: &HeaderNames) -> Self {
        let trace_id = match header(req, &names.trace_id) {
            tid if tid.is_empty() => new_trace_id(),
            tid => tid,
        };
        let private_uid = Some(header(req, &names.private_uid)).filter(|v| !v.is_empty());

        Self {
            trace_id,
            token: header_or_query(req, &names.token),
            share_token: header_or_query(req, &names.share_token),
            platform: header(req, &names.platform),
            profile: header(req, &names.profile),
            private_uid,
            created_at: Instant::now(),
            identity: CallerIdentity::anonymous(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn share_token(&self) -> &str {
        &self.share_token
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn private_uid(&self) -> Option<&str> {
        self.private_uid.as_deref()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn uid(&self) -> i64 {
        self.identity.uid
    }

    /// Whether the trace id was generated locally rather than sent by the client.
    pub fn is_local_trace(&self) -> bool {
        self.trace_id.ends_with(LOCAL_TRACE_SUFFIX)
    }
}

fn new_trace_id() -> String {
    format!("{}{LOCAL_TRACE_SUFFIX}", Uuid::new_v4().simple())
}

fn header(req: &Request, name: &str) -> String {
    req.header(name).unwrap_or_default().to_owned()
}

fn header_or_query(req: &Request, name: &str) -> String {
    match req.header(name) {
        Some(v) if !v.is_empty() => v.to_owned(),
        _ => req.query_param(name).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn build(req: http::request::Builder) -> RequestContext {
        let req: Request = req.body(Bytes::new()).unwrap().into();
        RequestContext::build(&req, &HeaderNames::default())
    }

    #[test]
    fn client_trace_id_is_kept() {
        let ctx = build(http::Request::get("/").header("trace-id", "abc123"));
        assert_eq!(ctx.trace_id(), "abc123");
        assert!(!ctx.is_local_trace());
    }

    #[test]
    fn missing_trace_id_is_generated_with_suffix() {
        let ctx = build(http::Request::get("/"));
        assert!(ctx.is_local_trace());
        assert_eq!(ctx.trace_id().len(), 32 + LOCAL_TRACE_SUFFIX.len());
    }

    #[test]
    fn token_falls_back_to_query() {
        let ctx = build(http::Request::get("/api/x?token=q1&shareToken=s1"));
        assert_eq!(ctx.token(), "q1");
        assert_eq!(ctx.share_token(), "s1");

        let ctx = build(http::Request::get("/api/x?token=q1").header("token", "h1"));
        assert_eq!(ctx.token(), "h1");
    }

    #[test]
    fn private_uid_only_from_header() {
        let ctx = build(http::Request::get("/private/x?private-uid=7"));
        assert_eq!(ctx.private_uid(), None);

        let ctx = build(http::Request::get("/private/x").header("private-uid", "7"));
        assert_eq!(ctx.private_uid(), Some("7"));
        assert_eq!(ctx.uid(), 0);
    }
}
