//! Enter / exit records around a route's business callback.
//!
//! Records are emitted inside the request span, so each one carries the trace
//! id. Two latencies are reported on exit: `latency_ms` since the context was
//! built (end to end, including identity resolution) and `biz_ms` since
//! dispatch began.

use std::collections::BTreeMap;
use std::ops::BitOr;
use std::time::Instant;

use tracing::info;

use crate::context::RequestContext;
use crate::request::Request;

/// Client metadata headers copied into the enter record.
pub const CLIENT_HEADERS: [&str; 5] = ["device-id", "hardware", "os", "os-version", "app-version"];

/// Per-route logging verbosity, as a bitmask.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct LogLevel(u8);

impl LogLevel {
    pub const NONE: Self   = Self(0);
    pub const PARAMS: Self = Self(1);
    pub const RETURN: Self = Self(2);
    pub const ALL: Self    = Self(3);

    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for LogLevel {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Emits the enter record.
pub fn before(ctx: &RequestContext, req: &Request, level: LogLevel) {
    if level.is_none() {
        return;
    }
    let uid = ctx.uid();
    if level.contains(LogLevel::PARAMS) {
        info!(
            url = req.target(),
            uid,
            key_headers = %client_headers(req),
            body = %String::from_utf8_lossy(req.body()),
            "enter"
        );
    } else {
        info!(url = req.target(), uid, "enter");
    }
}

/// Emits the exit record. `returned` is the serialised response body.
pub fn after(
    ctx: &RequestContext,
    returned: &[u8],
    dispatch_start: Instant,
    level: LogLevel,
    outcome: &'static str,
) {
    if level.is_none() {
        return;
    }
    let now = Instant::now();
    let latency_ms = now.duration_since(ctx.created_at()).as_millis() as u64;
    let biz_ms = now.duration_since(dispatch_start).as_millis() as u64;
    let uid = ctx.uid();

    if level.contains(LogLevel::RETURN) {
        info!(
            uid,
            ret = %String::from_utf8_lossy(returned),
            latency_ms,
            biz_ms,
            outcome,
            "exit"
        );
    } else {
        info!(uid, latency_ms, biz_ms, outcome, "exit");
    }
}

/// The allow-listed client headers as a flat JSON object; absent ones are empty.
pub fn client_headers(req: &Request) -> String {
    let map: BTreeMap<&str, &str> = CLIENT_HEADERS
        .iter()
        .map(|&k| (k, req.header(k).unwrap_or_default()))
        .collect();
    serde_json::to_string(&map).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::config::HeaderNames;
    use crate::context::CallerIdentity;
    use bytes::Bytes;

    /// Formatted log output shared with the subscriber's writer.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn logged(f: impl FnOnce()) -> String {
        let out = Captured::default();
        let writer = out.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);
        let bytes = out.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    fn order_request() -> (RequestContext, Request) {
        let req: Request = http::Request::post("/api/order?src=app")
            .header("device-id", "d-1")
            .body(Bytes::from_static(br#"{"amount":3}"#))
            .unwrap()
            .into();
        let mut ctx = RequestContext::build(&req, &HeaderNames::default());
        ctx.identity = CallerIdentity::user(42);
        (ctx, req)
    }

    #[test]
    fn none_level_logs_nothing() {
        let (ctx, req) = order_request();
        let out = logged(|| {
            before(&ctx, &req, LogLevel::NONE);
            after(&ctx, b"{}", Instant::now(), LogLevel::NONE, "responded");
        });
        assert!(out.is_empty(), "{out}");
    }

    #[test]
    fn params_bit_logs_target_headers_and_body() {
        let (ctx, req) = order_request();
        let out = logged(|| before(&ctx, &req, LogLevel::PARAMS));

        assert!(out.contains("enter"), "{out}");
        assert!(out.contains("/api/order?src=app"), "{out}");
        assert!(out.contains("uid=42"), "{out}");
        assert!(out.contains("key_headers="), "{out}");
        assert!(out.contains("d-1"), "{out}");
        assert!(out.contains(r#"body={"amount":3}"#), "{out}");
    }

    #[test]
    fn enter_without_params_bit_omits_body() {
        let (ctx, req) = order_request();
        let out = logged(|| before(&ctx, &req, LogLevel::RETURN));

        assert!(out.contains("enter"), "{out}");
        assert!(out.contains("uid=42"), "{out}");
        assert!(!out.contains("body="), "{out}");
        assert!(!out.contains("key_headers="), "{out}");
    }

    #[test]
    fn return_bit_logs_returned_payload() {
        let (ctx, _) = order_request();
        let out = logged(|| {
            after(&ctx, br#"{"code":0}"#, Instant::now(), LogLevel::RETURN, "responded");
        });

        assert!(out.contains("exit"), "{out}");
        assert!(out.contains(r#"ret={"code":0}"#), "{out}");
        assert!(out.contains("latency_ms="), "{out}");
        assert!(out.contains("biz_ms="), "{out}");
    }

    #[test]
    fn exit_without_return_bit_logs_only_latency_and_uid() {
        let (ctx, _) = order_request();
        let out = logged(|| {
            after(&ctx, br#"{"code":0}"#, Instant::now(), LogLevel::PARAMS, "aborted");
        });

        assert!(out.contains("exit"), "{out}");
        assert!(out.contains("uid=42"), "{out}");
        assert!(out.contains("latency_ms="), "{out}");
        assert!(out.contains("biz_ms="), "{out}");
        assert!(!out.contains("ret="), "{out}");
    }

    #[test]
    fn level_bits() {
        assert_eq!(LogLevel::PARAMS | LogLevel::RETURN, LogLevel::ALL);
        assert!(LogLevel::ALL.contains(LogLevel::PARAMS));
        assert!(!LogLevel::PARAMS.contains(LogLevel::RETURN));
        assert!(LogLevel::NONE.is_none());
        assert!(LogLevel::default().is_none());
    }

    #[test]
    fn client_headers_are_allow_listed() {
        let req: Request = http::Request::get("/api/x")
            .header("device-id", "d-1")
            .header("os", "ios")
            .header("authorization", "secret")
            .body(Bytes::new())
            .unwrap()
            .into();
        assert_eq!(
            client_headers(&req),
            r#"{"app-version":"","device-id":"d-1","hardware":"","os":"ios","os-version":""}"#,
        );
    }
}
