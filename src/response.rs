//! Outgoing HTTP response type.
//!
//! The pipeline always answers `200 OK` with a JSON [`Envelope`](crate::Envelope).
//! Bare statuses only appear for requests that never reach the pipeline
//! (unknown routes).

use bytes::Bytes;
use http::{HeaderValue, StatusCode, header};
use http_body_util::Full;
use serde::Serialize;

/// Body written when an envelope cannot be serialised.
const SERIALIZE_FAILED: &[u8] = br#"{"code":500,"message":"internal server error"}"#;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Bytes,
    pub(crate) content_type: Option<&'static str>,
    pub(crate) status: StatusCode,
}

impl Response {
    /// `200 OK` — `application/json`.
    pub fn json(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: Some("application/json"),
            status: StatusCode::OK,
        }
    }

    /// Response with no body.
    pub fn status(code: StatusCode) -> Self {
        Self { body: Bytes::new(), content_type: None, status: code }
    }

    /// `200 OK` JSON response holding `value`.
    ///
    /// Serialisation failures are logged and answered with a fixed
    /// internal-error envelope, so a response is always produced.
    pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => Self::json(bytes),
            Err(e) => {
                tracing::error!("serialize response: {e}");
                Self::json(Bytes::from_static(SERIALIZE_FAILED))
            }
        }
    }

    pub fn status_code(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Converts into the hyper response the transport writes.
    pub fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(self.body));
        *res.status_mut() = self.status;
        if let Some(ct) = self.content_type {
            res.headers_mut()
                .insert(header::CONTENT_TYPE, HeaderValue::from_static(ct));
        }
        res
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_sets_json_content_type() {
        let res = Response::serialize(&serde_json::json!({ "code": 0 })).into_inner();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn bare_status_has_no_content_type() {
        let res = Response::status(StatusCode::NOT_FOUND).into_inner();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert!(res.headers().get(header::CONTENT_TYPE).is_none());
    }
}
