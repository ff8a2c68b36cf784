//! The uniform `{ code, message, data }` response shape.
//!
//! Every outcome of the pipeline, successful or not, is written as an
//! [`Envelope`] with HTTP status `200 OK`. Clients branch on `code`.

use serde::Serialize;

/// Envelope codes used by the pipeline itself.
///
/// `0` is success; anything else is an error. Applications are free to use
/// their own non-zero codes through [`AppError`](crate::AppError).
pub mod code {
    pub const OK: i32                = 0;
    pub const BAD_REQUEST: i32       = 400;
    pub const NOT_LOGGED_IN: i32     = 401;
    pub const PERMISSION_DENIED: i32 = 403;
    pub const FAILED: i32            = 500;
}

/// A tagged result: status code, message, optional payload.
///
/// ```rust
/// use gatehouse::Envelope;
///
/// let ok = Envelope::ok(42);
/// assert_eq!(serde_json::to_string(&ok).unwrap(), r#"{"code":0,"message":"ok","data":42}"#);
///
/// let err = Envelope::<()>::fail("boom");
/// assert_eq!(serde_json::to_string(&err).unwrap(), r#"{"code":500,"message":"boom"}"#);
/// ```
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { code: code::OK, message: "ok".to_owned(), data: Some(data) }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// Generic failure with the given message.
    pub fn fail(message: impl Into<String>) -> Self {
        Self::error(code::FAILED, message)
    }

    pub fn is_ok(&self) -> bool {
        self.code == code::OK
    }
}

impl Envelope<()> {
    /// Success with no payload.
    pub fn done() -> Self {
        Self { code: code::OK, message: "ok".to_owned(), data: None }
    }
}
