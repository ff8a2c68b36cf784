//! Error types.
//!
//! Application-level outcomes (not logged in, bad arguments, permission
//! denied) are still rendered as `200 OK` + [`Envelope`](crate::Envelope);
//! these types only decide *which* envelope. [`Error`] is the odd one out: it
//! surfaces infrastructure failures such as binding to a port.

use std::fmt;
use std::num::ParseIntError;

use serde::Serialize;
use thiserror::Error;

use crate::envelope::{code, Envelope};
use crate::middleware::identity::Tier;
use crate::validate::Violations;

/// The error type returned by the server's fallible operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid socket address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

// ── AppError ──────────────────────────────────────────────────────────────────

/// A structured application error: a code and a client-facing message.
///
/// Identity callbacks return it, and business code may raise it with
/// [`std::panic::panic_any`]; either way its code and message reach the client
/// unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppError {
    pub code: i32,
    pub message: String,
}

impl AppError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// Generic failure code with the given message.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(code::FAILED, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}

// ── AuthError ─────────────────────────────────────────────────────────────────

/// Why caller identity resolution rejected a request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("not login")]
    NotLoggedIn,

    #[error("invalid private uid `{hint}`")]
    InvalidPrivateUid {
        hint: String,
        #[source]
        source: ParseIntError,
    },

    #[error("{tier} identity check failed: {source}")]
    Callback {
        tier: Tier,
        #[source]
        source: AppError,
    },

    #[error("{tier} requests must use {expected}, got {actual}")]
    InvalidRequest {
        tier: Tier,
        expected: http::Method,
        actual: http::Method,
    },

    #[error("uid {uid} is not allowed on this route")]
    PermissionDenied { uid: i64 },
}

impl AuthError {
    pub fn to_envelope(&self) -> Envelope<()> {
        match self {
            Self::NotLoggedIn => Envelope::error(code::NOT_LOGGED_IN, "not login"),
            Self::InvalidPrivateUid { .. } => {
                Envelope::error(code::BAD_REQUEST, "invalid private uid")
            }
            Self::Callback { source, .. } => Envelope::error(source.code, source.message.clone()),
            Self::InvalidRequest { .. } => Envelope::error(code::BAD_REQUEST, "invalid request"),
            Self::PermissionDenied { .. } => {
                Envelope::error(code::PERMISSION_DENIED, "permission denied")
            }
        }
    }
}

// ── BindError ─────────────────────────────────────────────────────────────────

/// Message used when a payload fails to bind and no field message applies.
pub const ARGS_INVALID: &str = "arguments invalid";

/// Why a request payload could not be bound.
#[derive(Debug, Error)]
pub enum BindError {
    /// The body or query string did not decode into the payload type.
    #[error("decode {source_kind}: {detail}")]
    Decode {
        source_kind: &'static str,
        detail: String,
    },

    /// The payload decoded but broke one or more field rules.
    #[error("{} field rule(s) violated", .0.len())]
    Invalid(Violations),
}

impl BindError {
    pub(crate) fn json(err: serde_json::Error) -> Self {
        Self::Decode { source_kind: "json body", detail: err.to_string() }
    }

    pub(crate) fn query(err: serde_urlencoded::de::Error) -> Self {
        Self::Decode { source_kind: "query string", detail: err.to_string() }
    }
}
