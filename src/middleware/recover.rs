//! Panic containment and fault translation.
//!
//! A route's stages run under [`catch`], so a panic in an identity check or
//! the business callback still ends in an exit record. The pipeline wraps the
//! whole routed dispatch in [`contain`] as well. A panic stops at the first of
//! these boundaries and becomes an envelope; it never reaches the connection
//! task.
//!
//! Classification of the failure value:
//!
//! | Value | Envelope |
//! |---|---|
//! | `&str` / `String` | generic error, the string as message |
//! | [`AppError`] | its own code and message |
//! | `Box<dyn Error>`, `io::Error` | `internal server error` in production, the error text otherwise |
//! | anything else | `unknown error` |

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::error;

use crate::config::Profile;
use crate::envelope::Envelope;
use crate::error::AppError;
use crate::response::Response;

pub const INTERNAL_ERROR: &str = "internal server error";
pub const UNKNOWN_ERROR: &str = "unknown error";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A failure that escaped the normal short-circuit path.
#[derive(Debug)]
pub enum Fault {
    Message(String),
    App(AppError),
    Error(BoxError),
    Unknown,
}

impl Fault {
    /// Classifies a panic payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let payload = match payload.downcast::<String>() {
            Ok(s) => return Self::Message(*s),
            Err(p) => p,
        };
        let payload = match payload.downcast::<&'static str>() {
            Ok(s) => return Self::Message((*s).to_owned()),
            Err(p) => p,
        };
        let payload = match payload.downcast::<AppError>() {
            Ok(e) => return Self::App(*e),
            Err(p) => p,
        };
        let payload = match payload.downcast::<BoxError>() {
            Ok(e) => return Self::Error(*e),
            Err(p) => p,
        };
        match payload.downcast::<std::io::Error>() {
            Ok(e) => Self::Error(e),
            Err(_) => Self::Unknown,
        }
    }

    /// Renders the client-facing envelope. Production hides generic error text.
    pub fn to_envelope(&self, profile: Profile) -> Envelope<()> {
        match self {
            Self::Message(msg) => Envelope::fail(msg.clone()),
            Self::App(e) => Envelope::error(e.code, e.message.clone()),
            Self::Error(_) if profile.is_production() => Envelope::fail(INTERNAL_ERROR),
            Self::Error(e) => Envelope::fail(e.to_string()),
            Self::Unknown => Envelope::fail(UNKNOWN_ERROR),
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(msg) => f.write_str(msg),
            Self::App(e) => write!(f, "{e}"),
            Self::Error(e) => write!(f, "{e}"),
            Self::Unknown => f.write_str("<non-error panic payload>"),
        }
    }
}

/// Logs `fault` and renders it as the response.
pub fn respond(fault: &Fault, profile: Profile) -> Response {
    error!(%fault, "panic error");
    Response::serialize(&fault.to_envelope(profile))
}

/// Runs `fut` to completion, classifying a panic instead of unwinding.
pub async fn catch<F: Future>(fut: F) -> Result<F::Output, Fault> {
    AssertUnwindSafe(fut).catch_unwind().await.map_err(Fault::from_panic)
}

/// Runs `chain`, turning a panic into a translated envelope response.
pub async fn contain<F>(chain: F, profile: Profile) -> Response
where
    F: Future<Output = Response>,
{
    match catch(chain).await {
        Ok(response) => response,
        Err(fault) => respond(&fault, profile),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panic_payload<T: Any + Send>(v: T) -> Box<dyn Any + Send> {
        Box::new(v)
    }

    #[test]
    fn strings_keep_their_text() {
        let fault = Fault::from_panic(panic_payload("boom"));
        assert_eq!(fault.to_envelope(Profile::Production).message, "boom");
        let fault = Fault::from_panic(panic_payload(String::from("bang")));
        assert_eq!(fault.to_envelope(Profile::Development).message, "bang");
    }

    #[test]
    fn app_errors_pass_through() {
        let fault = Fault::from_panic(panic_payload(AppError::new(4001, "quota exceeded")));
        let env = fault.to_envelope(Profile::Production);
        assert_eq!((env.code, env.message.as_str()), (4001, "quota exceeded"));
    }

    #[test]
    fn generic_errors_are_hidden_in_production() {
        let io = || std::io::Error::other("db at 10.0.0.3 refused");
        let prod = Fault::from_panic(panic_payload(io())).to_envelope(Profile::Production);
        assert_eq!(prod.message, INTERNAL_ERROR);

        let dev = Fault::from_panic(panic_payload(io())).to_envelope(Profile::Development);
        assert_eq!(dev.message, "db at 10.0.0.3 refused");

        let boxed: BoxError = "bad state".into();
        let prod = Fault::from_panic(panic_payload(boxed)).to_envelope(Profile::Production);
        assert_eq!(prod.message, INTERNAL_ERROR);
    }

    #[test]
    fn other_payloads_are_unknown() {
        let env = Fault::from_panic(panic_payload(42_u32)).to_envelope(Profile::Development);
        assert_eq!(env.message, UNKNOWN_ERROR);
        assert!(!env.is_ok());
    }

    #[tokio::test]
    async fn catch_classifies_the_payload() {
        let ok = catch(async { 7 }).await;
        assert!(matches!(ok, Ok(7)));

        let fut = async {
            if true {
                std::panic::panic_any(AppError::new(4001, "quota exceeded"));
            }
            7
        };
        match catch(fut).await {
            Err(Fault::App(e)) => assert_eq!(e.code, 4001),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn contain_stops_the_unwind() {
        let chain = async {
            if true {
                panic!("boom");
            }
            Response::status(http::StatusCode::OK)
        };
        let res = contain(chain, Profile::Development).await;
        let body: serde_json::Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["message"], "boom");
    }
}
