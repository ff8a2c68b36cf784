//! Payload binding.
//!
//! `GET` requests without a `content-type` decode from the query string;
//! everything else decodes the body as JSON. The decoded payload is then
//! checked against the route's [`RuleTable`].

use http::Method;
use serde::de::DeserializeOwned;

use crate::envelope::{code, Envelope};
use crate::error::{ARGS_INVALID, BindError};
use crate::request::Request;
use crate::validate::{RuleTable, Validate};

/// Decodes and validates the payload of `req`.
pub fn bind<T>(req: &Request, rules: &RuleTable<T>) -> Result<T, BindError>
where
    T: DeserializeOwned + Validate,
{
    let payload: T = if *req.method() == Method::GET && req.content_type().is_none() {
        serde_urlencoded::from_str(req.query().unwrap_or_default()).map_err(BindError::query)?
    } else {
        serde_json::from_slice(req.body()).map_err(BindError::json)?
    };

    let violations = rules.check(&payload);
    if violations.is_empty() {
        Ok(payload)
    } else {
        Err(BindError::Invalid(violations))
    }
}

/// The client-facing envelope for a bind failure.
///
/// Decode failures never leak the decoder's text; field violations are
/// rendered through the rule table's messages.
pub fn to_envelope<T: 'static>(err: &BindError, rules: &RuleTable<T>) -> Envelope<()> {
    match err {
        BindError::Decode { .. } => Envelope::error(code::BAD_REQUEST, ARGS_INVALID),
        BindError::Invalid(violations) => Envelope::error(code::BAD_REQUEST, rules.render(violations)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{Rule, Schema};
    use bytes::Bytes;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Search {
        q: Option<String>,
        #[serde(default)]
        page: u32,
    }

    impl Validate for Search {
        fn schema() -> Schema<Self> {
            Schema::<Self>::new("Search")
                .field("q", |s| s.q.as_deref().into(), [Rule::Required])
                .message("q required")
        }
    }

    fn request(method: Method, uri: &str, content_type: Option<&str>, body: &'static str) -> Request {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header("content-type", ct);
        }
        builder.body(Bytes::from_static(body.as_bytes())).unwrap().into()
    }

    #[test]
    fn get_binds_from_query() {
        let table = RuleTable::<Search>::compile();
        let req = request(Method::GET, "/api/search?q=rust&page=2", None, "");
        let s = bind(&req, &table).unwrap();
        assert_eq!((s.q.as_deref(), s.page), (Some("rust"), 2));
    }

    #[test]
    fn get_with_content_type_binds_from_body() {
        let table = RuleTable::<Search>::compile();
        let req = request(Method::GET, "/api/search?q=ignored", Some("application/json"), r#"{"q":"body"}"#);
        assert_eq!(bind(&req, &table).unwrap().q.as_deref(), Some("body"));
    }

    #[test]
    fn post_binds_from_json_body() {
        let table = RuleTable::<Search>::compile();
        let req = request(Method::POST, "/api/search?q=ignored", None, r#"{"q":"json","page":3}"#);
        let s = bind(&req, &table).unwrap();
        assert_eq!((s.q.as_deref(), s.page), (Some("json"), 3));
    }

    #[test]
    fn violations_render_custom_message() {
        let table = RuleTable::<Search>::compile();
        let req = request(Method::POST, "/api/search", None, r#"{"page":1}"#);
        let err = bind(&req, &table).unwrap_err();
        let env = to_envelope(&err, &table);
        assert_eq!((env.code, env.message.as_str()), (code::BAD_REQUEST, "q required"));
    }

    #[test]
    fn malformed_body_is_generic() {
        let table = RuleTable::<Search>::compile();
        let req = request(Method::POST, "/api/search", None, "{not json");
        let err = bind(&req, &table).unwrap_err();
        assert!(matches!(err, BindError::Decode { .. }));
        assert_eq!(to_envelope(&err, &table).message, ARGS_INVALID);
    }
}
