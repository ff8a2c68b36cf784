//! Caller identity resolution.
//!
//! The access tier of a request is a total function of the route's exemption
//! flag and the request path, evaluated in this order:
//!
//! | # | Condition | Tier | Callback | Needs uid ≠ 0 |
//! |---|---|---|---|---|
//! | 1 | route is login-exempt | `Exempt` | — | no |
//! | 2 | public pattern | `Public` | `check_public` | no |
//! | 3 | share pattern, or api pattern + `shareToken` query param | `Share` | `check_share` | no |
//! | 4 | api pattern | `Api` | `check_api` | yes |
//! | 5 | private pattern + private-uid header | `Private` | `check_private` | yes |
//! | 6 | private pattern, no header | `Internal` | — | no |
//! | 7 | anything else | `Default` | — | yes |
//!
//! Patterns are substrings, so a path may match several; the first row wins.
//! `/api/public/feed` is a public request.
//!
//! Callback failures are surfaced as-is. Nothing is retried: a callback may
//! consume the token it was given.

use std::collections::HashMap;
use std::fmt;

use http::Method;

use crate::config::TierPatterns;
use crate::context::{CallerIdentity, RequestContext};
use crate::error::{AppError, AuthError};
use crate::handler::BoxFuture;
use crate::request::Request;

/// Identity checks supplied by the embedding application.
///
/// Each check returns the resolved identity, which replaces the context's
/// current one. Checks may block on network or database calls; the pipeline
/// imposes no timeout of its own.
pub trait IdentityProvider: Send + Sync + 'static {
    /// Resolves an API-token caller.
    fn check_api<'a>(
        &'a self,
        ctx: &'a RequestContext,
        token: &'a str,
        path: &'a str,
    ) -> BoxFuture<'a, Result<CallerIdentity, AppError>>;

    /// Validates a share link from the request's query parameters.
    fn check_share<'a>(
        &'a self,
        ctx: &'a RequestContext,
        query: &'a HashMap<String, String>,
    ) -> BoxFuture<'a, Result<CallerIdentity, AppError>>;

    /// Resolves a trusted internal caller that declared its uid.
    fn check_private<'a>(
        &'a self,
        ctx: &'a RequestContext,
        uid: i64,
    ) -> BoxFuture<'a, Result<CallerIdentity, AppError>>;

    /// Optionally identifies a caller on a public route. Anonymous by default.
    fn check_public<'a>(
        &'a self,
        _ctx: &'a RequestContext,
        _token: &'a str,
        _path: &'a str,
    ) -> BoxFuture<'a, Result<CallerIdentity, AppError>> {
        Box::pin(async { Ok(CallerIdentity::anonymous()) })
    }
}

/// Access tier of a request.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Tier {
    Exempt,
    Share,
    Api,
    Private,
    Internal,
    Public,
    Default,
}

impl Tier {
    /// Classifies a request. See the module docs for the precedence.
    pub fn classify(
        patterns: &TierPatterns,
        path: &str,
        login_exempt: bool,
        share_query: bool,
        private_hint: bool,
    ) -> Self {
        let api = path.contains(&patterns.api);
        if login_exempt {
            Self::Exempt
        } else if path.contains(&patterns.public) {
            Self::Public
        } else if path.contains(&patterns.share) || (api && share_query) {
            Self::Share
        } else if api {
            Self::Api
        } else if path.contains(&patterns.private) {
            if private_hint { Self::Private } else { Self::Internal }
        } else {
            Self::Default
        }
    }

    /// Whether a resolved uid of zero rejects the request.
    pub fn requires_login(self) -> bool {
        matches!(self, Self::Api | Self::Private | Self::Default)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exempt   => "exempt",
            Self::Share    => "share",
            Self::Api      => "api",
            Self::Private  => "private",
            Self::Internal => "internal",
            Self::Public   => "public",
            Self::Default  => "default",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the caller of `req` into `ctx.identity`.
///
/// Returns the tier the request was classified into.
pub async fn resolve(
    provider: &dyn IdentityProvider,
    patterns: &TierPatterns,
    share_key: &str,
    ctx: &mut RequestContext,
    req: &Request,
    login_exempt: bool,
) -> Result<Tier, AuthError> {
    let tier = Tier::classify(
        patterns,
        req.path(),
        login_exempt,
        req.query_param(share_key).is_some_and(|v| !v.is_empty()),
        ctx.private_uid().is_some(),
    );
    let callback = |source| AuthError::Callback { tier, source };

    let resolved = {
        let view: &RequestContext = ctx;
        match tier {
            Tier::Exempt => return Ok(tier),
            Tier::Share => {
                if *req.method() != Method::GET {
                    return Err(AuthError::InvalidRequest {
                        tier,
                        expected: Method::GET,
                        actual: req.method().clone(),
                    });
                }
                let query = req.query_map();
                Some(provider.check_share(view, &query).await)
            }
            Tier::Api => Some(provider.check_api(view, view.token(), req.path()).await),
            Tier::Private => {
                let hint = view.private_uid().unwrap_or_default();
                let uid = hint.parse::<i64>().map_err(|source| AuthError::InvalidPrivateUid {
                    hint: hint.to_owned(),
                    source,
                })?;
                Some(provider.check_private(view, uid).await)
            }
            Tier::Public => Some(provider.check_public(view, view.token(), req.path()).await),
            Tier::Internal | Tier::Default => None,
        }
    };
    if let Some(result) = resolved {
        ctx.identity = result.map_err(callback)?;
    }

    if tier.requires_login() && !ctx.identity.is_authenticated() {
        return Err(AuthError::NotLoggedIn);
    }
    Ok(tier)
}

/// Checks the resolved caller against a route's allow-lists. Empty lists allow everyone.
pub fn authorize(
    identity: &CallerIdentity,
    roles: &[String],
    products: &[i64],
) -> Result<(), AuthError> {
    let role_ok = roles.is_empty() || identity.roles.iter().any(|r| roles.contains(r));
    let product_ok = products.is_empty()
        || identity.product.is_some_and(|p| products.contains(&p));
    if role_ok && product_ok {
        Ok(())
    } else {
        Err(AuthError::PermissionDenied { uid: identity.uid })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(path: &str, exempt: bool, share: bool, hint: bool) -> Tier {
        Tier::classify(&TierPatterns::default(), path, exempt, share, hint)
    }

    #[test]
    fn exemption_wins_over_every_pattern() {
        assert_eq!(classify("/share/api/private/x", true, true, true), Tier::Exempt);
    }

    #[test]
    fn share_precedes_api() {
        assert_eq!(classify("/share/doc", false, false, false), Tier::Share);
        assert_eq!(classify("/api/doc", false, true, false), Tier::Share);
        assert_eq!(classify("/api/doc", false, false, false), Tier::Api);
    }

    #[test]
    fn private_depends_on_hint() {
        assert_eq!(classify("/private/order", false, false, true), Tier::Private);
        assert_eq!(classify("/private/order", false, false, false), Tier::Internal);
        // share token query param only upgrades api paths
        assert_eq!(classify("/private/order", false, true, false), Tier::Internal);
    }

    #[test]
    fn public_precedes_share_api_and_private() {
        assert_eq!(classify("/api/public/feed", false, false, false), Tier::Public);
        assert_eq!(classify("/share/public/doc", false, true, false), Tier::Public);
        assert_eq!(classify("/private/public/x", false, false, true), Tier::Public);
        assert_eq!(classify("/public/x", true, false, false), Tier::Exempt);
    }

    #[test]
    fn remaining_paths() {
        assert_eq!(classify("/public/news", false, false, false), Tier::Public);
        assert_eq!(classify("/other", false, false, false), Tier::Default);
        assert!(Tier::Default.requires_login());
        assert!(!Tier::Public.requires_login());
        assert!(!Tier::Share.requires_login());
    }

    #[test]
    fn authorize_checks_roles_and_products() {
        let admin = CallerIdentity::user(1).with_roles(["admin"]).with_product(7);
        assert!(authorize(&admin, &[], &[]).is_ok());
        assert!(authorize(&admin, &["admin".to_owned()], &[7]).is_ok());
        assert!(matches!(
            authorize(&admin, &["ops".to_owned()], &[]),
            Err(AuthError::PermissionDenied { uid: 1 })
        ));
        assert!(authorize(&CallerIdentity::user(2), &[], &[7]).is_err());
    }
}
