//! Radix-tree request router.
//!
//! One tree per HTTP method. O(path-length) lookup. Routes are registered
//! once at startup and read concurrently afterwards without locking.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use matchit::Router as MatchitRouter;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::handler::BoxedRoute;
use crate::route::Route;
use crate::validate::Validate;

/// The application router.
///
/// Build it once at startup and hand it to [`Pipeline::new`](crate::Pipeline::new).
/// Each registration returns `self` so calls chain naturally.
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedRoute>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    pub fn get<T, V>(self, route: Route<T, V>) -> Self
    where
        T: DeserializeOwned + Validate,
        V: Serialize + Send + 'static,
    {
        self.on(Method::GET, route)
    }

    pub fn post<T, V>(self, route: Route<T, V>) -> Self
    where
        T: DeserializeOwned + Validate,
        V: Serialize + Send + 'static,
    {
        self.on(Method::POST, route)
    }

    /// Registers a route for any method. Returns `self` for chaining.
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid route pattern or conflicts with an
    /// existing one. Both are programming errors caught at startup.
    pub fn on<T, V>(mut self, method: Method, route: Route<T, V>) -> Self
    where
        T: DeserializeOwned + Validate,
        V: Serialize + Send + 'static,
    {
        self.add("", method, route);
        self
    }

    /// Registers routes whose paths are relative to `prefix`.
    ///
    /// ```rust,no_run
    /// # use gatehouse::{BoxFuture, Envelope, RequestContext, Route, Router, Validate};
    /// # #[derive(serde::Deserialize)] struct Q {}
    /// # impl Validate for Q {}
    /// # fn profile(_: &mut RequestContext, _: Q) -> BoxFuture<'_, Envelope<()>> { Box::pin(async { Envelope::done() }) }
    /// # fn order(_: &mut RequestContext, _: Q) -> BoxFuture<'_, Envelope<()>> { Box::pin(async { Envelope::done() }) }
    /// let router = Router::new().group("/api/v1", |g| {
    ///     g.get(Route::new("/profile", profile))
    ///      .post(Route::new("/order", order));
    /// });
    /// ```
    pub fn group(mut self, prefix: &str, build: impl FnOnce(&mut Group<'_>)) -> Self {
        let mut group = Group { router: &mut self, prefix: prefix.trim_end_matches('/').to_owned() };
        build(&mut group);
        self
    }

    fn add<T, V>(&mut self, prefix: &str, method: Method, route: Route<T, V>)
    where
        T: DeserializeOwned + Validate,
        V: Serialize + Send + 'static,
    {
        let path = format!("{prefix}{}", route.path);
        let entry: BoxedRoute = Arc::new(route.compile());
        self.routes
            .entry(method)
            .or_default()
            .insert(path.as_str(), entry)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    pub(crate) fn lookup(
        &self,
        method: &Method,
        path: &str,
    ) -> Option<(BoxedRoute, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let route = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route, params))
    }

    /// Whether `path` is registered under some method other than `method`.
    pub(crate) fn allows_other(&self, method: &Method, path: &str) -> bool {
        self.routes
            .iter()
            .any(|(m, tree)| m != method && tree.at(path).is_ok())
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// Routes sharing a path prefix. See [`Router::group`].
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
}

impl Group<'_> {
    pub fn get<T, V>(&mut self, route: Route<T, V>) -> &mut Self
    where
        T: DeserializeOwned + Validate,
        V: Serialize + Send + 'static,
    {
        self.on(Method::GET, route)
    }

    pub fn post<T, V>(&mut self, route: Route<T, V>) -> &mut Self
    where
        T: DeserializeOwned + Validate,
        V: Serialize + Send + 'static,
    {
        self.on(Method::POST, route)
    }

    pub fn on<T, V>(&mut self, method: Method, route: Route<T, V>) -> &mut Self
    where
        T: DeserializeOwned + Validate,
        V: Serialize + Send + 'static,
    {
        self.router.add(&self.prefix, method, route);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::envelope::Envelope;
    use crate::handler::BoxFuture;

    #[derive(serde::Deserialize)]
    struct Empty {}

    impl Validate for Empty {}

    fn noop(_ctx: &mut RequestContext, _req: Empty) -> BoxFuture<'_, Envelope<()>> {
        Box::pin(async { Envelope::done() })
    }

    #[test]
    fn group_prefix_and_params() {
        let router = Router::new().group("/api/", |g| {
            g.get(Route::new("/users/{id}", noop));
        });
        let (_, params) = router.lookup(&Method::GET, "/api/users/42").unwrap();
        assert_eq!(params["id"], "42");
        assert!(router.lookup(&Method::POST, "/api/users/42").is_none());
    }

    #[test]
    fn other_methods_are_detected() {
        let router = Router::new().post(Route::new("/order", noop));
        assert!(router.allows_other(&Method::GET, "/order"));
        assert!(!router.allows_other(&Method::POST, "/order"));
        assert!(!router.allows_other(&Method::GET, "/missing"));
    }
}
