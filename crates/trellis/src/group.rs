//! Route groups and the shared registration table.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::context::MAX_HANDLERS;
use crate::error::{Result, RouterError};
use crate::handler::HandlerFunc;
use crate::path::{absolute, join_paths, PathPattern};
use crate::request::Method;
use crate::router::Route;

#[derive(Default)]
struct Registry {
    routes: Vec<Route>,
    frozen: bool,
}

/// Routes registered by every group of one engine.
#[derive(Default)]
pub(crate) struct RouteTable {
    inner: Mutex<Registry>,
}

impl RouteTable {
    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, route: Route) -> Result<()> {
        let mut registry = self.lock();
        if registry.frozen {
            return Err(RouterError::Frozen {
                method: route.method().to_string(),
                path: route.path().to_string(),
            });
        }
        if registry
            .routes
            .iter()
            .any(|r| r.method() == route.method() && r.shape() == route.shape())
        {
            return Err(RouterError::DuplicateRoute {
                method: route.method().to_string(),
                path: route.path().to_string(),
            });
        }
        registry.routes.push(route);
        Ok(())
    }

    /// Closes the table for registration and hands out its routes.
    pub(crate) fn freeze(&self) -> Vec<Route> {
        let mut registry = self.lock();
        registry.frozen = true;
        std::mem::take(&mut registry.routes)
    }
}

/// A path prefix plus the handlers every route under it runs first.
///
/// Groups are cheap to clone. A derived group copies its parent's handler
/// list at the moment it is created: middleware added to the parent
/// afterwards does not reach the child, nor routes the child registers.
///
/// ```
/// use trellis::{handler_fn, Engine};
///
/// let mut engine = Engine::new();
/// let mut api = engine.group("/api");
/// api.middleware(handler_fn(|c| Box::pin(async move {
///     c.writer.set_header("X-Api", "1");
///     c.next().await;
/// })));
/// api.get("/users/:id", [handler_fn(|c| Box::pin(async move {
///     let id = c.param("id").unwrap_or_default().to_string();
///     c.string(200, id);
/// }))])
/// .unwrap();
/// ```
#[derive(Clone)]
pub struct RouterGroup {
    prefix: String,
    handlers: Vec<HandlerFunc>,
    table: Arc<RouteTable>,
}

impl RouterGroup {
    pub(crate) fn root(table: Arc<RouteTable>) -> Self {
        Self {
            prefix: "/".to_string(),
            handlers: Vec::new(),
            table,
        }
    }

    pub(crate) fn freeze(&self) -> Vec<Route> {
        self.table.freeze()
    }

    /// The absolute path prefix of this group.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Handlers that run before every route of this group.
    pub fn handlers(&self) -> &[HandlerFunc] {
        &self.handlers
    }

    /// Appends a middleware to this group.
    ///
    /// Only routes registered through this group (or groups derived from it)
    /// after this call run the middleware.
    pub fn middleware(&mut self, middleware: impl Into<HandlerFunc>) -> &mut Self {
        self.handlers.push(middleware.into());
        self
    }

    /// Derives a sub-group under `component`.
    pub fn group(&self, component: &str) -> Self {
        self.group_with(component, [])
    }

    /// Derives a sub-group under `component` with extra handlers.
    pub fn group_with(
        &self,
        component: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Self {
        let mut prefix = join_paths(&[&self.prefix, component]);
        if prefix.is_empty() {
            prefix = "/".to_string();
        }
        Self {
            prefix,
            handlers: self.handlers.iter().cloned().chain(handlers).collect(),
            table: Arc::clone(&self.table),
        }
    }

    /// Registers a route.
    ///
    /// The route's chain is this group's handlers followed by `handlers`.
    pub fn handle(
        &self,
        method: Method,
        path: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<()> {
        let full_path = absolute(&join_paths(&[&self.prefix, path]));
        let chain: Vec<HandlerFunc> = self.handlers.iter().cloned().chain(handlers).collect();
        if chain.len() > MAX_HANDLERS {
            return Err(RouterError::TooManyHandlers {
                path: full_path,
                count: chain.len(),
                limit: MAX_HANDLERS,
            });
        }

        let pattern = PathPattern::parse(&full_path)?;
        let count = chain.len();
        self.table.register(Route::new(method, pattern, chain))?;
        tracing::debug!(%method, path = %full_path, handlers = count, "route registered");
        Ok(())
    }

    /// Registers a GET route.
    pub fn get(&self, path: &str, handlers: impl IntoIterator<Item = HandlerFunc>) -> Result<()> {
        self.handle(Method::Get, path, handlers)
    }

    /// Registers a POST route.
    pub fn post(&self, path: &str, handlers: impl IntoIterator<Item = HandlerFunc>) -> Result<()> {
        self.handle(Method::Post, path, handlers)
    }

    /// Registers a PUT route.
    pub fn put(&self, path: &str, handlers: impl IntoIterator<Item = HandlerFunc>) -> Result<()> {
        self.handle(Method::Put, path, handlers)
    }

    /// Registers a PATCH route.
    pub fn patch(&self, path: &str, handlers: impl IntoIterator<Item = HandlerFunc>) -> Result<()> {
        self.handle(Method::Patch, path, handlers)
    }

    /// Registers a DELETE route.
    pub fn delete(&self, path: &str, handlers: impl IntoIterator<Item = HandlerFunc>) -> Result<()> {
        self.handle(Method::Delete, path, handlers)
    }

    /// Registers a HEAD route.
    pub fn head(&self, path: &str, handlers: impl IntoIterator<Item = HandlerFunc>) -> Result<()> {
        self.handle(Method::Head, path, handlers)
    }

    /// Registers an OPTIONS route.
    pub fn options(
        &self,
        path: &str,
        handlers: impl IntoIterator<Item = HandlerFunc>,
    ) -> Result<()> {
        self.handle(Method::Options, path, handlers)
    }
}

impl std::fmt::Debug for RouterGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterGroup")
            .field("prefix", &self.prefix)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn noop() -> HandlerFunc {
        handler_fn(|c| Box::pin(async move { c.next().await }))
    }

    fn table() -> Arc<RouteTable> {
        Arc::new(RouteTable::default())
    }

    #[test]
    fn test_group_prefixes() {
        let root = RouterGroup::root(table());
        assert_eq!(root.prefix(), "/");

        let api = root.group("/api");
        assert_eq!(api.prefix(), "/api");
        assert_eq!(api.group("v1/").prefix(), "/api/v1");
        assert_eq!(api.group("").prefix(), "/api");
        assert_eq!(root.group("").prefix(), "/");
    }

    #[test]
    fn test_child_snapshots_parent_handlers() {
        let mut root = RouterGroup::root(table());
        root.middleware(noop());

        let child = root.group_with("/admin", [noop()]);
        root.middleware(noop());

        assert_eq!(root.handlers().len(), 2);
        assert_eq!(child.handlers().len(), 2);
        assert_eq!(child.group("/deep").handlers().len(), 2);
    }

    #[test]
    fn test_registered_route_chain() {
        let table = table();
        let mut root = RouterGroup::root(Arc::clone(&table));
        root.middleware(noop());
        let admin = root.group_with("admin", [noop()]);

        admin.get("/users/:id", [noop(), noop()]).unwrap();

        let routes = table.freeze();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].path(), "/admin/users/:id");
        assert_eq!(routes[0].method(), Method::Get);
        assert_eq!(routes[0].handler_count(), 4);
    }

    #[test]
    fn test_relative_path_on_root() {
        let table = table();
        let root = RouterGroup::root(Arc::clone(&table));
        root.post("items", [noop()]).unwrap();
        root.get("", [noop()]).unwrap();

        let paths: Vec<String> = table.freeze().iter().map(|r| r.path().to_string()).collect();
        assert_eq!(paths, ["/items", "/"]);
    }

    #[test]
    fn test_duplicate_route() {
        let root = RouterGroup::root(table());
        root.get("/ping", [noop()]).unwrap();
        root.post("/ping", [noop()]).unwrap();

        let err = root.get("/ping/", [noop()]).unwrap_err();
        assert!(matches!(err, RouterError::DuplicateRoute { ref path, .. } if path == "/ping"));
    }

    #[test]
    fn test_duplicate_route_ignores_parameter_names() {
        let root = RouterGroup::root(table());
        root.get("/users/:id", [noop()]).unwrap();
        root.get("/users/:id/posts", [noop()]).unwrap();
        root.get("/files/*path", [noop()]).unwrap();

        let err = root.get("/users/:name", [noop()]).unwrap_err();
        assert_eq!(err.to_string(), "route already registered: GET /users/:name");
        assert!(root.get("/files/*rest", [noop()]).is_err());
        assert!(root.put("/users/:name", [noop()]).is_ok());
        assert!(root.get("/users/me", [noop()]).is_ok());
    }

    #[test]
    fn test_handler_limit() {
        let mut root = RouterGroup::root(table());
        for _ in 0..MAX_HANDLERS - 1 {
            root.middleware(noop());
        }
        root.get("/fits", [noop()]).unwrap();

        let err = root.get("/too-long", [noop(), noop()]).unwrap_err();
        assert!(matches!(
            err,
            RouterError::TooManyHandlers { count: 64, limit: 63, .. }
        ));
    }

    #[test]
    fn test_invalid_pattern() {
        let root = RouterGroup::root(table());
        assert!(matches!(
            root.get("/files/*path/more", [noop()]),
            Err(RouterError::InvalidPattern(_))
        ));
    }

    #[test]
    fn test_frozen_table_rejects_routes() {
        let table = table();
        let root = RouterGroup::root(Arc::clone(&table));
        let late = root.group("/late");
        table.freeze();

        assert!(matches!(
            late.get("/x", [noop()]),
            Err(RouterError::Frozen { ref path, .. }) if path == "/late/x"
        ));
    }
}
