//! Engine (registration phase) and router (serving phase).

use std::io::Write;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::context::{Context, MAX_HANDLERS};
use crate::error::{Result, RouterError};
use crate::group::{RouteTable, RouterGroup};
use crate::handler::HandlerFunc;
use crate::middleware::{Logger, Recovery};
use crate::path::{PathParams, PathPattern};
use crate::render::{TemplateRenderer, TEXT_PLAIN};
use crate::request::{Method, Request};
use crate::response::Response;
use crate::writer::{BufferedSink, ResponseSink};

const NOT_FOUND_BODY: &[u8] = b"404 page not found";
const METHOD_NOT_ALLOWED_BODY: &[u8] = b"405 method not allowed";
const NOT_FOUND_CHAIN: &str = "<not found>";

/// A single registered route.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: PathPattern,
    handlers: Arc<[HandlerFunc]>,
}

impl Route {
    pub(crate) fn new(method: Method, pattern: PathPattern, handlers: Vec<HandlerFunc>) -> Self {
        Self {
            method,
            pattern,
            handlers: handlers.into(),
        }
    }

    /// HTTP method.
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Absolute path pattern the route was registered with.
    pub fn path(&self) -> &str {
        self.pattern.pattern()
    }

    pub(crate) fn shape(&self) -> &str {
        self.pattern.shape()
    }

    /// Length of the resolved handler chain.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Route registration entry point.
///
/// The engine is the root group (prefix `/`); it dereferences to
/// [`RouterGroup`] so routes and middleware can be added to it directly.
/// Once everything is registered, [`Engine::into_router`] produces the
/// immutable [`Router`] that serves requests.
///
/// ```
/// use trellis::{handler_fn, Engine, Request};
///
/// # async fn run() -> trellis::Result<()> {
/// let engine = Engine::with_default_middleware();
/// engine.get("/ping", [handler_fn(|c| Box::pin(async move {
///     c.string(200, "pong");
/// }))])?;
///
/// let router = engine.into_router()?;
/// let response = router.handle(Request::get("/ping")).await;
/// assert_eq!(response.body_string().as_deref(), Some("pong"));
/// # Ok(())
/// # }
/// ```
pub struct Engine {
    root: RouterGroup,
    not_found: Vec<HandlerFunc>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// Creates an engine without any middleware.
    pub fn new() -> Self {
        Self {
            root: RouterGroup::root(Arc::new(RouteTable::default())),
            not_found: Vec::new(),
            renderer: None,
        }
    }

    /// Creates an engine with [`Recovery`] and [`Logger`] installed.
    pub fn with_default_middleware() -> Self {
        let mut engine = Self::new();
        engine.middleware(Recovery);
        engine.middleware(Logger);
        engine
    }

    /// Handlers that run, after the root middleware, for requests no route
    /// matches.
    ///
    /// The status is preset to 404; if none of them writes a response, the
    /// router sends `404 page not found`.
    pub fn not_found(&mut self, handlers: impl IntoIterator<Item = HandlerFunc>) -> &mut Self {
        self.not_found = handlers.into_iter().collect();
        self
    }

    /// Installs the renderer used by [`Context::html`].
    pub fn html_renderer(&mut self, renderer: impl TemplateRenderer + 'static) -> &mut Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Closes registration and returns the serving router.
    ///
    /// Groups derived from this engine stay usable as values, but registering
    /// through them now fails with [`crate::RouterError::Frozen`].
    ///
    /// # Errors
    ///
    /// [`RouterError::TooManyHandlers`] if the root middleware plus the
    /// not-found handlers exceed [`MAX_HANDLERS`]. The route table is left
    /// open in that case.
    pub fn into_router(self) -> Result<Router> {
        let root_handlers = self.root.handlers().to_vec();
        let not_found: Vec<HandlerFunc> = root_handlers
            .iter()
            .cloned()
            .chain(self.not_found)
            .collect();
        if not_found.len() > MAX_HANDLERS {
            return Err(RouterError::TooManyHandlers {
                path: NOT_FOUND_CHAIN.to_string(),
                count: not_found.len(),
                limit: MAX_HANDLERS,
            });
        }

        let routes = self.root.freeze();
        tracing::debug!(routes = routes.len(), "router ready");
        Ok(Router {
            routes,
            not_found: not_found.into(),
            no_method: root_handlers.into(),
            renderer: self.renderer,
        })
    }
}

impl Deref for Engine {
    type Target = RouterGroup;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

impl DerefMut for Engine {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.root
    }
}

enum Lookup<'a> {
    Found(&'a Route, PathParams),
    MethodNotAllowed,
    NotFound,
}

/// Immutable route table that dispatches requests.
///
/// A router can be shared between any number of tasks; every request gets
/// its own [`Context`].
pub struct Router {
    routes: Vec<Route>,
    not_found: Arc<[HandlerFunc]>,
    no_method: Arc<[HandlerFunc]>,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Router {
    /// Dispatches a request into an in-memory response.
    pub async fn handle(&self, request: Request) -> Response {
        self.dispatch(Box::new(BufferedSink::new()), request).await
    }

    /// Dispatches a request, writing through `sink`.
    ///
    /// Dropping the returned future cancels the chain at its current await
    /// point.
    pub async fn dispatch(&self, sink: Box<dyn ResponseSink>, request: Request) -> Response {
        match self.find_route(&request) {
            Lookup::Found(route, params) => {
                let handlers = Arc::clone(&route.handlers);
                let mut c = self.context(request, params, handlers, sink);
                c.next().await;
                c.finish()
            }
            Lookup::NotFound => {
                let handlers = Arc::clone(&self.not_found);
                self.fallback(request, handlers, sink, 404, NOT_FOUND_BODY)
                    .await
            }
            Lookup::MethodNotAllowed => {
                let handlers = Arc::clone(&self.no_method);
                self.fallback(request, handlers, sink, 405, METHOD_NOT_ALLOWED_BODY)
                    .await
            }
        }
    }

    /// Registered routes, in registration order.
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    async fn fallback(
        &self,
        request: Request,
        handlers: Arc<[HandlerFunc]>,
        sink: Box<dyn ResponseSink>,
        status: u16,
        body: &[u8],
    ) -> Response {
        let mut c = self.context(request, PathParams::new(), handlers, sink);
        c.writer.set_status(status);
        c.next().await;
        if !c.writer.written() {
            c.writer.set_header("Content-Type", TEXT_PLAIN);
            c.writer.write_status(status);
            if let Err(err) = c.writer.write_all(body) {
                tracing::warn!(error = %err, "failed to write fallback response");
            }
        }
        c.finish()
    }

    fn context(
        &self,
        request: Request,
        params: PathParams,
        handlers: Arc<[HandlerFunc]>,
        sink: Box<dyn ResponseSink>,
    ) -> Context {
        Context::new(request, params, handlers, sink).with_renderer(self.renderer.clone())
    }

    fn find_route(&self, request: &Request) -> Lookup<'_> {
        let mut path_matched = false;

        for route in &self.routes {
            if let Some(params) = route.pattern.match_path(&request.path) {
                if route.method == request.method {
                    return Lookup::Found(route, params);
                }
                path_matched = true;
            }
        }

        if path_matched {
            Lookup::MethodNotAllowed
        } else {
            Lookup::NotFound
        }
    }
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    fn hello() -> HandlerFunc {
        handler_fn(|c| {
            Box::pin(async move {
                c.string(200, "Hello, World!");
            })
        })
    }

    fn user() -> HandlerFunc {
        handler_fn(|c| {
            Box::pin(async move {
                let id = c.param("id").unwrap_or("unknown").to_string();
                c.string(200, format!("User: {id}"));
            })
        })
    }

    #[tokio::test]
    async fn test_basic_routing() {
        let engine = Engine::new();
        engine.get("/", [hello()]).unwrap();
        engine.get("/users/:id", [user()]).unwrap();
        let router = engine.into_router().unwrap();

        let res = router.handle(Request::get("/")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body_string(), Some("Hello, World!".to_string()));

        let res = router.handle(Request::get("/users/123")).await;
        assert_eq!(res.body_string(), Some("User: 123".to_string()));
    }

    #[tokio::test]
    async fn test_trailing_slash_matches() {
        let engine = Engine::new();
        engine.get("/users/:id", [user()]).unwrap();
        let router = engine.into_router().unwrap();

        let res = router.handle(Request::get("/users/9/")).await;
        assert_eq!(res.body_string(), Some("User: 9".to_string()));
    }

    #[tokio::test]
    async fn test_not_found() {
        let engine = Engine::new();
        engine.get("/", [hello()]).unwrap();
        let router = engine.into_router().unwrap();

        let res = router.handle(Request::get("/nonexistent")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body_string().as_deref(), Some("404 page not found"));
    }

    #[tokio::test]
    async fn test_custom_not_found_uses_preset_status() {
        let mut engine = Engine::new();
        engine.not_found([handler_fn(|c| {
            Box::pin(async move {
                let path = c.request().path.clone();
                c.render(None, crate::Format::Json, &serde_json::json!({ "missing": path }));
            })
        })]);
        let router = engine.into_router().unwrap();

        let res = router.handle(Request::get("/nope")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.body_string().as_deref(), Some(r#"{"missing":"/nope"}"#));
    }

    #[tokio::test]
    async fn test_root_middleware_runs_for_unmatched_requests() {
        let mut engine = Engine::new();
        engine.middleware(handler_fn(|c| {
            Box::pin(async move {
                c.writer.set_header("X-Seen", "1");
                c.next().await;
            })
        }));
        engine.get("/", [hello()]).unwrap();
        let router = engine.into_router().unwrap();

        let res = router.handle(Request::get("/missing")).await;
        assert_eq!(res.status, 404);
        assert_eq!(res.get_header("X-Seen"), Some("1"));

        let res = router.handle(Request::post("/")).await;
        assert_eq!(res.status, 405);
        assert_eq!(res.get_header("X-Seen"), Some("1"));
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let engine = Engine::new();
        engine.get("/", [hello()]).unwrap();
        let router = engine.into_router().unwrap();

        let res = router.handle(Request::post("/")).await;
        assert_eq!(res.status, 405);
    }

    #[tokio::test]
    async fn test_first_registered_route_wins() {
        let engine = Engine::new();
        engine.get("/users/me", [hello()]).unwrap();
        engine.get("/users/:id", [user()]).unwrap();
        let router = engine.into_router().unwrap();

        let res = router.handle(Request::get("/users/me")).await;
        assert_eq!(res.body_string(), Some("Hello, World!".to_string()));
        assert_eq!(router.routes().len(), 2);
    }

    #[tokio::test]
    async fn test_registration_after_freeze_fails() {
        let engine = Engine::new();
        let api = engine.group("/api");
        let _router = engine.into_router().unwrap();

        assert!(matches!(
            api.get("/late", [hello()]),
            Err(crate::RouterError::Frozen { .. })
        ));
    }

    #[test]
    fn test_not_found_chain_respects_handler_limit() {
        let mut engine = Engine::new();
        engine.middleware(hello());
        engine.not_found((0..MAX_HANDLERS - 1).map(|_| hello()));
        assert!(engine.into_router().is_ok());

        let mut engine = Engine::new();
        let api = engine.group("/api");
        engine.middleware(hello());
        engine.not_found((0..MAX_HANDLERS * 4).map(|_| hello()));
        let err = engine.into_router().unwrap_err();
        assert!(matches!(
            err,
            RouterError::TooManyHandlers { count: 253, limit: 63, .. }
        ));
        assert!(api.get("/still-open", [hello()]).is_ok());
    }

    #[test]
    fn test_router_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Router>();
    }
}
