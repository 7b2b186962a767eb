//! # trellis
//!
//! Middleware-chained HTTP request dispatch with route groups.
//!
//! This crate provides:
//! - Route groups: path prefixes plus handler lists, composable into trees
//! - One ordered handler chain per route, middleware first
//! - A per-request [`Context`] with chain control (`next`, `abort`, `fail`),
//!   an error log, a typed side-table and response rendering helpers
//! - A response writer that remembers the status and whether anything was
//!   sent
//! - Bundled middleware: [`Logger`], [`ErrorLogger`], [`Recovery`]
//!
//! ## Quick Start
//!
//! ```
//! use trellis::{handler_fn, Engine, Request};
//!
//! # async fn run() -> trellis::Result<()> {
//! let engine = Engine::with_default_middleware();
//! engine.get("/users/:id", [handler_fn(|c| Box::pin(async move {
//!     let id = c.param("id").unwrap_or_default().to_string();
//!     c.json(200, &serde_json::json!({ "id": id }));
//! }))])?;
//!
//! let router = engine.into_router()?;
//! let response = router.handle(Request::get("/users/42")).await;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```
//!
//! ## Chains
//!
//! A route's chain is the handlers of every enclosing group (outermost
//! first) followed by the route's own handlers. A middleware runs the rest of
//! the chain by awaiting [`Context::next`] and can then inspect what the
//! later handlers did:
//!
//! ```
//! use trellis::handler_fn;
//!
//! let timing = handler_fn(|c| Box::pin(async move {
//!     let start = std::time::Instant::now();
//!     c.next().await;
//!     tracing::info!(status = ?c.writer.status(), elapsed = ?start.elapsed());
//! }));
//! # let _ = timing;
//! ```
//!
//! A handler that returns without calling `next()` ends the chain there.
//! [`Context::abort`] ends it with a status code, and handlers below the
//! aborting one on the call stack still run the code after their `next()`.
//!
//! ## Route Groups
//!
//! ```
//! use trellis::{handler_fn, Engine};
//!
//! let engine = Engine::new();
//! let api = engine.group("/api/v1");
//! let admin = api.group_with("/admin", [handler_fn(|c| Box::pin(async move {
//!     if c.request().get_header("X-Admin").is_none() {
//!         c.abort(403);
//!     }
//!     c.next().await;
//! }))]);
//! admin
//!     .delete("/users/:id", [handler_fn(|c| Box::pin(async move {
//!         c.writer.write_status(204);
//!     }))])
//!     .unwrap();
//! ```

mod context;
mod error;
mod error_log;
mod group;
mod handler;
mod middleware;
mod path;
mod render;
mod request;
mod response;
mod router;
mod writer;

pub use context::{ChainState, Context, MAX_HANDLERS};
pub use error::{RenderError, Result, RouterError};
pub use error_log::{ErrorFilter, ErrorKind, ErrorMsg, ErrorMsgs};
pub use group::RouterGroup;
pub use handler::{handler_fn, BoxFuture, Handler, HandlerFunc};
pub use middleware::{ErrorLogger, Logger, Recovery};
pub use path::{clean_path, join_paths, PathParams, PathPattern};
pub use render::{Format, TemplateError, TemplateRenderer, TEXT_HTML, TEXT_PLAIN};
pub use request::{Method, Request};
pub use response::Response;
pub use router::{Engine, Route, Router};
pub use writer::{BufferedSink, ResponseSink, ResponseWriter};
