//! The unit of work in a handler chain.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;

/// A boxed future for async handler operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A step in a handler chain.
///
/// A handler reports its outcome only through the context: the response
/// writer, the error log, the side-table and the chain controls
/// ([`Context::next`], [`Context::abort`], [`Context::fail`]).
///
/// # Example
///
/// ```
/// use std::time::Instant;
/// use trellis::{BoxFuture, Context, Handler};
///
/// struct Timing;
///
/// impl Handler for Timing {
///     fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()> {
///         Box::pin(async move {
///             let start = Instant::now();
///             c.next().await;
///             let elapsed = start.elapsed();
///             c.set("elapsed", elapsed);
///         })
///     }
/// }
/// ```
pub trait Handler: Send + Sync {
    /// Runs this handler against the request context.
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()>;
}

/// Shared handle to a [`Handler`], cheap to clone into many chains.
#[derive(Clone)]
pub struct HandlerFunc(Arc<dyn Handler>);

impl HandlerFunc {
    /// Wraps a handler.
    pub fn new(handler: impl Handler + 'static) -> Self {
        Self(Arc::new(handler))
    }

    pub(crate) fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()> {
        self.0.call(c)
    }
}

impl<H: Handler + 'static> From<H> for HandlerFunc {
    fn from(handler: H) -> Self {
        Self::new(handler)
    }
}

impl fmt::Debug for HandlerFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HandlerFunc")
    }
}

struct FnHandler<F>(F);

impl<F> Handler for FnHandler<F>
where
    F: for<'c> Fn(&'c mut Context) -> BoxFuture<'c, ()> + Send + Sync,
{
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()> {
        (self.0)(c)
    }
}

/// Turns a closure into a [`HandlerFunc`].
///
/// ```
/// use trellis::handler_fn;
///
/// let hello = handler_fn(|c| Box::pin(async move {
///     c.string(200, "hello");
/// }));
/// ```
pub fn handler_fn<F>(f: F) -> HandlerFunc
where
    F: for<'c> Fn(&'c mut Context) -> BoxFuture<'c, ()> + Send + Sync + 'static,
{
    HandlerFunc::new(FnHandler(f))
}
