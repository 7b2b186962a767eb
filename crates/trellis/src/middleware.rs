//! Bundled middleware: request logging, error log rendering and panic
//! recovery.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;

use crate::context::Context;
use crate::error_log::ErrorFilter;
use crate::handler::{BoxFuture, Handler};
use crate::render::Format;

/// Logs one event per request once the rest of the chain returned.
///
/// The event carries the requester, method, path, final status and latency,
/// plus the error log when it is not empty. 5xx responses log at `ERROR`,
/// 4xx at `WARN`, everything else at `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Handler for Logger {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let start = Instant::now();
            c.next().await;
            let latency = start.elapsed();

            let request = c.request();
            let requester = request.client_ip().unwrap_or("-");
            let method = request.method;
            let path = request.path.as_str();
            let status = c.writer.status().unwrap_or(200);
            let errors = (!c.errors().is_empty()).then(|| c.errors().to_string());
            let errors = errors.as_deref().map(str::trim_end);

            match status {
                500..=u16::MAX => tracing::error!(requester, %method, path, status, ?latency, errors, "request"),
                400..=499 => tracing::warn!(requester, %method, path, status, ?latency, errors, "request"),
                _ => tracing::info!(requester, %method, path, status, ?latency, errors, "request"),
            }
        })
    }
}

/// Renders the request's recorded errors as JSON after the chain returns.
///
/// The status already on the writer is kept. Nothing is written when no
/// error of a selected kind was recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorLogger {
    filter: ErrorFilter,
}

impl ErrorLogger {
    /// Renders every recorded error.
    pub fn new() -> Self {
        Self::default()
    }

    /// Renders only errors whose kind is in `filter`.
    pub const fn only(filter: ErrorFilter) -> Self {
        Self { filter }
    }
}

impl Handler for ErrorLogger {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            c.next().await;

            let errors = c.errors().by_kind(self.filter);
            if !errors.is_empty() {
                c.render(None, Format::Json, &errors);
            }
        })
    }
}

/// Turns a panic in a later handler into a 500 response.
///
/// The chain is marked aborted; handlers between the panicking one and this
/// middleware do not finish their post-`next()` code.
#[derive(Debug, Clone, Copy, Default)]
pub struct Recovery;

impl Handler for Recovery {
    fn call<'a>(&'a self, c: &'a mut Context) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let outcome = AssertUnwindSafe(c.next()).catch_unwind().await;
            let Err(payload) = outcome else {
                return;
            };

            let message = panic_message(payload.as_ref());
            tracing::error!(
                method = %c.request().method,
                path = %c.request().path,
                panic = message,
                "handler panicked"
            );
            c.record_error(format!("panic: {message}"), "Recovered");
            if c.writer.written() {
                c.mark_aborted();
            } else {
                c.abort(500);
            }
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
