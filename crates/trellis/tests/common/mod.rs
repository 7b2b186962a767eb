#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use trellis::{handler_fn, Engine, HandlerFunc, Request, Response, Router};

/// Shared record of which handler ran when.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Middleware recording `name:pre`, running the rest, then `name:post`.
    pub fn wrap(&self, name: impl Into<String>) -> HandlerFunc {
        let trace = self.clone();
        let name = name.into();
        handler_fn(move |c| {
            let trace = trace.clone();
            let name = name.clone();
            Box::pin(async move {
                trace.push(format!("{name}:pre"));
                c.next().await;
                trace.push(format!("{name}:post"));
            })
        })
    }

    /// Handler recording `name` and not calling `next()`.
    pub fn leaf(&self, name: impl Into<String>) -> HandlerFunc {
        let trace = self.clone();
        let name = name.into();
        handler_fn(move |_c| {
            let trace = trace.clone();
            let name = name.clone();
            Box::pin(async move { trace.push(name) })
        })
    }

    /// Handler recording `name` and passing control on.
    pub fn step(&self, name: impl Into<String>) -> HandlerFunc {
        let trace = self.clone();
        let name = name.into();
        handler_fn(move |c| {
            let trace = trace.clone();
            let name = name.clone();
            Box::pin(async move {
                trace.push(name);
                c.next().await;
            })
        })
    }

    /// Handler recording `name` and aborting with `code`.
    pub fn aborter(&self, name: impl Into<String>, code: u16) -> HandlerFunc {
        let trace = self.clone();
        let name = name.into();
        handler_fn(move |c| {
            let trace = trace.clone();
            let name = name.clone();
            Box::pin(async move {
                trace.push(name);
                c.abort(code);
            })
        })
    }
}

pub fn text(body: &'static str) -> HandlerFunc {
    handler_fn(move |c| Box::pin(async move { c.string(200, body) }))
}

pub async fn get(router: &Router, path: &str) -> Response {
    router.handle(Request::get(path)).await
}

pub fn engine_with(path: &str, handlers: Vec<HandlerFunc>) -> Router {
    let engine = Engine::new();
    engine
        .get(path, handlers)
        .unwrap_or_else(|e| panic!("Failed to register {path}: {e}"));
    engine.into_router().unwrap()
}
