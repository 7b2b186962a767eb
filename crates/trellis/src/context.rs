//! Per-request execution context and chain control flow.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::RenderError;
use crate::error_log::{ErrorKind, ErrorMsg, ErrorMsgs};
use crate::handler::{BoxFuture, HandlerFunc};
use crate::path::PathParams;
use crate::render::{Format, TemplateRenderer, TEXT_HTML, TEXT_PLAIN};
use crate::request::Request;
use crate::response::Response;
use crate::writer::{ResponseSink, ResponseWriter};

/// Longest handler chain a route may resolve to.
///
/// Each handler that calls [`Context::next`] nests the rest of the chain
/// inside its own future, so this also bounds the nesting depth.
pub const MAX_HANDLERS: usize = 63;

const CONTENT_TYPE: &str = "Content-Type";
const ABORTED_META: &str = "Operation aborted";

/// Position of a context in its handler chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// No handler has run yet.
    Pending,
    /// Handler `i` is executing.
    Running(usize),
    /// Handler `i` returned without calling [`Context::next`]; the handlers
    /// after it never run.
    Halted(usize),
    /// Every handler ran.
    Completed,
    /// [`Context::abort`] was called.
    Aborted,
}

/// Everything one request carries through its handler chain.
///
/// A context is created by the router for every matched request and dropped
/// once the chain returns. Nothing in it is shared with other requests.
pub struct Context {
    request: Request,
    params: PathParams,
    /// Response writer; handlers write status, headers and body through it.
    pub writer: ResponseWriter,
    keys: Option<HashMap<String, Box<dyn Any + Send + Sync>>>,
    errors: ErrorMsgs,
    handlers: Arc<[HandlerFunc]>,
    state: ChainState,
    renderer: Option<Arc<dyn TemplateRenderer>>,
}

impl Context {
    /// Creates a context positioned before the first handler.
    pub fn new(
        request: Request,
        params: PathParams,
        handlers: Arc<[HandlerFunc]>,
        sink: Box<dyn ResponseSink>,
    ) -> Self {
        Self {
            request,
            params,
            writer: ResponseWriter::new(sink),
            keys: None,
            errors: ErrorMsgs::new(),
            handlers,
            state: ChainState::Pending,
            renderer: None,
        }
    }

    pub(crate) fn with_renderer(mut self, renderer: Option<Arc<dyn TemplateRenderer>>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Runs the rest of the chain.
    ///
    /// The router calls this once to start the chain. A middleware calls it
    /// from its own body to run every later handler, then continues with its
    /// own code once they are done. A handler that returns without calling
    /// `next()` ends the chain there, silently. Calling `next()` after the
    /// chain was halted, completed or aborted does nothing.
    pub fn next(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let index = match self.state {
                ChainState::Pending => 0,
                ChainState::Running(i) => i + 1,
                ChainState::Halted(_) | ChainState::Completed | ChainState::Aborted => return,
            };
            if index >= self.handlers.len() {
                self.state = ChainState::Completed;
                return;
            }

            self.state = ChainState::Running(index);
            let handler = self.handlers[index].clone();
            handler.call(self).await;

            if self.state == ChainState::Running(index) {
                self.state = if index + 1 == self.handlers.len() {
                    ChainState::Completed
                } else {
                    ChainState::Halted(index)
                };
            }
        })
    }

    /// Writes `code` as the response status and stops the chain.
    ///
    /// Handlers below this one on the call stack still finish their own code
    /// after their `next()` returns; no later handler in the chain runs.
    pub fn abort(&mut self, code: u16) {
        self.writer.write_status(code);
        self.mark_aborted();
    }

    pub(crate) fn mark_aborted(&mut self) {
        self.state = ChainState::Aborted;
    }

    /// Records `err` and aborts with `code`.
    ///
    /// Same as `record_error(err, "Operation aborted")` followed by
    /// `abort(code)`.
    pub fn fail(&mut self, code: u16, err: impl fmt::Display) {
        self.record_error(err, ABORTED_META);
        self.abort(code);
    }

    /// Appends an error to the request's error log.
    ///
    /// Does not touch the chain or the response. A middleware can collect
    /// the log later, e.g. [`crate::ErrorLogger`].
    pub fn record_error(&mut self, err: impl fmt::Display, meta: impl Into<Value>) {
        self.record_error_as(ErrorKind::Private, err, meta);
    }

    /// Appends an error of a given kind.
    pub fn record_error_as(
        &mut self,
        kind: ErrorKind,
        err: impl fmt::Display,
        meta: impl Into<Value>,
    ) {
        self.errors.push(ErrorMsg {
            message: err.to_string(),
            meta: meta.into(),
            kind,
        });
    }

    /// Errors recorded so far, oldest first.
    pub const fn errors(&self) -> &ErrorMsgs {
        &self.errors
    }

    /// Where the chain currently stands.
    pub const fn state(&self) -> ChainState {
        self.state
    }

    /// Whether [`Context::abort`] was called.
    pub fn is_aborted(&self) -> bool {
        self.state == ChainState::Aborted
    }

    /// Stores a value for later handlers of the same request.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.keys
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), Box::new(value));
    }

    /// Returns the value stored under `key`, if it holds a `T`.
    pub fn try_get<T: Any>(&self, key: &str) -> Option<&T> {
        let value = self.keys.as_ref()?.get(key)?;
        (**value).downcast_ref::<T>()
    }

    /// Returns the value stored under `key`.
    ///
    /// # Panics
    ///
    /// Panics if nothing of type `T` was stored under `key`. Keys are a
    /// contract between the handlers of one chain, so a missing key is a
    /// bug in the chain, not a runtime condition.
    pub fn get<T: Any>(&self, key: &str) -> &T {
        match self.try_get(key) {
            Some(value) => value,
            None => panic!(
                "key {key} does not exist or does not hold a {}",
                std::any::type_name::<T>()
            ),
        }
    }

    /// The inbound request.
    pub const fn request(&self) -> &Request {
        &self.request
    }

    /// Path parameters extracted by the matcher.
    pub const fn params(&self) -> &PathParams {
        &self.params
    }

    /// A single path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Decodes the request body as JSON.
    pub fn parse_json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.request.body)
    }

    /// Decodes the request body as JSON, aborting with 400 when it is not
    /// valid.
    pub fn bind_json<T: DeserializeOwned>(&mut self) -> Option<T> {
        let decoded = self.parse_json();
        self.bind(decoded)
    }

    /// Decodes the request body as XML. The root element name is not checked.
    pub fn parse_xml<T: DeserializeOwned>(&self) -> Result<T, quick_xml::DeError> {
        quick_xml::de::from_reader(self.request.body.as_slice())
    }

    /// Decodes the request body as XML, aborting with 400 when it is not
    /// valid.
    pub fn bind_xml<T: DeserializeOwned>(&mut self) -> Option<T> {
        let decoded = self.parse_xml();
        self.bind(decoded)
    }

    fn bind<T, E: fmt::Display>(&mut self, decoded: Result<T, E>) -> Option<T> {
        match decoded {
            Ok(value) => Some(value),
            Err(err) => {
                self.record_error_as(ErrorKind::Binding, err, ABORTED_META);
                self.abort(400);
                None
            }
        }
    }

    /// Serializes `value` as JSON with status `code`.
    pub fn json<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) {
        self.render(Some(code), Format::Json, value);
    }

    /// Serializes `value` as XML with status `code`.
    pub fn xml<T: Serialize + ?Sized>(&mut self, code: u16, value: &T) {
        self.render(Some(code), Format::Xml, value);
    }

    /// Serializes `value` in `format`.
    ///
    /// With `code == None` the status is left as it is: if nothing was
    /// written yet the body write sends whatever status is pending.
    pub fn render<T: Serialize + ?Sized>(&mut self, code: Option<u16>, format: Format, value: &T) {
        let body = format.encode(value);
        let meta = json!({ "type": std::any::type_name::<T>() });
        self.send(code, format.content_type(), body, meta);
    }

    /// Writes a plain text body.
    pub fn string(&mut self, code: u16, text: impl AsRef<str>) {
        let body = text.as_ref().as_bytes().to_vec();
        self.send(Some(code), TEXT_PLAIN, Ok(body), Value::Null);
    }

    /// Writes raw bytes with the given content type.
    pub fn data(&mut self, code: u16, content_type: &str, bytes: impl Into<Vec<u8>>) {
        self.send(Some(code), content_type, Ok(bytes.into()), Value::Null);
    }

    /// Renders template `name` through the engine's template renderer.
    pub fn html<T: Serialize + ?Sized>(&mut self, code: u16, name: &str, data: &T) {
        let data = serde_json::to_value(data);
        let body = match (&self.renderer, &data) {
            (None, _) => Err(RenderError::NoRenderer),
            (Some(_), Err(err)) => Err(RenderError::Template {
                name: name.to_string(),
                message: err.to_string(),
            }),
            (Some(renderer), Ok(value)) => renderer
                .render(name, value)
                .map(String::into_bytes)
                .map_err(|err| RenderError::Template {
                    name: name.to_string(),
                    message: err.to_string(),
                }),
        };
        let meta = json!({ "name": name, "data": data.unwrap_or(Value::Null) });
        self.send(Some(code), TEXT_HTML, body, meta);
    }

    fn send(
        &mut self,
        code: Option<u16>,
        content_type: &str,
        body: Result<Vec<u8>, RenderError>,
        meta: Value,
    ) {
        match body {
            Ok(bytes) => {
                if !self.writer.written() {
                    self.writer.set_header(CONTENT_TYPE, content_type);
                }
                if let Some(code) = code {
                    self.writer.write_status(code);
                }
                if let Err(err) = self.writer.write_all(&bytes) {
                    self.record_error_as(ErrorKind::Render, RenderError::from(err), meta);
                }
            }
            Err(err) => {
                let message = err.to_string();
                self.record_error_as(ErrorKind::Render, err, meta);
                if !self.writer.written() {
                    self.writer.set_header(CONTENT_TYPE, TEXT_PLAIN);
                    self.writer.write_status(500);
                    if let Err(err) = self.writer.write_all(message.as_bytes()) {
                        tracing::warn!(error = %err, "failed to write error response");
                    }
                }
            }
        }
    }

    /// Consumes the context and returns what the sink sent.
    pub fn finish(self) -> Response {
        self.writer.into_sink().finish()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.request.method)
            .field("path", &self.request.path)
            .field("state", &self.state)
            .field("handlers", &self.handlers.len())
            .field("writer", &self.writer)
            .field("errors", &self.errors.len())
            .finish_non_exhaustive()
    }
}
