//! Response sink abstraction and the observable writer wrapped around it.

use std::collections::HashMap;
use std::io;

use crate::response::Response;

/// The raw destination of a response.
///
/// A sink is the source of truth for what went out on the wire. The
/// [`ResponseWriter`] only mirrors what it forwarded so later handlers can
/// inspect it.
pub trait ResponseSink: Send {
    /// Headers that will be sent with the status line.
    fn headers(&self) -> &HashMap<String, String>;

    /// Mutable access to the pending headers.
    fn headers_mut(&mut self) -> &mut HashMap<String, String>;

    /// Sends the status line (and with it the headers).
    fn write_status(&mut self, code: u16);

    /// Appends a chunk to the body.
    fn write_body(&mut self, chunk: &[u8]) -> io::Result<usize>;

    /// Consumes the sink, returning what was sent.
    fn finish(self: Box<Self>) -> Response;
}

#[derive(Debug)]
struct Committed {
    status: u16,
    headers: HashMap<String, String>,
}

/// In-memory sink that behaves like a regular HTTP/1 response writer.
///
/// Headers are committed by the first status or body write; header changes
/// after that point are not part of the response. Later status writes are
/// ignored. A response with nothing written finishes as an empty 200.
#[derive(Debug, Default)]
pub struct BufferedSink {
    headers: HashMap<String, String>,
    committed: Option<Committed>,
    body: Vec<u8>,
}

impl BufferedSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResponseSink for BufferedSink {
    fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        &mut self.headers
    }

    fn write_status(&mut self, code: u16) {
        if let Some(committed) = &self.committed {
            tracing::warn!(
                status = committed.status,
                attempted = code,
                "superfluous status write ignored"
            );
            return;
        }
        self.committed = Some(Committed {
            status: code,
            headers: self.headers.clone(),
        });
    }

    fn write_body(&mut self, chunk: &[u8]) -> io::Result<usize> {
        if self.committed.is_none() {
            self.write_status(200);
        }
        self.body.extend_from_slice(chunk);
        Ok(chunk.len())
    }

    fn finish(self: Box<Self>) -> Response {
        let this = *self;
        let (status, headers) = match this.committed {
            Some(committed) => (committed.status, committed.headers),
            None => (200, this.headers),
        };
        Response {
            status,
            headers,
            body: this.body,
        }
    }
}

/// Wraps a [`ResponseSink`] and records what has been sent through it.
///
/// `status()` is `None` until a status is set, `written()` is false until a
/// status line or body byte went to the sink.
pub struct ResponseWriter {
    sink: Box<dyn ResponseSink>,
    status: Option<u16>,
    written: bool,
}

impl ResponseWriter {
    /// Wraps a sink.
    pub fn new(sink: Box<dyn ResponseSink>) -> Self {
        Self {
            sink,
            status: None,
            written: false,
        }
    }

    /// Sends a status line.
    ///
    /// Every call is forwarded to the sink; the writer only keeps the last
    /// value so later handlers observe the final state.
    pub fn write_status(&mut self, code: u16) {
        self.status = Some(code);
        self.written = true;
        self.sink.write_status(code);
    }

    /// Sets the status that an upcoming body write will send, without
    /// writing anything. Ignored once the response is written.
    pub(crate) fn set_status(&mut self, code: u16) {
        if !self.written {
            self.status = Some(code);
        }
    }

    /// The last status set or written.
    pub const fn status(&self) -> Option<u16> {
        self.status
    }

    /// Whether the status line or any body byte has been sent.
    pub const fn written(&self) -> bool {
        self.written
    }

    /// Pending response headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        self.sink.headers()
    }

    /// Mutable access to the pending response headers.
    pub fn headers_mut(&mut self) -> &mut HashMap<String, String> {
        self.sink.headers_mut()
    }

    /// Sets a response header.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.sink.headers_mut().insert(key.into(), value.into());
    }

    pub(crate) fn into_sink(self) -> Box<dyn ResponseSink> {
        self.sink
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.written {
            self.write_status(self.status.unwrap_or(200));
        }
        self.sink.write_body(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}
