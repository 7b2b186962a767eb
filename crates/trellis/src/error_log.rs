//! Errors recorded on a request context.

use std::fmt;
use std::ops::Deref;

use serde::Serialize;
use serde_json::Value;

/// Classification attached to every recorded error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Request body could not be decoded.
    Binding,
    /// Response body could not be encoded.
    Render,
    /// Internal error, not meant for the client.
    Private,
    /// Error that may be shown to the client.
    Public,
}

impl ErrorKind {
    const fn bit(self) -> u8 {
        match self {
            Self::Binding => 1,
            Self::Render => 1 << 1,
            Self::Private => 1 << 2,
            Self::Public => 1 << 3,
        }
    }
}

/// A set of [`ErrorKind`]s used to select recorded errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorFilter(u8);

impl ErrorFilter {
    /// Matches every kind.
    pub const ALL: Self = Self(0b1111);

    /// Matches nothing.
    pub const NONE: Self = Self(0);

    /// Matches a single kind.
    pub const fn only(kind: ErrorKind) -> Self {
        Self(kind.bit())
    }

    /// Adds a kind to the set.
    #[must_use]
    pub const fn with(self, kind: ErrorKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Whether `kind` is in the set.
    pub const fn matches(self, kind: ErrorKind) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl Default for ErrorFilter {
    fn default() -> Self {
        Self::ALL
    }
}

/// One recorded error. Never modified once recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMsg {
    /// Human readable description.
    #[serde(rename = "msg")]
    pub message: String,
    /// Context attached by whoever recorded the error.
    pub meta: Value,
    /// Classification used for filtering.
    pub kind: ErrorKind,
}

/// The ordered, append-only error log of one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorMsgs(Vec<ErrorMsg>);

impl ErrorMsgs {
    /// Creates an empty log.
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    pub(crate) fn push(&mut self, msg: ErrorMsg) {
        self.0.push(msg);
    }

    /// Returns the errors whose kind is in `filter`, in recording order.
    pub fn by_kind(&self, filter: ErrorFilter) -> Self {
        Self(
            self.0
                .iter()
                .filter(|e| filter.matches(e.kind))
                .cloned()
                .collect(),
        )
    }

    /// The most recently recorded error.
    pub fn last(&self) -> Option<&ErrorMsg> {
        self.0.last()
    }
}

impl Deref for ErrorMsgs {
    type Target = [ErrorMsg];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for ErrorMsgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, msg) in self.0.iter().enumerate() {
            writeln!(f, "Error #{:02}: {}", i + 1, msg.message)?;
            writeln!(f, "     Meta: {}", msg.meta)?;
        }
        Ok(())
    }
}
