//! Error types for route registration and response rendering.

use thiserror::Error;

/// Registration-time errors raised while building the route table.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The path pattern cannot be compiled.
    #[error("invalid path pattern: {0}")]
    InvalidPattern(String),

    /// A route with the same method and path was already registered.
    /// Parameter names do not tell paths apart.
    #[error("route already registered: {method} {path}")]
    DuplicateRoute { method: String, path: String },

    /// The resolved handler chain exceeds [`crate::MAX_HANDLERS`].
    #[error("too many handlers for {path}: {count} (limit {limit})")]
    TooManyHandlers {
        path: String,
        count: usize,
        limit: usize,
    },

    /// A route was registered after the engine was turned into a router.
    #[error("route table is frozen, cannot register {method} {path}")]
    Frozen { method: String, path: String },

    /// The HTTP method token is not supported.
    #[error("unknown HTTP method: {0}")]
    UnknownMethod(String),
}

/// Failures while encoding a response body.
#[derive(Debug, Error)]
pub enum RenderError {
    /// JSON serialization failed.
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// XML serialization failed.
    #[error("xml encoding failed: {0}")]
    Xml(String),

    /// An HTML response was requested but no template renderer is installed.
    #[error("no template renderer configured")]
    NoRenderer,

    /// The template renderer reported an error.
    #[error("template {name} failed: {message}")]
    Template { name: String, message: String },

    /// The response sink refused the body.
    #[error("write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for registration operations.
pub type Result<T> = std::result::Result<T, RouterError>;
