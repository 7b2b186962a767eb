//! Body encoders used by the context's rendering helpers.

use serde::Serialize;
use serde_json::Value;

use crate::error::RenderError;

/// Content type of plain text bodies.
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
/// Content type of HTML bodies.
pub const TEXT_HTML: &str = "text/html; charset=utf-8";

/// Wire format for serializable values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `application/json`
    Json,
    /// `application/xml`
    Xml,
}

impl Format {
    /// The `Content-Type` header value for this format.
    pub const fn content_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Xml => "application/xml",
        }
    }

    /// Encodes `value` into a complete body.
    pub fn encode<T: Serialize + ?Sized>(self, value: &T) -> Result<Vec<u8>, RenderError> {
        match self {
            Self::Json => Ok(serde_json::to_vec(value)?),
            Self::Xml => quick_xml::se::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| RenderError::Xml(e.to_string())),
        }
    }
}

/// Error type returned by template renderers.
pub type TemplateError = Box<dyn std::error::Error + Send + Sync>;

/// Renders named HTML templates.
///
/// Loading and parsing templates is up to the implementation; the engine
/// only holds an already initialized renderer and shares it read-only with
/// every request.
pub trait TemplateRenderer: Send + Sync {
    /// Renders template `name` with `data`.
    fn render(&self, name: &str, data: &Value) -> Result<String, TemplateError>;
}
