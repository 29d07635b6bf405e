/// Error types for WebBlur
use thiserror::Error;

/// Errors raised by the rule store, the bridges and the DOM glue.
///
/// Bad url patterns never surface here; the matcher falls back to substring
/// matching instead.
#[derive(Error, Debug)]
pub enum BlurError {
    /// A rule is missing one of its required fields.
    #[error("rule is missing required field '{field}'")]
    MalformedRule { field: &'static str },

    /// An import document could not be used.
    #[error("invalid import file: {0}")]
    MalformedImport(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value could not cross the JS boundary.
    #[error("bridge error: {0}")]
    Bridge(String),

    /// The key-value store rejected a read or write.
    #[error("storage error: {0}")]
    Persistence(String),

    /// A DOM operation failed (detached node, missing document, ...).
    #[error("DOM error: {0}")]
    Dom(String),
}

pub type Result<T> = std::result::Result<T, BlurError>;

impl BlurError {
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn dom(message: impl Into<String>) -> Self {
        Self::Dom(message.into())
    }

    pub fn bridge(message: impl Into<String>) -> Self {
        Self::Bridge(message.into())
    }

    /// True for errors caused by user-supplied data rather than the environment.
    pub fn is_malformed_input(&self) -> bool {
        matches!(self, Self::MalformedRule { .. } | Self::MalformedImport(_) | Self::Json(_))
    }
}

impl From<serde_wasm_bindgen::Error> for BlurError {
    fn from(err: serde_wasm_bindgen::Error) -> Self {
        Self::Bridge(err.to_string())
    }
}
