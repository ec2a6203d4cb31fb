//! Domain-level error types for chat-export.
//!
//! All errors are typed with `thiserror`. Only a few of them ever reach the
//! user: per-message extraction problems are logged and tallied instead.

use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// The page URL does not belong to any supported chat application.
    #[error("Unsupported site: {url}")]
    UnsupportedSite { url: String },

    /// A page interaction (query, click, scroll, snapshot) failed.
    #[error("Page error: {message}")]
    Page { message: String },

    /// A CSS selector could not be parsed.
    #[error("Invalid selector `{selector}`: {message}")]
    Selector { selector: String, message: String },

    /// Reading or writing the system clipboard failed.
    #[error("Clipboard error: {message}")]
    Clipboard { message: String },

    /// The DevTools connection failed or returned an error.
    #[error("Browser connection error: {message}")]
    Cdp {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration or environment error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON parsing failed.
    #[error("JSON parse error: {message}")]
    JsonParse {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a page error.
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create a clipboard error.
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard {
            message: message.into(),
        }
    }

    /// Create a DevTools connection error from any underlying error.
    pub fn cdp<E>(message: impl Into<String>, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Cdp {
            message: message.into(),
            source: Some(Box::new(err)),
        }
    }

    /// Create a JSON parse error.
    pub fn json_parse(err: serde_json::Error) -> Self {
        Self::JsonParse {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;
