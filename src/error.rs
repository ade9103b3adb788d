//! Error types for skulk

use thiserror::Error;

/// Result type for skulk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for skulk
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to launch the browser process
    #[error("Failed to launch Chrome: {0}")]
    Launch(String),

    /// Chrome not found on this system
    #[error("Chrome not found")]
    ChromeNotFound,

    /// Transport error
    #[error("Transport error: {context}")]
    Transport {
        context: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// CDP protocol error
    #[error("CDP error in {method}: {message} (code {code})")]
    Cdp {
        method: String,
        code: i64,
        message: String,
    },

    /// CDP error without method context (for simple cases)
    #[error("CDP error: {0}")]
    CdpSimple(String),

    /// Navigation failed after the full retry budget
    #[error("Navigation to {url} failed after {attempts} attempts: {cause}")]
    Navigation {
        url: String,
        attempts: u32,
        #[source]
        cause: Box<Error>,
    },

    /// A single navigation attempt was rejected by the browser
    #[error("Navigation rejected: {0}")]
    NavigationAttempt(String),

    /// Interaction target could not be located or made visible in time
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
            source: None,
        }
    }

    /// Create a transport error with IO source
    pub fn transport_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a CDP error with full context
    pub fn cdp(method: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self::Cdp {
            method: method.into(),
            code,
            message: message.into(),
        }
    }

    /// Wrap the final failed attempt of a navigation retry loop
    pub fn navigation(url: impl Into<String>, attempts: u32, cause: Error) -> Self {
        Self::Navigation {
            url: url.into(),
            attempts,
            cause: Box::new(cause),
        }
    }
}
