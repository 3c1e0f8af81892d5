//! Error types for the pagebridge core.
//!
//! This module defines the centralized crate error [`BridgeError`] and a
//! [`Result`] alias used throughout. Note that `BridgeError` is the *plumbing*
//! error of the framework itself; failures that the application wants to
//! classify, route and log are wrapped into [`crate::error::AppError`] by the
//! error handler.

use thiserror::Error;

/// The main error type for pagebridge operations.
///
/// All variants carry owned strings so the type stays `Clone`: fetch results
/// are shared between concurrent callers through deduplicated futures, which
/// requires the error half of the `Result` to be cloneable as well.
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    /// A resource fetch against the backend API failed.
    ///
    /// `status` carries the HTTP status code when the server answered with a
    /// failure response; it is `None` for transport-level failures. The error
    /// handler adopts the status as the error code of the resulting
    /// `AppError`.
    #[error("resource fetch failed{}: {message}", status.map(|s| format!(" ({s})")).unwrap_or_default())]
    Fetch {
        /// HTTP status of the failure response, if one was received.
        status: Option<u16>,
        /// Description of what went wrong.
        message: String,
    },

    /// The server violated the out-of-band instruction protocol.
    ///
    /// Raised when a 203 response carries an unknown instruction type or is
    /// missing required fields.
    #[error("special response protocol error: {0}")]
    Protocol(String),

    /// A hook or event listener failed.
    ///
    /// For `emit` the bus swallows and logs these; for `emit_hook` they are
    /// propagated to the pipeline caller.
    #[error("listener error: {0}")]
    Listener(String),

    /// The application configuration is invalid or incomplete.
    #[error("configuration error: {0}")]
    Config(String),

    /// A bootstrap step could not complete.
    #[error("bootstrap error: {0}")]
    Bootstrap(String),

    /// The renderer collaborator failed to mount or update a tree.
    #[error("render error: {0}")]
    Render(String),

    /// A payload could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl BridgeError {
    /// Shorthand for a transport-level fetch failure without a status code.
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            status: None,
            message: message.into(),
        }
    }

    /// Shorthand for a fetch failure that carries an HTTP status.
    pub fn fetch_with_status(status: u16, message: impl Into<String>) -> Self {
        Self::Fetch {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Returns the HTTP status associated with this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Fetch { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for pagebridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_exposes_status() {
        let err = BridgeError::fetch_with_status(404, "not found");
        assert_eq!(err.status(), Some(404));
        assert_eq!(BridgeError::fetch("timeout").status(), None);
        assert_eq!(BridgeError::Protocol("bad type".into()).status(), None);
    }

    #[test]
    fn errors_are_cloneable() {
        let err = BridgeError::fetch_with_status(500, "boom");
        let clone = err.clone();
        assert_eq!(clone.to_string(), err.to_string());
    }
}
