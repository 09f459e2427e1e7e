//! Error types for coordination-service operations.
//!
//! Typed variants so that recipes can distinguish transient transport
//! failures from session loss and from structural errors (missing nodes,
//! bad paths) without inspecting message strings.

use thiserror::Error;

/// Top-level error type for the coordination crate.
#[derive(Debug, Error)]
pub enum CoordinationError {
    /// Connection or transport-level failure. The session may still be
    /// intact on the service side.
    #[error("transport error: {0}")]
    Transport(String),

    /// Operation timed out waiting on the service.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The session behind this handle was terminated by the service. Its
    /// ephemeral nodes are gone.
    #[error("session lost: {0}")]
    SessionLost(String),

    /// No node exists at the given path.
    #[error("no node at '{path}'")]
    NoNode { path: String },

    /// A node already exists at the given path.
    #[error("node already exists at '{path}'")]
    NodeExists { path: String },

    /// The supplied path is not a valid absolute node path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The client is not connected to the service.
    #[error("not connected: {0}")]
    NotConnected(String),
}

impl CoordinationError {
    /// Returns true if this error indicates a transient failure that may
    /// succeed on retry with the same session (transport or timeout).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CoordinationError::Transport(_) | CoordinationError::Timeout(_)
        )
    }

    /// Returns true if this error means the session is gone for good.
    pub fn is_session_loss(&self) -> bool {
        matches!(self, CoordinationError::SessionLost(_))
    }

    /// Returns true if this error reports a missing node.
    pub fn is_no_node(&self) -> bool {
        matches!(self, CoordinationError::NoNode { .. })
    }
}

/// Shorthand result alias for coordination operations.
pub type CoordinationResult<T> = Result<T, CoordinationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let transport = CoordinationError::Transport("conn reset".into());
        assert!(transport.is_retryable());
        assert!(!transport.is_session_loss());
        assert!(!transport.is_no_node());

        let timeout = CoordinationError::Timeout("deadline exceeded".into());
        assert!(timeout.is_retryable());

        let session = CoordinationError::SessionLost("expired".into());
        assert!(!session.is_retryable());
        assert!(session.is_session_loss());

        let no_node = CoordinationError::NoNode {
            path: "/locks/a".into(),
        };
        assert!(!no_node.is_retryable());
        assert!(no_node.is_no_node());

        let exists = CoordinationError::NodeExists {
            path: "/locks/a".into(),
        };
        assert!(!exists.is_retryable());

        let invalid = CoordinationError::InvalidPath("relative".into());
        assert!(!invalid.is_retryable());

        let not_conn = CoordinationError::NotConnected("no conn".into());
        assert!(!not_conn.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = CoordinationError::NoNode {
            path: "/locks/resource".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("/locks/resource"));
    }
}
