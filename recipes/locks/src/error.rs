//! Error types for lock recipes.

use coordination::{CoordinationError, NodePath};
use thiserror::Error;

/// Terminal failure of one lock acquisition attempt.
#[derive(Debug, Error)]
pub enum LockError {
    /// The owning session was terminated. The candidate node is gone and
    /// its rank is meaningless; recovery is a brand-new attempt that
    /// re-enters the queue at the back.
    #[error("session lost while {0}")]
    SessionLost(String),

    /// The lock path does not exist. A configuration error, never retried.
    #[error("lock path '{0}' does not exist")]
    NoLockPath(String),

    /// Any other coordination failure, retries (where applicable) already
    /// exhausted.
    #[error("coordination error: {0}")]
    Coordination(#[from] CoordinationError),
}

impl LockError {
    /// Returns true if this failure means the session is gone and the whole
    /// attempt must restart.
    pub fn is_session_loss(&self) -> bool {
        match self {
            LockError::SessionLost(_) => true,
            LockError::Coordination(err) => err.is_session_loss(),
            LockError::NoLockPath(_) => false,
        }
    }

    /// Returns true if this failure is a configuration problem the caller
    /// must fix rather than retry.
    pub fn is_config(&self) -> bool {
        matches!(self, LockError::NoLockPath(_))
            || matches!(
                self,
                LockError::Coordination(CoordinationError::InvalidPath(_))
            )
    }

    /// Map a coordination error observed during `phase` of an attempt under
    /// `lock_path` to its lock-level meaning.
    pub(crate) fn classify(err: CoordinationError, phase: &str, lock_path: &NodePath) -> LockError {
        match err {
            CoordinationError::SessionLost(_) => LockError::SessionLost(phase.to_string()),
            CoordinationError::NoNode { ref path } if path == lock_path.as_str() => {
                LockError::NoLockPath(path.clone())
            }
            other => LockError::Coordination(other),
        }
    }
}

/// Shorthand result alias for lock operations.
pub type LockResult<T> = Result<T, LockError>;
