//! Client-facing abstraction over the coordination service.
//!
//! Recipes hold an `Arc<dyn NodeClient>` so that a production adapter and
//! the in-process simulator are interchangeable. The trait covers exactly
//! the operations recipes consume: sequential ephemeral node creation,
//! child listing, one-shot deletion watches, deletion, and session-expiry
//! observation.

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::error::CoordinationResult;
use crate::path::NodePath;

/// What a fired deletion watch observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched node was deleted.
    Deleted,
    /// The watching session was terminated before (or instead of) the
    /// node's deletion.
    SessionLost,
}

/// One-shot subscription to the deletion of a specific node.
///
/// Fires at most once; register a new watch to re-arm.
#[derive(Debug)]
pub struct DeletionWatch {
    rx: oneshot::Receiver<WatchEvent>,
}

impl DeletionWatch {
    /// Wrap a receiver whose sender is held by the service.
    pub fn new(rx: oneshot::Receiver<WatchEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the watch to fire.
    ///
    /// A service that goes away without firing is indistinguishable from
    /// losing the session and is reported as such.
    pub async fn fired(self) -> WatchEvent {
        self.rx.await.unwrap_or(WatchEvent::SessionLost)
    }
}

/// One-shot subscription to the expiry of the client's own session.
#[derive(Debug)]
pub struct SessionWatch {
    rx: oneshot::Receiver<()>,
}

impl SessionWatch {
    /// Wrap a receiver whose sender is held by the service.
    pub fn new(rx: oneshot::Receiver<()>) -> Self {
        Self { rx }
    }

    /// Resolves when the session is terminated by the service. A dropped
    /// sender counts: either way the session is unusable. Resolves at most
    /// once; do not await again afterwards.
    pub async fn expired(&mut self) {
        let _ = (&mut self.rx).await;
    }
}

/// Operations a coordination-service client must provide.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Create an ephemeral, sequentially-numbered child of `parent`.
    ///
    /// Returns the service-assigned node name (not the full path). From the
    /// caller's view creation is atomic: on an error no node was created.
    async fn create_sequential_ephemeral(
        &self,
        parent: &NodePath,
        prefix: &str,
    ) -> CoordinationResult<String>;

    /// List the names of `parent`'s children. No ordering is guaranteed.
    async fn list_children(&self, parent: &NodePath) -> CoordinationResult<Vec<String>>;

    /// Register a one-shot watch for the deletion of `node`.
    ///
    /// Fails with `NoNode` when the node is already gone: a watch on an
    /// absent node would never fire and must not be waited on.
    async fn watch_deletion(&self, node: &NodePath) -> CoordinationResult<DeletionWatch>;

    /// Delete `node`. Reports `NoNode` when it does not exist.
    async fn delete_node(&self, node: &NodePath) -> CoordinationResult<()>;

    /// Register a one-shot watch for this session's expiry.
    async fn watch_session(&self) -> CoordinationResult<SessionWatch>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deletion_watch_fires() {
        let (tx, rx) = oneshot::channel();
        let watch = DeletionWatch::new(rx);
        tx.send(WatchEvent::Deleted).unwrap();
        assert_eq!(watch.fired().await, WatchEvent::Deleted);
    }

    #[tokio::test]
    async fn test_deletion_watch_dropped_sender_is_session_loss() {
        let (tx, rx) = oneshot::channel::<WatchEvent>();
        let watch = DeletionWatch::new(rx);
        drop(tx);
        assert_eq!(watch.fired().await, WatchEvent::SessionLost);
    }

    #[tokio::test]
    async fn test_session_watch_resolves_on_fire_and_on_drop() {
        let (tx, rx) = oneshot::channel();
        let mut watch = SessionWatch::new(rx);
        tx.send(()).unwrap();
        watch.expired().await;

        let (tx, rx) = oneshot::channel::<()>();
        let mut watch = SessionWatch::new(rx);
        drop(tx);
        watch.expired().await;
    }
}
