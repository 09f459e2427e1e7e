//! Candidate registration: create the ephemeral sequential node and take
//! the first sibling snapshot.
//!
//! Runs once per acquisition attempt. If the session is lost midway there
//! is nothing to salvage: a retried attempt registers a fresh node and
//! re-enters the queue with a later sequence number.

use std::sync::Arc;

use coordination::{NodeClient, NodePath, SequencedNode, order_by_sequence};
use tracing::debug;

use crate::error::{LockError, LockResult};
use crate::retry::{RetryPolicy, with_retries};

/// Outcome of registering a candidate under the lock path.
#[derive(Debug)]
pub(crate) struct Registration {
    /// Service-assigned name of this candidate's node.
    pub(crate) node_name: String,
    /// Full path of this candidate's node.
    pub(crate) node_path: NodePath,
    /// Ordered sibling snapshot taken right after creation; includes the
    /// candidate itself.
    pub(crate) siblings: Vec<SequencedNode>,
}

/// Create this attempt's candidate node and snapshot its siblings.
pub(crate) async fn register(
    client: &Arc<dyn NodeClient>,
    lock_path: &NodePath,
    prefix: &str,
    retry: &RetryPolicy,
) -> LockResult<Registration> {
    let node_name = with_retries(retry, "create candidate node", || {
        client.create_sequential_ephemeral(lock_path, prefix)
    })
    .await
    .map_err(|e| LockError::classify(e, "registering", lock_path))?;
    let node_path = lock_path.join(&node_name)?;
    debug!(node = %node_path, "registered lock candidate");

    let siblings = snapshot_siblings(client, lock_path, retry)
        .await
        .map_err(|e| LockError::classify(e, "registering", lock_path))?;
    Ok(Registration {
        node_name,
        node_path,
        siblings,
    })
}

/// Re-read the sibling set and derive its ascending sequence order.
pub(crate) async fn snapshot_siblings(
    client: &Arc<dyn NodeClient>,
    lock_path: &NodePath,
    retry: &RetryPolicy,
) -> coordination::CoordinationResult<Vec<SequencedNode>> {
    let children = with_retries(retry, "list siblings", || client.list_children(lock_path)).await?;
    Ok(order_by_sequence(children))
}

/// Zero-based rank of `node_name` in the ordered sibling set, or `None`
/// when the node is absent — meaning its ephemeral node is gone.
pub(crate) fn rank_of(siblings: &[SequencedNode], node_name: &str) -> Option<usize> {
    siblings.iter().position(|s| s.name == node_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::{MemoryCluster, sequence_of};

    fn seq(name: &str) -> SequencedNode {
        SequencedNode {
            name: name.to_string(),
            sequence: sequence_of(name).unwrap(),
        }
    }

    #[test]
    fn test_rank_of() {
        let siblings = vec![
            seq("lock-0000000003"),
            seq("lock-0000000007"),
            seq("lock-0000000009"),
        ];
        assert_eq!(rank_of(&siblings, "lock-0000000003"), Some(0));
        assert_eq!(rank_of(&siblings, "lock-0000000009"), Some(2));
        assert_eq!(rank_of(&siblings, "lock-0000000004"), None);
    }

    #[tokio::test]
    async fn test_register_snapshots_include_self() {
        let cluster = MemoryCluster::new();
        let lock_path = NodePath::new("/locks/resource").unwrap();
        cluster.ensure_path(&lock_path);
        let client: Arc<dyn NodeClient> = Arc::new(cluster.session());
        let retry = RetryPolicy::default();

        let first = register(&client, &lock_path, "lock-", &retry).await.unwrap();
        assert_eq!(rank_of(&first.siblings, &first.node_name), Some(0));

        let second = register(&client, &lock_path, "lock-", &retry).await.unwrap();
        assert_eq!(rank_of(&second.siblings, &second.node_name), Some(1));
        assert_eq!(second.siblings.len(), 2);
        assert_eq!(second.node_path.parent(), Some(lock_path));
    }

    #[tokio::test]
    async fn test_register_under_missing_path_is_config_error() {
        let cluster = MemoryCluster::new();
        let lock_path = NodePath::new("/locks/absent").unwrap();
        let client: Arc<dyn NodeClient> = Arc::new(cluster.session());
        let retry = RetryPolicy::default();

        let err = register(&client, &lock_path, "lock-", &retry)
            .await
            .unwrap_err();
        assert!(matches!(err, LockError::NoLockPath(_)));
    }

    #[tokio::test]
    async fn test_register_after_session_expiry_is_session_loss() {
        let cluster = MemoryCluster::new();
        let lock_path = NodePath::new("/locks/resource").unwrap();
        cluster.ensure_path(&lock_path);
        let session = cluster.session();
        session.expire();
        let client: Arc<dyn NodeClient> = Arc::new(session);
        let retry = RetryPolicy::default();

        let err = register(&client, &lock_path, "lock-", &retry)
            .await
            .unwrap_err();
        assert!(err.is_session_loss());
    }
}
