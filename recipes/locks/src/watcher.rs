//! Predecessor selection and watch arming.
//!
//! Only the immediate predecessor is ever watched, keeping watch fan-out
//! O(1) per candidate under contention. A candidate at rank 0 has no
//! predecessor and already holds the lock: no watch is registered for it.
//! An already-deleted predecessor is an immediate re-evaluation trigger,
//! never a wait — a watch registered on an absent node would not fire.

use std::sync::Arc;

use coordination::{CoordinationResult, DeletionWatch, NodeClient, NodePath, SequencedNode};
use tracing::debug;

use crate::retry::{RetryPolicy, with_retries};

/// The sibling that must disappear before the candidate at `rank` may hold
/// the lock. `None` at rank 0.
pub(crate) fn predecessor_of(siblings: &[SequencedNode], rank: usize) -> Option<&SequencedNode> {
    rank.checked_sub(1).and_then(|i| siblings.get(i))
}

/// Arm a one-shot deletion watch on the predecessor.
///
/// `Ok(None)` means the predecessor vanished between the snapshot and the
/// registration; the caller must re-evaluate now instead of waiting for a
/// fire that will never come.
pub(crate) async fn arm(
    client: &Arc<dyn NodeClient>,
    predecessor: &NodePath,
    retry: &RetryPolicy,
) -> CoordinationResult<Option<DeletionWatch>> {
    match with_retries(retry, "arm predecessor watch", || {
        client.watch_deletion(predecessor)
    })
    .await
    {
        Ok(watch) => {
            debug!(predecessor = %predecessor, "armed predecessor watch");
            Ok(Some(watch))
        }
        Err(err) if err.is_no_node() => {
            debug!(predecessor = %predecessor, "predecessor already gone, re-evaluating");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}
