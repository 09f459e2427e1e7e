//! # locks
//!
//! Fair, exclusive distributed locking over a hierarchical coordination
//! service that provides ephemeral sequential nodes and one-shot deletion
//! watches.
//!
//! Each acquisition attempt registers one ephemeral, sequentially-numbered
//! candidate node under the lock path. The candidate with the lowest
//! sequence number holds the lock; every other candidate watches only its
//! immediate predecessor and re-evaluates its rank when that node goes
//! away. [`acquire_exclusive_lock`] exposes the attempt as a deduplicated
//! stream of holder-state values: the first `Ok(true)` grants exclusive
//! use of the resource, and releasing (or dropping) the stream deletes the
//! candidate node, handing the lock to the next in line.
//!
//! The recipe holds no state outside the service's node hierarchy. Session
//! loss is terminal for an attempt — the node is gone and the rank with
//! it — and surfaces as an error the caller handles by starting a fresh
//! attempt at the back of the queue.

pub mod error;
pub mod exclusive;
mod registrar;
mod retry;
mod watcher;

pub use error::{LockError, LockResult};
pub use exclusive::{LockStream, acquire_exclusive_lock, acquire_exclusive_lock_with_policy};
pub use retry::RetryPolicy;
