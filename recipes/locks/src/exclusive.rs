//! The exclusive-lock recipe: a deduplicated stream of holder state.
//!
//! One candidate node per attempt, one stream per candidate. The driver is
//! an explicit event loop rather than a recursive re-subscription: every
//! watch fire feeds a fresh evaluation of the sibling set, so long
//! contention chains cost no stack and teardown is a cancellation check at
//! each suspension point.
//!
//! Fairness falls out of the waiting rule. A candidate only ever watches
//! its immediate predecessor and only advances when that node is gone, so
//! holders succeed each other in ascending sequence order.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use coordination::{NodeClient, NodePath, WatchEvent};

use crate::error::{LockError, LockResult};
use crate::registrar::{self, Registration};
use crate::retry::RetryPolicy;
use crate::watcher;

/// Buffered holder-state transitions. Deduplication keeps the queue short;
/// a full queue backpressures the driver until the consumer catches up.
const STATE_BUFFER: usize = 8;

/// Acquire an exclusive lock on `lock_path` with the default retry policy.
///
/// Registers this process's candidate node under `lock_path` and returns
/// the holder-state stream for the attempt. The first `Ok(true)` grants
/// exclusive use of the resource until [`LockStream::release`].
pub async fn acquire_exclusive_lock(
    client: Arc<dyn NodeClient>,
    lock_path: NodePath,
    prefix: &str,
) -> LockResult<LockStream> {
    acquire_exclusive_lock_with_policy(client, lock_path, prefix, RetryPolicy::default()).await
}

/// Acquire an exclusive lock with an explicit retry policy for transient
/// coordination failures.
pub async fn acquire_exclusive_lock_with_policy(
    client: Arc<dyn NodeClient>,
    lock_path: NodePath,
    prefix: &str,
    retry: RetryPolicy,
) -> LockResult<LockStream> {
    let registration = registrar::register(&client, &lock_path, prefix, &retry).await?;
    let node_path = registration.node_path.clone();
    let (tx, rx) = mpsc::channel(STATE_BUFFER);
    let cancel = CancellationToken::new();
    let driver = tokio::spawn(drive(
        client,
        lock_path,
        registration,
        retry,
        cancel.clone(),
        tx,
    ));
    Ok(LockStream {
        node_path,
        states: rx,
        cancel,
        driver: Some(driver),
    })
}

/// A lazy sequence of holder-state values for one acquisition attempt.
///
/// Yields `Ok(true)` while this candidate holds the lock and `Ok(false)`
/// while it waits; consecutive duplicates are suppressed, so only genuine
/// transitions are observable. A terminal `Err` means the attempt failed
/// (session loss or configuration) and the caller must start over with a
/// fresh acquisition. The stream never completes on its own: it ends via
/// [`release`](LockStream::release), by being dropped, or after the
/// terminal error.
#[derive(Debug)]
pub struct LockStream {
    node_path: NodePath,
    states: mpsc::Receiver<LockResult<bool>>,
    cancel: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl Stream for LockStream {
    type Item = LockResult<bool>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.states.poll_recv(cx)
    }
}

impl LockStream {
    /// Full path of this attempt's candidate node.
    pub fn node_path(&self) -> &NodePath {
        &self.node_path
    }

    /// Wait until this candidate holds the lock.
    pub async fn acquired(&mut self) -> LockResult<()> {
        loop {
            match self.states.recv().await {
                Some(Ok(true)) => return Ok(()),
                Some(Ok(false)) => {}
                Some(Err(err)) => return Err(err),
                None => {
                    return Err(LockError::SessionLost(
                        "waiting for acquisition (stream closed)".to_string(),
                    ));
                }
            }
        }
    }

    /// Release the lock (or abandon the attempt): the candidate node is
    /// deleted and teardown is awaited.
    pub async fn release(mut self) {
        self.cancel.cancel();
        // Unblock a driver parked on a full state queue.
        self.states.close();
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
    }
}

impl Drop for LockStream {
    fn drop(&mut self) {
        // The driver observes the cancellation and finishes teardown (node
        // deletion) in the background.
        self.cancel.cancel();
    }
}

/// Distinct-until-changed gate in front of the output channel.
#[derive(Debug, Default)]
struct EmitGate {
    last: Option<bool>,
}

impl EmitGate {
    /// Emit `state` unless it repeats the previous emission. Returns false
    /// when the attempt should tear down: the subscriber is gone or the
    /// stream was cancelled mid-send.
    async fn emit(
        &mut self,
        tx: &mpsc::Sender<LockResult<bool>>,
        cancel: &CancellationToken,
        state: bool,
    ) -> bool {
        if self.last == Some(state) {
            return true;
        }
        self.last = Some(state);
        tokio::select! {
            _ = cancel.cancelled() => false,
            sent = tx.send(Ok(state)) => sent.is_ok(),
        }
    }
}

/// Drive one acquisition attempt to completion.
async fn drive(
    client: Arc<dyn NodeClient>,
    lock_path: NodePath,
    registration: Registration,
    retry: RetryPolicy,
    cancel: CancellationToken,
    tx: mpsc::Sender<LockResult<bool>>,
) {
    match attempt(&client, &lock_path, &registration, &retry, &cancel, &tx).await {
        Ok(()) => {
            release_node(&client, &registration.node_path).await;
            debug!(node = %registration.node_path, "lock attempt released");
        }
        Err(err) => {
            // On session loss the service has already swept the node.
            if !err.is_session_loss() {
                release_node(&client, &registration.node_path).await;
            }
            warn!(node = %registration.node_path, error = %err, "lock attempt failed");
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tx.send(Err(err)) => {}
            }
        }
    }
}

/// The acquisition state machine. Returns `Ok(())` on teardown (release or
/// subscriber gone) and `Err` on terminal failure.
async fn attempt(
    client: &Arc<dyn NodeClient>,
    lock_path: &NodePath,
    registration: &Registration,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<LockResult<bool>>,
) -> LockResult<()> {
    let mut session = client
        .watch_session()
        .await
        .map_err(|e| LockError::classify(e, "subscribing to session state", lock_path))?;
    let mut gate = EmitGate::default();
    // The first evaluation reuses the registration snapshot; every later
    // round re-reads the sibling set.
    let mut siblings = registration.siblings.clone();

    loop {
        let Some(rank) = registrar::rank_of(&siblings, &registration.node_name) else {
            // Our own node is missing from the listing: the ephemeral node
            // is gone, so the session is too.
            return Err(LockError::SessionLost("evaluating rank".to_string()));
        };

        match watcher::predecessor_of(&siblings, rank).map(|p| p.name.clone()) {
            None => {
                // Rank 0: this candidate holds the lock. No watch is armed;
                // only teardown or session expiry ends the hold.
                info!(node = %registration.node_path, "lock acquired");
                if !gate.emit(tx, cancel, true).await {
                    return Ok(());
                }
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(()),
                    _ = session.expired() => {
                        return Err(LockError::SessionLost("holding the lock".to_string()));
                    }
                }
            }
            Some(predecessor_name) => {
                if !gate.emit(tx, cancel, false).await {
                    return Ok(());
                }
                let predecessor = lock_path.join(&predecessor_name)?;
                debug!(
                    node = %registration.node_path,
                    rank,
                    predecessor = %predecessor,
                    "waiting on predecessor"
                );
                match watcher::arm(client, &predecessor, retry)
                    .await
                    .map_err(|e| LockError::classify(e, "arming predecessor watch", lock_path))?
                {
                    // Stale predecessor: re-evaluate immediately.
                    None => {}
                    Some(watch) => {
                        tokio::select! {
                            _ = cancel.cancelled() => return Ok(()),
                            event = watch.fired() => match event {
                                WatchEvent::Deleted => {
                                    debug!(predecessor = %predecessor, "predecessor gone, re-evaluating");
                                }
                                WatchEvent::SessionLost => {
                                    return Err(LockError::SessionLost(
                                        "waiting on predecessor".to_string(),
                                    ));
                                }
                            },
                        }
                    }
                }
                siblings = registrar::snapshot_siblings(client, lock_path, retry)
                    .await
                    .map_err(|e| LockError::classify(e, "listing siblings", lock_path))?;
            }
        }
    }
}

/// Delete the candidate node, tolerating one that is already gone.
async fn release_node(client: &Arc<dyn NodeClient>, node: &NodePath) {
    match client.delete_node(node).await {
        Ok(()) => {}
        Err(err) if err.is_no_node() || err.is_session_loss() => {
            debug!(node = %node, error = %err, "candidate node already gone at release");
        }
        Err(err) => {
            warn!(node = %node, error = %err, "failed to delete candidate node at release");
        }
    }
}
