//! In-process coordination service used by tests and local simulation.
//!
//! Implements the service semantics behind the same [`NodeClient`] trait a
//! production adapter would: per-parent sequence counters that never reuse
//! a number, ephemeral nodes swept atomically with session expiry, and
//! one-shot deletion watches that fire before the node can be observed as
//! absent in a later listing (everything mutates under one mutex).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::oneshot;
use tracing::debug;

use crate::client::{DeletionWatch, NodeClient, SessionWatch, WatchEvent};
use crate::error::{CoordinationError, CoordinationResult};
use crate::path::{NodePath, sequential_name};

/// Identifier the cluster assigns to each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

#[derive(Debug)]
struct NodeRecord {
    /// `None` for container (persistent) nodes.
    owner: Option<SessionId>,
}

#[derive(Debug)]
struct SessionRecord {
    alive: bool,
    fail_next: u32,
}

#[derive(Debug, Default)]
struct ClusterInner {
    /// Full path -> record. The root `/` is implicit and always exists.
    nodes: BTreeMap<String, NodeRecord>,
    /// Parent path -> next sequence number. Survives child deletion.
    counters: BTreeMap<String, u64>,
    /// Full path -> deletion watchers, tagged with the watching session.
    deletion_watches: BTreeMap<String, Vec<(SessionId, oneshot::Sender<WatchEvent>)>>,
    /// Session -> expiry watchers.
    session_watches: BTreeMap<SessionId, Vec<oneshot::Sender<()>>>,
    sessions: BTreeMap<SessionId, SessionRecord>,
    next_session: u64,
}

/// An in-process coordination cluster.
///
/// Cheap to clone; all handles share one state. Create client sessions with
/// [`session`](MemoryCluster::session) and drive failure scenarios with
/// [`expire_session`](MemoryCluster::expire_session) and
/// [`MemorySession::fail_next`].
#[derive(Debug, Clone, Default)]
pub struct MemoryCluster {
    inner: Arc<Mutex<ClusterInner>>,
}

impl MemoryCluster {
    /// Create an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ClusterInner> {
        self.inner.lock().expect("memory cluster lock poisoned")
    }

    /// Open a new client session.
    pub fn session(&self) -> MemorySession {
        let mut inner = self.lock();
        let id = SessionId(inner.next_session);
        inner.next_session += 1;
        inner.sessions.insert(
            id,
            SessionRecord {
                alive: true,
                fail_next: 0,
            },
        );
        MemorySession {
            cluster: self.clone(),
            id,
        }
    }

    /// Create any missing container nodes along `path`.
    pub fn ensure_path(&self, path: &NodePath) {
        let mut inner = self.lock();
        let mut current = String::new();
        for component in path.as_str().split('/').filter(|c| !c.is_empty()) {
            current.push('/');
            current.push_str(component);
            inner
                .nodes
                .entry(current.clone())
                .or_insert(NodeRecord { owner: None });
        }
    }

    /// Whether a node currently exists at `path`.
    pub fn exists(&self, path: &NodePath) -> bool {
        node_exists(&self.lock(), path.as_str())
    }

    /// Child names of `parent` in lexicographic order, for assertions.
    pub fn children(&self, parent: &NodePath) -> Vec<String> {
        collect_children(&self.lock(), parent.as_str())
    }

    /// Delete a node out-of-band, as an administrative client would,
    /// firing its deletion watches.
    pub fn delete(&self, path: &NodePath) -> CoordinationResult<()> {
        let mut inner = self.lock();
        remove_node(&mut inner, path.as_str())
    }

    /// Terminate a session: fire its expiry watchers, fail its outstanding
    /// watches, and sweep its ephemeral nodes (notifying other sessions'
    /// watches on them).
    pub fn expire_session(&self, id: SessionId) {
        let mut inner = self.lock();
        let Some(record) = inner.sessions.get_mut(&id) else {
            return;
        };
        if !record.alive {
            return;
        }
        record.alive = false;

        if let Some(watchers) = inner.session_watches.remove(&id) {
            for tx in watchers {
                let _ = tx.send(());
            }
        }

        // Watches the dying session registered anywhere fire SessionLost.
        for watchers in inner.deletion_watches.values_mut() {
            let mut kept = Vec::new();
            for (owner, tx) in watchers.drain(..) {
                if owner == id {
                    let _ = tx.send(WatchEvent::SessionLost);
                } else {
                    kept.push((owner, tx));
                }
            }
            *watchers = kept;
        }

        let owned: Vec<String> = inner
            .nodes
            .iter()
            .filter(|(_, record)| record.owner == Some(id))
            .map(|(path, _)| path.clone())
            .collect();
        for path in owned {
            debug!(%path, session = %id, "sweeping ephemeral node of expired session");
            let _ = remove_node(&mut inner, &path);
        }
    }
}

fn node_exists(inner: &ClusterInner, path: &str) -> bool {
    path == "/" || inner.nodes.contains_key(path)
}

fn child_prefix(parent: &str) -> String {
    if parent == "/" {
        "/".to_string()
    } else {
        format!("{parent}/")
    }
}

fn collect_children(inner: &ClusterInner, parent: &str) -> Vec<String> {
    let prefix = child_prefix(parent);
    inner
        .nodes
        .range(prefix.clone()..)
        .take_while(|(path, _)| path.starts_with(&prefix))
        .filter_map(|(path, _)| {
            let rest = &path[prefix.len()..];
            (!rest.is_empty() && !rest.contains('/')).then(|| rest.to_string())
        })
        .collect()
}

fn remove_node(inner: &mut ClusterInner, path: &str) -> CoordinationResult<()> {
    if inner.nodes.remove(path).is_none() {
        return Err(CoordinationError::NoNode {
            path: path.to_string(),
        });
    }
    if let Some(watchers) = inner.deletion_watches.remove(path) {
        for (_, tx) in watchers {
            // A receiver dropped after teardown makes this a no-op.
            let _ = tx.send(WatchEvent::Deleted);
        }
    }
    Ok(())
}

/// Admission check for every session operation: the session must be alive
/// and not carrying an injected fault.
fn admit(inner: &mut ClusterInner, id: SessionId) -> CoordinationResult<()> {
    let Some(record) = inner.sessions.get_mut(&id) else {
        return Err(CoordinationError::SessionLost(format!("{id} is unknown")));
    };
    if !record.alive {
        return Err(CoordinationError::SessionLost(format!("{id} has expired")));
    }
    if record.fail_next > 0 {
        record.fail_next -= 1;
        return Err(CoordinationError::Transport(
            "injected transient fault".to_string(),
        ));
    }
    Ok(())
}

/// One client session against a [`MemoryCluster`].
#[derive(Debug, Clone)]
pub struct MemorySession {
    cluster: MemoryCluster,
    id: SessionId,
}

impl MemorySession {
    /// This session's identifier.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Terminate this session, sweeping its ephemeral nodes.
    pub fn expire(&self) {
        self.cluster.expire_session(self.id);
    }

    /// Make the next `n` operations on this session fail with a transient
    /// transport error.
    pub fn fail_next(&self, n: u32) {
        let mut inner = self.cluster.lock();
        if let Some(record) = inner.sessions.get_mut(&self.id) {
            record.fail_next = n;
        }
    }
}

#[async_trait]
impl NodeClient for MemorySession {
    async fn create_sequential_ephemeral(
        &self,
        parent: &NodePath,
        prefix: &str,
    ) -> CoordinationResult<String> {
        let mut inner = self.cluster.lock();
        admit(&mut inner, self.id)?;
        if !node_exists(&inner, parent.as_str()) {
            return Err(CoordinationError::NoNode {
                path: parent.to_string(),
            });
        }
        let next = inner.counters.get(parent.as_str()).copied().unwrap_or(0);
        let name = sequential_name(prefix, next);
        let full = parent.join(&name)?;
        inner.counters.insert(parent.to_string(), next + 1);
        inner.nodes.insert(
            full.to_string(),
            NodeRecord {
                owner: Some(self.id),
            },
        );
        debug!(node = %full, session = %self.id, "created sequential ephemeral node");
        Ok(name)
    }

    async fn list_children(&self, parent: &NodePath) -> CoordinationResult<Vec<String>> {
        let mut inner = self.cluster.lock();
        admit(&mut inner, self.id)?;
        if !node_exists(&inner, parent.as_str()) {
            return Err(CoordinationError::NoNode {
                path: parent.to_string(),
            });
        }
        Ok(collect_children(&inner, parent.as_str()))
    }

    async fn watch_deletion(&self, node: &NodePath) -> CoordinationResult<DeletionWatch> {
        let mut inner = self.cluster.lock();
        admit(&mut inner, self.id)?;
        if !node_exists(&inner, node.as_str()) {
            return Err(CoordinationError::NoNode {
                path: node.to_string(),
            });
        }
        let (tx, rx) = oneshot::channel();
        inner
            .deletion_watches
            .entry(node.to_string())
            .or_default()
            .push((self.id, tx));
        Ok(DeletionWatch::new(rx))
    }

    async fn delete_node(&self, node: &NodePath) -> CoordinationResult<()> {
        let mut inner = self.cluster.lock();
        admit(&mut inner, self.id)?;
        remove_node(&mut inner, node.as_str())
    }

    async fn watch_session(&self) -> CoordinationResult<SessionWatch> {
        let mut inner = self.cluster.lock();
        admit(&mut inner, self.id)?;
        let (tx, rx) = oneshot::channel();
        inner.session_watches.entry(self.id).or_default().push(tx);
        Ok(SessionWatch::new(rx))
    }
}
