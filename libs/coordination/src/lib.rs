//! # coordination
//!
//! Client abstraction for a hierarchical coordination service that provides
//! ephemeral, sequentially-numbered nodes and one-shot deletion watches.
//!
//! This library provides:
//! - **`NodeClient`** — the trait recipes program against: sequential
//!   ephemeral node creation, child listing, deletion, one-shot deletion
//!   watches, and session-expiry observation.
//! - **Typed errors** distinguishing transient transport failures from
//!   session loss and structural errors.
//! - **Path and sequence helpers** — validated absolute paths and the
//!   derivation of a total sibling order from an unordered child listing.
//! - **An in-process simulator** (`MemoryCluster`/`MemorySession`) with the
//!   service's observable semantics, for tests and local runs.
//!
//! Session lifecycle (connect/reconnect/close) belongs to the client
//! implementation behind the trait; nothing here owns or recreates
//! sessions.

pub mod client;
pub mod error;
pub mod memory;
pub mod path;

pub use client::{DeletionWatch, NodeClient, SessionWatch, WatchEvent};
pub use error::{CoordinationError, CoordinationResult};
pub use memory::{MemoryCluster, MemorySession, SessionId};
pub use path::{
    NodePath, SEQUENCE_WIDTH, SequencedNode, order_by_sequence, sequence_of, sequential_name,
};
