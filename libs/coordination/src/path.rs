//! Node paths and sequential-name helpers.
//!
//! The service assigns sequential nodes a ten-digit zero-padded decimal
//! suffix, strictly increasing among siblings of one parent and never
//! reused. Child listings carry no ordering guarantee; callers derive a
//! total order locally with [`order_by_sequence`].

use std::fmt;

use crate::error::{CoordinationError, CoordinationResult};

/// Width of the zero-padded sequence suffix in sequential node names.
pub const SEQUENCE_WIDTH: usize = 10;

/// A validated absolute path in the coordination hierarchy.
///
/// Always starts with `/`, has no trailing slash (except the root itself)
/// and no empty components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodePath(String);

impl NodePath {
    /// Validate and build a path.
    pub fn new(path: impl Into<String>) -> CoordinationResult<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(CoordinationError::InvalidPath(format!(
                "'{path}' is not absolute"
            )));
        }
        if path.len() > 1 && path.ends_with('/') {
            return Err(CoordinationError::InvalidPath(format!(
                "'{path}' has a trailing slash"
            )));
        }
        if path.len() > 1 && path[1..].split('/').any(str::is_empty) {
            return Err(CoordinationError::InvalidPath(format!(
                "'{path}' has an empty component"
            )));
        }
        Ok(Self(path))
    }

    /// The hierarchy root, `/`.
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Append one child component.
    pub fn join(&self, child: &str) -> CoordinationResult<NodePath> {
        if child.is_empty() || child.contains('/') {
            return Err(CoordinationError::InvalidPath(format!(
                "'{child}' is not a valid child name"
            )));
        }
        if self.0 == "/" {
            Ok(Self(format!("/{child}")))
        } else {
            Ok(Self(format!("{}/{child}", self.0)))
        }
    }

    /// The parent path, or `None` for the root.
    pub fn parent(&self) -> Option<NodePath> {
        if self.0 == "/" {
            return None;
        }
        match self.0.rsplit_once('/') {
            Some(("", _)) => Some(Self::root()),
            Some((parent, _)) => Some(Self(parent.to_string())),
            None => None,
        }
    }

    /// The final path component. Empty only for the root.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// The path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for NodePath {
    type Error = CoordinationError;

    fn try_from(value: &str) -> CoordinationResult<Self> {
        NodePath::new(value)
    }
}

/// A sibling name paired with its parsed sequence number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencedNode {
    /// The node name as listed under its parent.
    pub name: String,
    /// The service-assigned counter parsed from the name suffix.
    pub sequence: u64,
}

/// Parse the sequence suffix of a sequential node name.
///
/// Returns `None` for names without a full-width all-digit suffix; such
/// nodes were not created sequentially.
pub fn sequence_of(name: &str) -> Option<u64> {
    if name.len() < SEQUENCE_WIDTH {
        return None;
    }
    let (_, suffix) = name.split_at(name.len() - SEQUENCE_WIDTH);
    if !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    suffix.parse().ok()
}

/// Format a sequential node name from a prefix and an assigned counter.
pub fn sequential_name(prefix: &str, sequence: u64) -> String {
    format!("{prefix}{sequence:0width$}", width = SEQUENCE_WIDTH)
}

/// Derive the ascending sequence order from an unordered child listing.
///
/// Names without a sequence suffix are dropped; they cannot rank.
pub fn order_by_sequence(names: Vec<String>) -> Vec<SequencedNode> {
    let mut nodes: Vec<SequencedNode> = names
        .into_iter()
        .filter_map(|name| {
            sequence_of(&name).map(|sequence| SequencedNode { name, sequence })
        })
        .collect();
    nodes.sort_unstable_by(|a, b| {
        a.sequence.cmp(&b.sequence).then_with(|| a.name.cmp(&b.name))
    });
    nodes
}
