//! Node-group resource model.
//!
//! A `NodeGroup` is a snapshot of the declared and observed size of a named
//! pool of nodes. Snapshots are produced by the watch source and borrowed by
//! the reconciler for the duration of one pass.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Label carried by every node that belongs to a node group.
///
/// The value is the node group's name.
pub const NODE_GROUP_LABEL: &str = "nodegroup.api.clever-cloud.com/name";

/// Unique name of a node group.
pub type NodeGroupName = String;

/// Unique name of a node.
pub type NodeName = String;

// ── Node group ─────────────────────────────────────────────────────

/// A node group snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NodeGroup {
    /// Group name. `None` or blank means the resource has no usable identity.
    #[serde(default)]
    pub name: Option<NodeGroupName>,
    pub spec: NodeGroupSpec,
    #[serde(default)]
    pub status: Option<NodeGroupStatus>,
}

/// Operator-requested shape of a node group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NodeGroupSpec {
    /// Declared node count.
    pub node_count: u32,
    /// Instance flavor (XS, S, M, L, XL). Passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flavor: Option<String>,
    /// Provider-side identifier. Passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// Provider-reported state of a node group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NodeGroupStatus {
    /// Number of nodes actually provisioned.
    #[serde(default)]
    pub node_count: Option<u32>,
}

impl NodeGroup {
    /// Build a group with a declared size and no status.
    pub fn new(name: impl Into<String>, node_count: u32) -> Self {
        Self {
            name: Some(name.into()),
            spec: NodeGroupSpec {
                node_count,
                ..Default::default()
            },
            status: None,
        }
    }

    /// Set the observed size.
    pub fn with_observed(mut self, node_count: u32) -> Self {
        self.status = Some(NodeGroupStatus {
            node_count: Some(node_count),
        });
        self
    }

    /// The group's identity, if it has a usable one.
    pub fn identity(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Declared (requested) node count.
    pub fn declared_size(&self) -> u32 {
        self.spec.node_count
    }

    /// Observed node count; falls back to the declared size when the
    /// provider has not reported one.
    pub fn observed_size(&self) -> u32 {
        self.status
            .as_ref()
            .and_then(|s| s.node_count)
            .unwrap_or(self.spec.node_count)
    }

    /// Whether nodes from a previous decision are still being provisioned.
    pub fn is_provisioning(&self) -> bool {
        self.observed_size() < self.declared_size()
    }
}

// ── Events ─────────────────────────────────────────────────────────

/// Lifecycle event that triggered a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// A node-group event as delivered by a watch source.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchEvent {
    pub kind: EventKind,
    pub group: NodeGroup,
}
