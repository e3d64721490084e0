//! The inventory store.
//!
//! `Inventory` is `Clone` + `Send` + `Sync` (backed by `Arc`) and can be
//! shared between the API handlers and the autoscaler.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use nodescale_autoscale::{NodeGroupLister, ScaleError, ScaleSink};
use nodescale_core::{EventKind, NodeGroup, NodeGroupStatus, WatchEvent};
use nodescale_metrics::{MetricsError, MetricsSource, RawNodeMetrics};

use crate::error::{InventoryError, InventoryResult};
use crate::types::NodeRecord;

/// Buffered watch events per subscriber before it starts lagging.
const EVENT_BUFFER: usize = 256;

#[derive(Default)]
struct Tables {
    node_groups: HashMap<String, NodeGroup>,
    nodes: HashMap<String, NodeRecord>,
}

/// In-memory node groups and nodes.
#[derive(Clone)]
pub struct Inventory {
    tables: Arc<RwLock<Tables>>,
    events: broadcast::Sender<WatchEvent>,
}

impl Default for Inventory {
    fn default() -> Self {
        Self::new()
    }
}

impl Inventory {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            tables: Arc::new(RwLock::new(Tables::default())),
            events,
        }
    }

    /// Receive node group events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<WatchEvent> {
        self.events.subscribe()
    }

    fn publish(&self, kind: EventKind, group: NodeGroup) {
        // No subscribers is fine.
        let _ = self.events.send(WatchEvent { kind, group });
    }

    // ── Node groups ────────────────────────────────────────────────

    /// Create or replace a node group. Returns `Created` or `Modified`.
    pub async fn put_node_group(&self, mut group: NodeGroup) -> InventoryResult<EventKind> {
        let name = group
            .identity()
            .ok_or(InventoryError::MissingName)?
            .to_string();
        group.name = Some(name.clone());

        let kind = {
            let mut tables = self.tables.write().await;
            match tables.node_groups.insert(name.clone(), group.clone()) {
                Some(_) => EventKind::Modified,
                None => EventKind::Created,
            }
        };

        debug!(node_group = %name, event = %kind, "node group stored");
        self.publish(kind, group);
        Ok(kind)
    }

    pub async fn get_node_group(&self, name: &str) -> Option<NodeGroup> {
        self.tables.read().await.node_groups.get(name).cloned()
    }

    /// All node groups, ordered by name.
    pub async fn list_node_groups(&self) -> Vec<NodeGroup> {
        let tables = self.tables.read().await;
        let mut groups: Vec<NodeGroup> = tables.node_groups.values().cloned().collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }

    /// Remove a node group. Returns the removed group if it existed.
    pub async fn delete_node_group(&self, name: &str) -> Option<NodeGroup> {
        let removed = self.tables.write().await.node_groups.remove(name);
        if let Some(group) = &removed {
            info!(node_group = %name, "node group deleted");
            self.publish(EventKind::Deleted, group.clone());
        }
        removed
    }

    /// Replace the declared size of a node group.
    pub async fn set_declared_size(&self, name: &str, node_count: u32) -> InventoryResult<NodeGroup> {
        self.modify_node_group(name, |group| group.spec.node_count = node_count)
            .await
    }

    /// Record the provider-reported size of a node group.
    pub async fn set_observed_size(&self, name: &str, node_count: u32) -> InventoryResult<NodeGroup> {
        self.modify_node_group(name, |group| {
            group.status = Some(NodeGroupStatus {
                node_count: Some(node_count),
            })
        })
        .await
    }

    async fn modify_node_group(
        &self,
        name: &str,
        f: impl FnOnce(&mut NodeGroup),
    ) -> InventoryResult<NodeGroup> {
        let updated = {
            let mut tables = self.tables.write().await;
            let group = tables
                .node_groups
                .get_mut(name)
                .ok_or_else(|| InventoryError::NodeGroupNotFound(name.to_string()))?;
            f(group);
            group.clone()
        };
        self.publish(EventKind::Modified, updated.clone());
        Ok(updated)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Create or replace a node.
    pub async fn put_node(&self, node: NodeRecord) -> InventoryResult<()> {
        if node.name.trim().is_empty() {
            return Err(InventoryError::MissingName);
        }
        debug!(node = %node.name, node_group = ?node.node_group(), "node stored");
        self.tables
            .write()
            .await
            .nodes
            .insert(node.name.clone(), node);
        Ok(())
    }

    pub async fn get_node(&self, name: &str) -> Option<NodeRecord> {
        self.tables.read().await.nodes.get(name).cloned()
    }

    /// All nodes, ordered by name.
    pub async fn list_nodes(&self) -> Vec<NodeRecord> {
        let tables = self.tables.read().await;
        let mut nodes: Vec<NodeRecord> = tables.nodes.values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        nodes
    }

    pub async fn delete_node(&self, name: &str) -> InventoryResult<NodeRecord> {
        self.tables
            .write()
            .await
            .nodes
            .remove(name)
            .ok_or_else(|| InventoryError::NodeNotFound(name.to_string()))
    }

    /// Raw metrics for every reporting node labelled with `group`.
    pub async fn group_metrics(&self, group: &str) -> Vec<RawNodeMetrics> {
        let tables = self.tables.read().await;
        let mut metrics: Vec<RawNodeMetrics> = tables
            .nodes
            .values()
            .filter(|node| node.node_group() == Some(group))
            .filter_map(NodeRecord::raw_metrics)
            .collect();
        metrics.sort_by(|a, b| a.node.cmp(&b.node));
        metrics
    }
}

#[async_trait]
impl MetricsSource for Inventory {
    async fn fetch_samples(&self, group: &str) -> Result<Vec<RawNodeMetrics>, MetricsError> {
        Ok(self.group_metrics(group).await)
    }
}

#[async_trait]
impl ScaleSink for Inventory {
    async fn apply_desired_size(&self, group: &str, desired: u32) -> Result<(), ScaleError> {
        match self.set_declared_size(group, desired).await {
            Ok(_) => Ok(()),
            Err(InventoryError::NodeGroupNotFound(name)) => Err(ScaleError::NotFound(name)),
            Err(e) => Err(ScaleError::Rejected(e.to_string())),
        }
    }
}

#[async_trait]
impl NodeGroupLister for Inventory {
    async fn list_node_groups(&self) -> anyhow::Result<Vec<NodeGroup>> {
        Ok(Inventory::list_node_groups(self).await)
    }
}
