//! Node records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use nodescale_core::{parse_cpu, parse_memory, NodeName, NODE_GROUP_LABEL};
use nodescale_metrics::RawNodeMetrics;

/// CPU and memory as provider quantity strings (`"3800m"`, `"15Gi"`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ResourceQuantities {
    pub cpu: String,
    pub memory: String,
}

/// A compute node as reported by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NodeRecord {
    #[serde(default)]
    pub name: NodeName,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Capacity available to workloads.
    pub allocatable: ResourceQuantities,
    /// Latest usage reading; `None` until the node reports.
    #[serde(default)]
    pub usage: Option<ResourceQuantities>,
}

impl NodeRecord {
    /// The node group this node belongs to, if labelled.
    pub fn node_group(&self) -> Option<&str> {
        self.labels.get(NODE_GROUP_LABEL).map(String::as_str)
    }

    /// Usage and capacity in cores and bytes. Unparseable quantities read
    /// as zero; nodes that have not reported usage yield `None`.
    pub fn raw_metrics(&self) -> Option<RawNodeMetrics> {
        let usage = self.usage.as_ref()?;
        Some(RawNodeMetrics {
            node: self.name.clone(),
            cpu_usage: self.quantity("cpu usage", &usage.cpu, parse_cpu),
            memory_usage: self.quantity("memory usage", &usage.memory, parse_memory),
            cpu_capacity: self.quantity("allocatable cpu", &self.allocatable.cpu, parse_cpu),
            memory_capacity: self.quantity(
                "allocatable memory",
                &self.allocatable.memory,
                parse_memory,
            ),
        })
    }

    fn quantity<E: std::fmt::Display>(
        &self,
        what: &str,
        raw: &str,
        parse: fn(&str) -> Result<f64, E>,
    ) -> f64 {
        parse(raw).unwrap_or_else(|e| {
            warn!(node = %self.name, what, error = %e, "unparseable quantity, reading as zero");
            0.0
        })
    }
}
