//! Utilization math.
//!
//! Pure functions: usage over capacity as a percentage, and the mean of
//! those percentages across a group.

use tracing::debug;

use nodescale_core::NodeName;

use crate::source::RawNodeMetrics;

/// Utilization of a single node, in percent.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSample {
    pub node: NodeName,
    pub cpu_percent: f64,
    pub memory_percent: f64,
}

/// Average utilization across a group, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AggregateUtilization {
    pub avg_cpu: f64,
    pub avg_memory: f64,
}

/// `used / capacity * 100`, or `None` when capacity is not a positive
/// finite number.
pub fn percentage(used: f64, capacity: f64) -> Option<f64> {
    if capacity.is_finite() && capacity > 0.0 {
        Some(used / capacity * 100.0)
    } else {
        None
    }
}

impl NodeSample {
    /// Derive a sample from raw metrics. Nodes without usable CPU or memory
    /// capacity yield `None`.
    pub fn from_raw(raw: &RawNodeMetrics) -> Option<Self> {
        let cpu_percent = percentage(raw.cpu_usage, raw.cpu_capacity)?;
        let memory_percent = percentage(raw.memory_usage, raw.memory_capacity)?;
        Some(Self {
            node: raw.node.clone(),
            cpu_percent,
            memory_percent,
        })
    }
}

/// Convert raw metrics into samples, dropping nodes with zero capacity.
pub fn node_samples(raw: &[RawNodeMetrics]) -> Vec<NodeSample> {
    raw.iter()
        .filter_map(|r| {
            let sample = NodeSample::from_raw(r);
            if sample.is_none() {
                debug!(
                    node = %r.node,
                    cpu_capacity = r.cpu_capacity,
                    memory_capacity = r.memory_capacity,
                    "dropping node with no allocatable capacity"
                );
            }
            sample
        })
        .collect()
}

/// Mean CPU and memory percentage. An empty slice averages to zero.
pub fn average(samples: &[NodeSample]) -> AggregateUtilization {
    if samples.is_empty() {
        return AggregateUtilization::default();
    }

    let (cpu, memory) = samples.iter().fold((0.0, 0.0), |(cpu, memory), s| {
        (cpu + s.cpu_percent, memory + s.memory_percent)
    });
    let n = samples.len() as f64;

    AggregateUtilization {
        avg_cpu: cpu / n,
        avg_memory: memory / n,
    }
}
