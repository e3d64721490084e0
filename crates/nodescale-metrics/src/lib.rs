//! nodescale-metrics — utilization inputs for the autoscaler.
//!
//! A [`MetricsSource`] returns raw per-node usage and allocatable capacity
//! for the nodes of one group. The utilization module turns those into
//! per-node percentages and a group-level average.
//!
//! # Architecture
//!
//! ```text
//! MetricsSource::fetch_samples(group)
//!   └── Vec<RawNodeMetrics>      (cores / bytes)
//!         └── node_samples()     → Vec<NodeSample>   (percent, zero capacity dropped)
//!               └── average()    → AggregateUtilization
//! ```

pub mod source;
pub mod utilization;

pub use source::{MetricsError, MetricsSource, RawNodeMetrics};
pub use utilization::{average, node_samples, percentage, AggregateUtilization, NodeSample};
