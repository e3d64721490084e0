//! The threshold scaling decision.

use nodescale_core::AutoscalerConfig;
use nodescale_metrics::AggregateUtilization;

/// A scaling decision for a single node group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Scale to the specified node count.
    ScaleTo(u32),
    /// No change needed.
    NoChange,
}

/// Desired node count for a group currently at `current` nodes.
///
/// Scale-up wins when both directions would apply. Thresholds compare
/// strictly, so a reading exactly at a threshold holds.
pub fn decide(current: u32, avg_cpu: f64, avg_memory: f64, config: &AutoscalerConfig) -> u32 {
    let hot = avg_cpu > config.cpu_threshold_high || avg_memory > config.memory_threshold_high;
    if hot && current < config.max_nodes {
        return current + 1;
    }

    let cold = avg_cpu < config.cpu_threshold_low && avg_memory < config.memory_threshold_low;
    if cold && current > config.min_nodes {
        return current - 1;
    }

    current
}

/// [`decide`] over an aggregate, as a decision.
pub fn evaluate(
    current: u32,
    utilization: &AggregateUtilization,
    config: &AutoscalerConfig,
) -> ScaleDecision {
    let desired = decide(current, utilization.avg_cpu, utilization.avg_memory, config);
    if desired == current {
        ScaleDecision::NoChange
    } else {
        ScaleDecision::ScaleTo(desired)
    }
}
