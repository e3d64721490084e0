//! One reconciliation pass for one node group.
//!
//! Runs the guard sequence (identity, target filter, deletion, cooldown,
//! provisioning, metrics), asks the policy for a desired size, and applies
//! it through the scale sink. Failures are logged and end the pass; they
//! never propagate to the caller.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace, warn};

use nodescale_core::{ConfigHandle, EventKind, NodeGroup};
use nodescale_metrics::{average, node_samples, AggregateUtilization, MetricsError, MetricsSource};

use crate::clock::{Clock, SystemClock};
use crate::cooldown::CooldownTracker;
use crate::policy::{evaluate, ScaleDecision};
use crate::sink::{ScaleError, ScaleSink};

/// Upper bound on a single metrics fetch or scale call.
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a pass stopped before reaching a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The group has no name.
    NoIdentity,
    /// A target filter is configured and this group is not it.
    NotTargeted,
    /// The group is being deleted.
    Deleted,
    /// The group scaled too recently.
    Cooldown { remaining_ms: u64 },
    /// Nodes from a previous decision are still coming up.
    Provisioning { observed: u32, declared: u32 },
    /// No usable node metrics.
    NoMetrics,
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    Skipped(SkipReason),
    /// Metrics could not be fetched.
    MetricsFailed,
    /// Utilization is within thresholds (or bounds prevent a change).
    Held {
        size: u32,
        utilization: AggregateUtilization,
    },
    /// The new size was applied.
    Scaled { from: u32, to: u32 },
    /// The sink refused or failed; cooldown was not recorded.
    ApplyFailed { from: u32, to: u32 },
    /// The pass was dropped before it ran.
    Abandoned,
}

/// Executes reconciliation passes against the metrics source and scale sink.
pub struct Reconciler {
    config: ConfigHandle,
    metrics: Arc<dyn MetricsSource>,
    sink: Arc<dyn ScaleSink>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl Reconciler {
    /// Create a reconciler using the system clock.
    pub fn new(
        config: ConfigHandle,
        metrics: Arc<dyn MetricsSource>,
        sink: Arc<dyn ScaleSink>,
    ) -> Self {
        Self {
            config,
            metrics,
            sink,
            clock: Arc::new(SystemClock),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Use a different clock for cooldown timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound each metrics fetch and scale call.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Run one pass for `group`.
    ///
    /// `cooldown` must only be touched by one pass at a time; the
    /// [`Dispatcher`](crate::Dispatcher) guarantees this per group.
    pub async fn reconcile(
        &self,
        cooldown: &mut CooldownTracker,
        group: &NodeGroup,
        event: EventKind,
    ) -> ReconcileOutcome {
        let Some(name) = group.identity() else {
            debug!(%event, "node group has no name, skipping");
            return ReconcileOutcome::Skipped(SkipReason::NoIdentity);
        };

        // One snapshot for the whole pass.
        let config = self.config.current();

        if !config.selects(name) {
            trace!(node_group = %name, target = ?config.target(), "not the target node group");
            return ReconcileOutcome::Skipped(SkipReason::NotTargeted);
        }

        debug!(node_group = %name, %event, "reconciling node group");

        if event == EventKind::Deleted {
            cooldown.forget(name);
            info!(node_group = %name, "node group deleted, dropped from cooldown tracking");
            return ReconcileOutcome::Skipped(SkipReason::Deleted);
        }

        let now = self.clock.now_millis();
        if let Some(remaining_ms) = cooldown.remaining(name, now, config.cooldown_millis()) {
            debug!(node_group = %name, remaining_ms, "node group in cooldown, skipping");
            return ReconcileOutcome::Skipped(SkipReason::Cooldown { remaining_ms });
        }

        let declared = group.declared_size();
        let observed = group.observed_size();
        if observed < declared {
            debug!(
                node_group = %name,
                observed,
                declared,
                "nodes still being provisioned, waiting"
            );
            return ReconcileOutcome::Skipped(SkipReason::Provisioning { observed, declared });
        }

        let raw = match tokio::time::timeout(self.call_timeout, self.metrics.fetch_samples(name))
            .await
            .unwrap_or(Err(MetricsError::Timeout(self.call_timeout)))
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!(node_group = %name, error = %e, "failed to fetch node metrics");
                return ReconcileOutcome::MetricsFailed;
            }
        };

        let samples = node_samples(&raw);
        if samples.is_empty() {
            debug!(node_group = %name, "no metrics available, skipping");
            return ReconcileOutcome::Skipped(SkipReason::NoMetrics);
        }

        let utilization = average(&samples);
        debug!(
            node_group = %name,
            nodes = samples.len(),
            avg_cpu = utilization.avg_cpu,
            avg_memory = utilization.avg_memory,
            "node group utilization"
        );

        let desired = match evaluate(declared, &utilization, &config) {
            ScaleDecision::NoChange => {
                debug!(node_group = %name, size = declared, "no scaling needed");
                return ReconcileOutcome::Held {
                    size: declared,
                    utilization,
                };
            }
            ScaleDecision::ScaleTo(desired) => desired,
        };

        info!(
            node_group = %name,
            from = declared,
            to = desired,
            avg_cpu = utilization.avg_cpu,
            avg_memory = utilization.avg_memory,
            direction = if desired > declared { "up" } else { "down" },
            "scaling node group"
        );

        let applied = tokio::time::timeout(
            self.call_timeout,
            self.sink.apply_desired_size(name, desired),
        )
        .await
        .unwrap_or(Err(ScaleError::Timeout(self.call_timeout)));

        match applied {
            Ok(()) => {
                cooldown.record_scale(name, now);
                info!(node_group = %name, size = desired, "node group scaled");
                ReconcileOutcome::Scaled {
                    from: declared,
                    to: desired,
                }
            }
            Err(e) => {
                warn!(
                    node_group = %name,
                    to = desired,
                    error = %e,
                    "failed to scale node group"
                );
                ReconcileOutcome::ApplyFailed {
                    from: declared,
                    to: desired,
                }
            }
        }
    }
}
