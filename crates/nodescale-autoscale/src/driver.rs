//! Reconciliation triggers.
//!
//! Two producers feed the [`Dispatcher`]: a periodic sweep that submits a
//! `Modified` pass for every known node group, and a watch loop that
//! forwards resource events as they arrive.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use nodescale_core::{EventKind, NodeGroup, WatchEvent};

use crate::dispatcher::Dispatcher;

/// Lists the node groups known to the cluster.
#[async_trait]
pub trait NodeGroupLister: Send + Sync {
    async fn list_node_groups(&self) -> anyhow::Result<Vec<NodeGroup>>;
}

/// Submit a pass for every node group.
async fn sweep(dispatcher: &Dispatcher, lister: &dyn NodeGroupLister) {
    let groups = match lister.list_node_groups().await {
        Ok(groups) => groups,
        Err(e) => {
            warn!(error = %e, "failed to list node groups for periodic reconciliation");
            return;
        }
    };

    // Workers of groups that are gone or no longer targeted are retired.
    let config = dispatcher.reconciler().config().current();
    let live: HashSet<String> = groups
        .iter()
        .filter_map(NodeGroup::identity)
        .filter(|name| config.selects(name))
        .map(str::to_string)
        .collect();
    dispatcher.retain_groups(&live).await;

    debug!(groups = groups.len(), "running periodic reconciliation");
    for group in groups {
        // Outcomes are logged by the reconciler.
        let _ = dispatcher.submit(group, EventKind::Modified).await;
    }
}

/// Run the periodic sweep until shutdown.
///
/// The interval follows `reconcile_interval_seconds` of the current
/// configuration and is re-read whenever the configuration is replaced.
pub async fn run_periodic(
    dispatcher: Arc<Dispatcher>,
    lister: Arc<dyn NodeGroupLister>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut config_rx = dispatcher.reconciler().config().subscribe();
    let mut interval = config_rx.borrow_and_update().reconcile_interval();

    info!(interval_secs = interval.as_secs(), "periodic reconciliation started");

    // The deadline survives config changes that keep the same interval.
    let tick = tokio::time::sleep(interval);
    tokio::pin!(tick);

    loop {
        tokio::select! {
            () = &mut tick => {
                sweep(&dispatcher, lister.as_ref()).await;
                tick.as_mut().reset(Instant::now() + interval);
            }
            Ok(()) = config_rx.changed() => {
                let next = config_rx.borrow_and_update().reconcile_interval();
                if next != interval {
                    info!(interval_secs = next.as_secs(), "reconcile interval changed");
                    interval = next;
                    tick.as_mut().reset(Instant::now() + interval);
                }
            }
            _ = shutdown.changed() => {
                info!("periodic reconciliation shutting down");
                break;
            }
        }
    }
}

/// Forward watch events to the dispatcher until the stream closes or
/// shutdown is signalled.
pub async fn run_watch(
    dispatcher: Arc<Dispatcher>,
    mut events: broadcast::Receiver<WatchEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("watching node groups");

    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    debug!(
                        node_group = ?event.group.identity(),
                        event = %event.kind,
                        "node group event"
                    );
                    let _ = dispatcher.submit(event.group, event.kind).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    // The next periodic sweep covers whatever was dropped.
                    warn!(missed, "node group watch lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    info!("node group watch closed");
                    break;
                }
            },
            _ = shutdown.changed() => {
                info!("node group watch shutting down");
                break;
            }
        }
    }
}
