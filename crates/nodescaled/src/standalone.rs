//! Standalone mode: inventory, autoscaler loops and the REST API in one
//! process.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use nodescale_autoscale::{Dispatcher, Reconciler, run_periodic, run_watch};
use nodescale_core::{AutoscalerConfig, ConfigHandle};
use nodescale_inventory::Inventory;

pub async fn run_standalone(port: u16, config: AutoscalerConfig) -> anyhow::Result<()> {
    info!("nodescale daemon starting in standalone mode");

    // ── Initialize subsystems ──────────────────────────────────

    let config = ConfigHandle::new(config)?;
    {
        let current = config.current();
        info!(
            min_nodes = current.min_nodes,
            max_nodes = current.max_nodes,
            cooldown_secs = current.cooldown_seconds,
            interval_secs = current.reconcile_interval_seconds,
            target = current.target().unwrap_or("*"),
            "autoscaler config loaded"
        );
    }

    let inventory = Inventory::new();
    let events = inventory.subscribe();

    let reconciler = Reconciler::new(
        config.clone(),
        Arc::new(inventory.clone()),
        Arc::new(inventory.clone()),
    );
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(reconciler)));
    info!("reconciler initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let watch_handle = tokio::spawn(run_watch(
        dispatcher.clone(),
        events,
        shutdown_rx.clone(),
    ));

    let periodic_handle = tokio::spawn(run_periodic(
        dispatcher.clone(),
        Arc::new(inventory.clone()),
        shutdown_rx,
    ));

    // ── Start API server ───────────────────────────────────────

    let router = nodescale_api::build_router(inventory, config);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Stop the producers first, then let queued passes finish.
    let _ = watch_handle.await;
    let _ = periodic_handle.await;
    dispatcher.shutdown().await;

    info!("nodescale daemon stopped");
    Ok(())
}
