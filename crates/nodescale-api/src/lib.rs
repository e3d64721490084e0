//! nodescale-api — REST API for the standalone autoscaler.
//!
//! Provides axum route handlers for registering node groups and nodes and
//! for reading or replacing the autoscaler configuration.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Liveness |
//! | GET | `/api/v1/nodegroups` | List node groups |
//! | GET | `/api/v1/nodegroups/{name}` | Get a node group |
//! | PUT | `/api/v1/nodegroups/{name}` | Create or replace a node group |
//! | DELETE | `/api/v1/nodegroups/{name}` | Delete a node group |
//! | PUT | `/api/v1/nodegroups/{name}/status` | Report the provisioned node count |
//! | GET | `/api/v1/nodes` | List nodes |
//! | GET | `/api/v1/nodes/{name}` | Get a node |
//! | PUT | `/api/v1/nodes/{name}` | Create or replace a node |
//! | DELETE | `/api/v1/nodes/{name}` | Delete a node |
//! | GET | `/api/v1/config` | Current autoscaler config |
//! | PUT | `/api/v1/config` | Replace the autoscaler config |

pub mod handlers;

use axum::Router;
use axum::routing::{get, put};

use nodescale_core::ConfigHandle;
use nodescale_inventory::Inventory;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub inventory: Inventory,
    pub config: ConfigHandle,
}

/// Build the complete API router.
pub fn build_router(inventory: Inventory, config: ConfigHandle) -> Router {
    let state = ApiState { inventory, config };

    let api_routes = Router::new()
        .route("/nodegroups", get(handlers::list_node_groups))
        .route(
            "/nodegroups/{name}",
            get(handlers::get_node_group)
                .put(handlers::put_node_group)
                .delete(handlers::delete_node_group),
        )
        .route("/nodegroups/{name}/status", put(handlers::put_node_group_status))
        .route("/nodes", get(handlers::list_nodes))
        .route(
            "/nodes/{name}",
            get(handlers::get_node)
                .put(handlers::put_node)
                .delete(handlers::delete_node),
        )
        .route("/config", get(handlers::get_config).put(handlers::put_config))
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
