//! REST API handlers.
//!
//! Each handler reads/writes via `Inventory` or `ConfigHandle` and returns
//! JSON responses.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use nodescale_core::{AutoscalerConfig, EventKind, NodeGroup, NodeGroupSpec, NodeGroupStatus};
use nodescale_inventory::{InventoryError, NodeRecord};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn inventory_error(e: InventoryError) -> axum::response::Response {
    let status = match e {
        InventoryError::NodeGroupNotFound(_) | InventoryError::NodeNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        InventoryError::MissingName => StatusCode::BAD_REQUEST,
    };
    error_response(&e.to_string(), status).into_response()
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}

// ── Node groups ────────────────────────────────────────────────

/// Node group body; the name comes from the path.
#[derive(serde::Deserialize)]
pub struct NodeGroupBody {
    pub spec: NodeGroupSpec,
    #[serde(default)]
    pub status: Option<NodeGroupStatus>,
}

/// GET /api/v1/nodegroups
pub async fn list_node_groups(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.inventory.list_node_groups().await)
}

/// GET /api/v1/nodegroups/{name}
pub async fn get_node_group(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.inventory.get_node_group(&name).await {
        Some(group) => ApiResponse::ok(group).into_response(),
        None => error_response("node group not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// PUT /api/v1/nodegroups/{name}
pub async fn put_node_group(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(body): Json<NodeGroupBody>,
) -> impl IntoResponse {
    let group = NodeGroup {
        name: Some(name.clone()),
        spec: body.spec,
        status: body.status,
    };

    match state.inventory.put_node_group(group).await {
        Ok(kind) => {
            let status = match kind {
                EventKind::Created => StatusCode::CREATED,
                _ => StatusCode::OK,
            };
            match state.inventory.get_node_group(&name).await {
                Some(stored) => (status, ApiResponse::ok(stored)).into_response(),
                None => error_response("node group not found", StatusCode::NOT_FOUND)
                    .into_response(),
            }
        }
        Err(e) => inventory_error(e),
    }
}

/// DELETE /api/v1/nodegroups/{name}
pub async fn delete_node_group(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.inventory.delete_node_group(&name).await {
        Some(_) => ApiResponse::ok("deleted").into_response(),
        None => error_response("node group not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// Observed-size report body.
#[derive(serde::Deserialize)]
pub struct StatusRequest {
    pub node_count: u32,
}

/// PUT /api/v1/nodegroups/{name}/status
pub async fn put_node_group_status(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(req): Json<StatusRequest>,
) -> impl IntoResponse {
    match state.inventory.set_observed_size(&name, req.node_count).await {
        Ok(group) => ApiResponse::ok(group).into_response(),
        Err(e) => inventory_error(e),
    }
}

// ── Nodes ──────────────────────────────────────────────────────

/// GET /api/v1/nodes
pub async fn list_nodes(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.inventory.list_nodes().await)
}

/// GET /api/v1/nodes/{name}
pub async fn get_node(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.inventory.get_node(&name).await {
        Some(node) => ApiResponse::ok(node).into_response(),
        None => error_response("node not found", StatusCode::NOT_FOUND).into_response(),
    }
}

/// PUT /api/v1/nodes/{name}
pub async fn put_node(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Json(mut node): Json<NodeRecord>,
) -> impl IntoResponse {
    node.name = name;
    match state.inventory.put_node(node.clone()).await {
        Ok(()) => ApiResponse::ok(node).into_response(),
        Err(e) => inventory_error(e),
    }
}

/// DELETE /api/v1/nodes/{name}
pub async fn delete_node(
    State(state): State<ApiState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    match state.inventory.delete_node(&name).await {
        Ok(_) => ApiResponse::ok("deleted").into_response(),
        Err(e) => inventory_error(e),
    }
}

// ── Config ─────────────────────────────────────────────────────

/// GET /api/v1/config
pub async fn get_config(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.config.current().as_ref().clone())
}

/// PUT /api/v1/config
///
/// Replaces the whole configuration; omitted fields take their defaults.
pub async fn put_config(
    State(state): State<ApiState>,
    Json(config): Json<AutoscalerConfig>,
) -> impl IntoResponse {
    match state.config.update(config) {
        Ok(snapshot) => {
            info!("autoscaler config replaced via API");
            ApiResponse::ok(snapshot.as_ref().clone()).into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_REQUEST).into_response(),
    }
}
