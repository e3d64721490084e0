//! Inventory error types.

use thiserror::Error;

/// Result type alias for inventory operations.
pub type InventoryResult<T> = Result<T, InventoryError>;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("node group not found: {0}")]
    NodeGroupNotFound(String),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("resource has no name")]
    MissingName,
}
