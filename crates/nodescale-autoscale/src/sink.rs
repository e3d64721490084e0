//! Apply-scale seam.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Errors from applying a new desired size.
#[derive(Debug, Error)]
pub enum ScaleError {
    #[error("node group not found: {0}")]
    NotFound(String),

    #[error("scale request rejected: {0}")]
    Rejected(String),

    #[error("scale request timed out after {0:?}")]
    Timeout(Duration),
}

/// Applies a node group's new declared size to the infrastructure.
///
/// Implementations must return or fail within a bounded time.
#[async_trait]
pub trait ScaleSink: Send + Sync {
    async fn apply_desired_size(&self, group: &str, desired: u32) -> Result<(), ScaleError>;
}
