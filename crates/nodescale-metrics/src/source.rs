//! Metrics source seam.

use async_trait::async_trait;
use thiserror::Error;

use nodescale_core::NodeName;

/// Raw usage and allocatable capacity of one node.
///
/// CPU values are in cores, memory values in bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNodeMetrics {
    pub node: NodeName,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub cpu_capacity: f64,
    pub memory_capacity: f64,
}

/// Errors a metrics source can report.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics unavailable: {0}")]
    Unavailable(String),

    #[error("metrics request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Supplies raw node metrics for the members of a node group.
///
/// Implementations select nodes carrying
/// [`NODE_GROUP_LABEL`](nodescale_core::NODE_GROUP_LABEL)`=<group>` and must
/// return or fail within a bounded time.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Fetch metrics for every node in `group`. An empty list means no data.
    async fn fetch_samples(&self, group: &str) -> Result<Vec<RawNodeMetrics>, MetricsError>;
}
