//! nodescale-inventory — in-memory node group and node store.
//!
//! Stands in for the cluster API in standalone mode. Node groups and nodes
//! are registered through the REST API; every node group change is
//! published as a [`WatchEvent`](nodescale_core::WatchEvent).
//!
//! # Architecture
//!
//! ```text
//! Inventory
//!   ├── node groups  ── put/delete/status ──► broadcast<WatchEvent>
//!   ├── nodes        (labels, allocatable, usage quantities)
//!   ├── impl MetricsSource   nodes labelled with the group → RawNodeMetrics
//!   ├── impl ScaleSink       replace spec.node_count, emit Modified
//!   └── impl NodeGroupLister list for the periodic sweep
//! ```

pub mod error;
pub mod store;
pub mod types;

pub use error::{InventoryError, InventoryResult};
pub use store::Inventory;
pub use types::{NodeRecord, ResourceQuantities};
