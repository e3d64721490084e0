//! nodescale-core — shared types for the nodescale autoscaler.
//!
//! Holds the node-group resource model, the autoscaler configuration and
//! its atomically swappable handle, and the resource-quantity parser used
//! to turn provider strings (`250m`, `1Gi`) into plain numbers.

pub mod config;
pub mod types;
pub mod units;

pub use config::{AutoscalerConfig, ConfigError, ConfigHandle};
pub use types::*;
pub use units::{parse_cpu, parse_memory, QuantityError};
