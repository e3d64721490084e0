//! nodescale-autoscale — utilization-driven node group scaling.
//!
//! For each node group, fetches node metrics, averages CPU and memory
//! utilization, and moves the declared size by one node at a time.
//! Cooldown windows and a provisioning guard keep the loop from
//! oscillating or compounding requests.
//!
//! # Scaling Algorithm
//!
//! ```text
//! if (avg_cpu > cpu_high || avg_mem > mem_high) && current < max_nodes:
//!     ScaleTo(current + 1)
//! else if avg_cpu < cpu_low && avg_mem < mem_low && current > min_nodes:
//!     ScaleTo(current - 1)
//! else:
//!     NoChange
//! ```
//!
//! # Concurrency
//!
//! The timer sweep and the watch stream both feed a [`Dispatcher`], which
//! owns one worker task per node group. A worker runs one pass at a time
//! and owns that group's cooldown state, so two triggers for the same
//! group never race while different groups proceed independently.
//! Triggers that pile up behind a running pass collapse into one pending
//! pass on the newest snapshot.

pub mod clock;
pub mod cooldown;
pub mod dispatcher;
pub mod driver;
pub mod policy;
pub mod reconciler;
pub mod sink;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use cooldown::CooldownTracker;
pub use dispatcher::Dispatcher;
pub use driver::{run_periodic, run_watch, NodeGroupLister};
pub use policy::{decide, evaluate, ScaleDecision};
pub use reconciler::{ReconcileOutcome, Reconciler, SkipReason};
pub use sink::{ScaleError, ScaleSink};
