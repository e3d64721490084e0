//! Test doubles for the metrics source and scale sink.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use nodescale_metrics::{MetricsError, MetricsSource, RawNodeMetrics};

use crate::sink::{ScaleError, ScaleSink};

/// Returns one node at a fixed utilization, an empty list, or an error.
pub(crate) struct ScriptedMetrics {
    reply: Mutex<Result<Vec<RawNodeMetrics>, String>>,
    calls: AtomicUsize,
}

impl ScriptedMetrics {
    /// One node with 100-unit capacity, so usage reads directly as percent.
    pub(crate) fn utilization(cpu_percent: f64, memory_percent: f64) -> Self {
        Self::with_reply(Ok(vec![RawNodeMetrics {
            node: "node-0".to_string(),
            cpu_usage: cpu_percent,
            memory_usage: memory_percent,
            cpu_capacity: 100.0,
            memory_capacity: 100.0,
        }]))
    }

    pub(crate) fn empty() -> Self {
        Self::with_reply(Ok(Vec::new()))
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self::with_reply(Err(message.to_string()))
    }

    fn with_reply(reply: Result<Vec<RawNodeMetrics>, String>) -> Self {
        Self {
            reply: Mutex::new(reply),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn set_capacity(&self, capacity: f64) {
        if let Ok(nodes) = self.reply.lock().unwrap().as_mut() {
            for node in nodes {
                node.cpu_capacity = capacity;
                node.memory_capacity = capacity;
            }
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for ScriptedMetrics {
    async fn fetch_samples(&self, _group: &str) -> Result<Vec<RawNodeMetrics>, MetricsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .lock()
            .unwrap()
            .clone()
            .map_err(MetricsError::Unavailable)
    }
}

/// Never answers.
pub(crate) struct HangingMetrics;

#[async_trait]
impl MetricsSource for HangingMetrics {
    async fn fetch_samples(&self, _group: &str) -> Result<Vec<RawNodeMetrics>, MetricsError> {
        std::future::pending().await
    }
}

/// Records every applied size; can be told to fail or to block.
pub(crate) struct RecordingSink {
    applied: Mutex<Vec<(String, u32)>>,
    failing: AtomicBool,
    /// When set, applies for this group wait for a permit.
    gate: Option<(String, Semaphore)>,
    started: AtomicUsize,
}

impl RecordingSink {
    pub(crate) fn new() -> Self {
        Self {
            applied: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
            gate: None,
            started: AtomicUsize::new(0),
        }
    }

    /// Block applies for `group` until [`release`](Self::release) is called.
    pub(crate) fn gated(group: &str) -> Self {
        Self {
            gate: Some((group.to_string(), Semaphore::new(0))),
            ..Self::new()
        }
    }

    pub(crate) fn release(&self) {
        if let Some((_, gate)) = &self.gate {
            gate.add_permits(1024);
        }
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn applied(&self) -> Vec<(String, u32)> {
        self.applied.lock().unwrap().clone()
    }

    /// Number of apply calls that have begun, including blocked ones.
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScaleSink for RecordingSink {
    async fn apply_desired_size(&self, group: &str, desired: u32) -> Result<(), ScaleError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some((gated, gate)) = &self.gate
            && gated == group
        {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| ScaleError::Rejected(e.to_string()))?;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ScaleError::Rejected("provider refused".to_string()));
        }
        self.applied
            .lock()
            .unwrap()
            .push((group.to_string(), desired));
        Ok(())
    }
}
