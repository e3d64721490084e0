//! Autoscaler configuration.
//!
//! `AutoscalerConfig` is an immutable value. Changes go through
//! [`ConfigHandle::update`], which validates the replacement and publishes
//! it as a new snapshot; readers take one snapshot per reconciliation pass
//! and never observe a half-applied update.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::info;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{name} must be within 0..=100, got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("{metric} low threshold {low} exceeds high threshold {high}")]
    InvertedThresholds {
        metric: &'static str,
        low: f64,
        high: f64,
    },

    #[error("min_nodes {min} exceeds max_nodes {max}")]
    InvertedBounds { min: u32, max: u32 },

    #[error("reconcile_interval_seconds must be positive")]
    ZeroInterval,
}

/// Thresholds, bounds and timing for the autoscaler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoscalerConfig {
    /// Scale up when average CPU % exceeds this.
    pub cpu_threshold_high: f64,
    /// Scale down when average CPU % is below this (and memory is low too).
    pub cpu_threshold_low: f64,
    /// Scale up when average memory % exceeds this.
    pub memory_threshold_high: f64,
    /// Scale down when average memory % is below this (and CPU is low too).
    pub memory_threshold_low: f64,
    pub min_nodes: u32,
    pub max_nodes: u32,
    /// Minimum time between two scaling actions on the same group.
    pub cooldown_seconds: u64,
    /// Period of the timer-driven reconciliation sweep.
    pub reconcile_interval_seconds: u64,
    /// Only reconcile this node group when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_node_group: Option<String>,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            cpu_threshold_high: 80.0,
            cpu_threshold_low: 30.0,
            memory_threshold_high: 80.0,
            memory_threshold_low: 30.0,
            min_nodes: 1,
            max_nodes: 10,
            cooldown_seconds: 180,
            reconcile_interval_seconds: 30,
            target_node_group: None,
        }
    }
}

impl AutoscalerConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AutoscalerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check ranges and orderings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let thresholds = [
            ("cpu_threshold_high", self.cpu_threshold_high),
            ("cpu_threshold_low", self.cpu_threshold_low),
            ("memory_threshold_high", self.memory_threshold_high),
            ("memory_threshold_low", self.memory_threshold_low),
        ];
        for (name, value) in thresholds {
            // NaN fails the range check too.
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }

        if self.cpu_threshold_low > self.cpu_threshold_high {
            return Err(ConfigError::InvertedThresholds {
                metric: "cpu",
                low: self.cpu_threshold_low,
                high: self.cpu_threshold_high,
            });
        }
        if self.memory_threshold_low > self.memory_threshold_high {
            return Err(ConfigError::InvertedThresholds {
                metric: "memory",
                low: self.memory_threshold_low,
                high: self.memory_threshold_high,
            });
        }

        if self.min_nodes > self.max_nodes {
            return Err(ConfigError::InvertedBounds {
                min: self.min_nodes,
                max: self.max_nodes,
            });
        }

        if self.reconcile_interval_seconds == 0 {
            return Err(ConfigError::ZeroInterval);
        }

        Ok(())
    }

    /// Cooldown window in milliseconds.
    pub fn cooldown_millis(&self) -> u64 {
        self.cooldown_seconds.saturating_mul(1000)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_seconds)
    }

    /// The target filter, if one is set. A blank filter means "no filter".
    pub fn target(&self) -> Option<&str> {
        self.target_node_group
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Whether `name` passes the target filter.
    pub fn selects(&self, name: &str) -> bool {
        self.target().is_none_or(|target| target == name)
    }
}

/// Shared handle to the current configuration snapshot.
///
/// Cloning the handle shares the same underlying snapshot.
#[derive(Clone)]
pub struct ConfigHandle {
    tx: Arc<watch::Sender<Arc<AutoscalerConfig>>>,
}

impl ConfigHandle {
    /// Wrap a validated configuration.
    pub fn new(config: AutoscalerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (tx, _rx) = watch::channel(Arc::new(config));
        Ok(Self { tx: Arc::new(tx) })
    }

    /// The current snapshot.
    pub fn current(&self) -> Arc<AutoscalerConfig> {
        self.tx.borrow().clone()
    }

    /// Replace the whole configuration. Invalid replacements are rejected
    /// and the previous snapshot stays in effect.
    pub fn update(&self, config: AutoscalerConfig) -> Result<Arc<AutoscalerConfig>, ConfigError> {
        config.validate()?;
        let snapshot = Arc::new(config);
        self.tx.send_replace(snapshot.clone());
        info!(config = ?snapshot, "autoscaler config updated");
        Ok(snapshot)
    }

    /// Receive every future snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<AutoscalerConfig>> {
        self.tx.subscribe()
    }
}
