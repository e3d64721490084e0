//! nodescaled — the nodescale daemon.
//!
//! Single binary that assembles the autoscaler:
//! - Inventory (node groups, nodes, watch events)
//! - Reconciler + per-group dispatcher
//! - Watch loop and periodic sweep
//! - REST API
//!
//! # Usage
//!
//! ```text
//! nodescaled run --port 8443 --config /etc/nodescale/autoscaler.toml
//! MAX_NODES=20 nodescaled run --log-format json
//! ```

mod standalone;

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use nodescale_core::AutoscalerConfig;

#[derive(Parser)]
#[command(name = "nodescaled", about = "nodescale autoscaler daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run the autoscaler with an in-memory inventory and the REST API.
    Run {
        /// Port to listen on.
        #[arg(long, default_value = "8443")]
        port: u16,

        /// TOML config file. Flags and environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,
    },
}

/// Per-field overrides applied on top of the file (or the defaults).
#[derive(Args, Debug, Default)]
struct ConfigOverrides {
    #[arg(long, env = "CPU_THRESHOLD_HIGH")]
    cpu_threshold_high: Option<f64>,

    #[arg(long, env = "CPU_THRESHOLD_LOW")]
    cpu_threshold_low: Option<f64>,

    #[arg(long, env = "MEMORY_THRESHOLD_HIGH")]
    memory_threshold_high: Option<f64>,

    #[arg(long, env = "MEMORY_THRESHOLD_LOW")]
    memory_threshold_low: Option<f64>,

    #[arg(long, env = "MIN_NODES")]
    min_nodes: Option<u32>,

    #[arg(long, env = "MAX_NODES")]
    max_nodes: Option<u32>,

    #[arg(long, env = "COOLDOWN_SECONDS")]
    cooldown_seconds: Option<u64>,

    #[arg(long, env = "RECONCILE_INTERVAL_SECONDS")]
    reconcile_interval_seconds: Option<u64>,

    /// Only reconcile this node group.
    #[arg(long, env = "TARGET_NODEGROUP")]
    target_node_group: Option<String>,
}

impl ConfigOverrides {
    fn apply(self, config: &mut AutoscalerConfig) {
        if let Some(v) = self.cpu_threshold_high {
            config.cpu_threshold_high = v;
        }
        if let Some(v) = self.cpu_threshold_low {
            config.cpu_threshold_low = v;
        }
        if let Some(v) = self.memory_threshold_high {
            config.memory_threshold_high = v;
        }
        if let Some(v) = self.memory_threshold_low {
            config.memory_threshold_low = v;
        }
        if let Some(v) = self.min_nodes {
            config.min_nodes = v;
        }
        if let Some(v) = self.max_nodes {
            config.max_nodes = v;
        }
        if let Some(v) = self.cooldown_seconds {
            config.cooldown_seconds = v;
        }
        if let Some(v) = self.reconcile_interval_seconds {
            config.reconcile_interval_seconds = v;
        }
        if let Some(v) = self.target_node_group {
            config.target_node_group = Some(v);
        }
    }
}

/// Resolve the startup config: file (or defaults), then overrides.
fn load_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> anyhow::Result<AutoscalerConfig> {
    let mut config = match path {
        Some(path) => AutoscalerConfig::from_file(path)?,
        None => AutoscalerConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    Ok(config)
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nodescaled=debug,nodescale=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Run {
            port,
            config,
            overrides,
        } => {
            let config = load_config(config.as_deref(), overrides)?;
            standalone::run_standalone(port, config).await
        }
    }
}
