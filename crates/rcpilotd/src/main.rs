//! rcpilotd: rollouts, autoscaling and metric snapshots for replica
//! groups.
//!
//! # Usage
//!
//! ```text
//! rcpilotd --config rcpilot.toml rollout --group svc-a --image registry/svc-a:2 --version 2
//! rcpilotd autoscale --group svc-a
//! rcpilotd snapshot --group svc-a
//! rcpilotd --dry-run rollout --group svc-a --image svc-a:2 --version 2
//! ```

mod collaborators;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rcpilot_autoscale::{Autoscaler, ScalingController};
use rcpilot_core::RcpilotConfig;
use rcpilot_metrics::MetricAggregator;
use rcpilot_rollout::{RolloutController, RolloutRequest};

#[derive(Parser, Debug)]
#[command(name = "rcpilotd", about = "Rolling replacement and autoscaling for replica groups")]
struct Cli {
    /// Path to rcpilot.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override `cluster.api_server`.
    #[arg(long, global = true)]
    api_server: Option<String>,

    /// Override `cluster.namespace`.
    #[arg(long, short = 'n', global = true)]
    namespace: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Run against an in-memory cluster seeded with the target group.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replace a replica group with a new image/version, one replica at a time.
    Rollout {
        /// Group to replace.
        #[arg(long)]
        group: String,

        /// Image for the new group.
        #[arg(long)]
        image: String,

        /// Version label of the new group.
        #[arg(long)]
        version: String,

        /// Name of the new group (default: `{group without old version}-{version}`).
        #[arg(long)]
        name: Option<String>,

        /// Environment for the new container, `KEY=VALUE`. Repeatable.
        #[arg(long = "env", value_parser = parse_env)]
        env: Vec<(String, String)>,

        /// Override `rollout.interval`, e.g. `5s`.
        #[arg(long)]
        interval: Option<String>,
    },

    /// Evaluate the autoscale policies periodically until Ctrl-C.
    Autoscale {
        #[arg(long)]
        group: String,
    },

    /// Print one metric snapshot of a group as JSON.
    Snapshot {
        #[arg(long)]
        group: String,
    },

    /// Print the effective configuration as TOML.
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = load_config(&cli)?;

    match cli.command {
        Command::Rollout {
            ref group,
            ref image,
            ref version,
            ref name,
            ref env,
            ref interval,
        } => {
            let mut request = RolloutRequest::new(group, image, version);
            for (key, value) in env {
                request = request.with_env(key, value);
            }
            if let Some(name) = name {
                request = request.with_new_name(name);
            }
            let interval = match interval {
                Some(i) => rcpilot_core::config::parse_duration(i)
                    .with_context(|| format!("invalid --interval {i:?}"))?,
                None => config.rollout_interval(),
            };
            run_rollout(&config, cli.dry_run, request, interval).await
        }
        Command::Autoscale { ref group } => run_autoscale(&config, cli.dry_run, group).await,
        Command::Snapshot { ref group } => run_snapshot(&config, cli.dry_run, group).await,
        Command::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rcpilot=debug"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// File (or defaults), then command-line overrides, then validation.
fn load_config(cli: &Cli) -> anyhow::Result<RcpilotConfig> {
    let mut config = match &cli.config {
        Some(path) => RcpilotConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => RcpilotConfig::default(),
    };
    if let Some(api_server) = &cli.api_server {
        config.cluster.api_server = api_server.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.cluster.namespace = namespace.clone();
    }
    config.validate()?;
    Ok(config)
}

fn parse_env(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got {s:?}")),
    }
}

async fn run_rollout(
    config: &RcpilotConfig,
    dry_run: bool,
    request: RolloutRequest,
    interval: std::time::Duration,
) -> anyhow::Result<()> {
    let collab = collaborators::build(config, dry_run, &request.old_group).await;
    let controller = RolloutController::new(collab.cluster.clone(), interval);

    info!(
        group = %request.old_group,
        image = %request.image,
        version = %request.version,
        interval_ms = interval.as_millis() as u64,
        "starting rollout"
    );

    // No cancellation inside the controller; Ctrl-C abandons the rollout
    // wherever it is.
    let report = tokio::select! {
        report = controller.run(&request) => report,
        signal = tokio::signal::ctrl_c() => {
            signal.context("installing Ctrl-C handler")?;
            anyhow::bail!(
                "rollout of {} interrupted; both groups are left at their current sizes",
                request.old_group
            );
        }
    };

    println!("{}", serde_json::to_string_pretty(&report.state)?);
    if let Some(cluster) = &collab.in_memory {
        for event in cluster.take_events().await {
            info!(?event, "dry run: cluster write");
        }
    }

    let Some(e) = report.error else {
        return Ok(());
    };
    let state = &report.state;
    let context = match &state.new_group {
        Some(new) => format!(
            "rollout failed in {:?}; new group {new} left at {} replicas",
            // The phase entered before Failed.
            state.phases.iter().rev().nth(1).copied().unwrap_or(state.phase),
            state.new_size
        ),
        None => "rollout failed before the new group was created".to_string(),
    };
    Err(anyhow::Error::new(e).context(context))
}

async fn run_autoscale(config: &RcpilotConfig, dry_run: bool, group: &str) -> anyhow::Result<()> {
    if config.autoscale.scale_up.is_none() && config.autoscale.scale_down.is_none() {
        warn!("no scale_up or scale_down policy configured; the autoscaler will never resize");
    }

    let collab = collaborators::build(config, dry_run, group).await;
    let aggregator = MetricAggregator::new(collab.cluster.clone(), collab.sampler.clone());
    let scaler = ScalingController::new(collab.cluster.clone());
    let autoscaler = Autoscaler::from_config(aggregator, scaler, &config.autoscale)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interval = config.autoscale_interval();
    let task_group = group.to_string();
    let task = tokio::spawn(async move {
        autoscaler.run(&task_group, interval, shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("installing Ctrl-C handler")?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    task.await?;

    info!(group, "autoscaler stopped");
    Ok(())
}

async fn run_snapshot(config: &RcpilotConfig, dry_run: bool, group: &str) -> anyhow::Result<()> {
    let collab = collaborators::build(config, dry_run, group).await;
    let aggregator = MetricAggregator::new(collab.cluster, collab.sampler);

    let (snapshot, result) = aggregator.snapshot(group).await?.into_parts();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    if let Err(partial) = result {
        warn!(group, error = %partial, "snapshot is partial");
    }
    Ok(())
}
