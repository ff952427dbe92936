//! sprout worker
//!
//! Consumes container lifecycle events from the event stream and reconciles
//! them against the Kubernetes API, recording each container's state.

use std::path::PathBuf;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use tokio::sync::watch;
use tracing::{info, warn};

use sprout_core::{ConsumerLoop, Reconciler, run_health_checks};

mod config;
mod factory;
mod logging;

use config::{Config, LogFormat};
use factory::Components;

#[derive(Parser)]
#[command(name = "sprout-worker")]
#[command(about = "Container lifecycle reconciliation worker", long_about = None)]
struct Args {
    /// Config file (otherwise ./sprout.toml, /etc/sprout/sprout.toml, user config dir)
    #[arg(short, long, env = "SPROUT_CONFIG")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Run the health checks and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let mut config = Config::load_default(args.config.as_deref())?;
    config.apply_env()?;
    if let Some(level) = args.log_level {
        config.log.level = level;
    }
    if let Some(format) = args.log_format {
        config.log.format = format;
    }

    logging::init(&config.log)?;

    info!(
        stream = %config.stream.name,
        group = %config.stream.group,
        namespace = %config.kubernetes.namespace,
        "starting sprout worker"
    );

    let components = Components::connect(&config).await?;

    run_health_checks(
        components.store.as_ref(),
        components.orchestrator.as_ref(),
        components.events.as_ref(),
    )
    .await
    .wrap_err("health checks failed")?;

    if args.check {
        return Ok(());
    }

    let reconciler = Reconciler::new(
        components.orchestrator,
        components.store,
        components.events.clone(),
        config.worker.reconciler.clone(),
    );
    let mut consumer = ConsumerLoop::new(components.events, reconciler, config.consumer_config());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(signal) => info!(signal, "shutdown signal received"),
            Err(e) => {
                warn!(error = %e, "failed to listen for shutdown signals");
                return;
            }
        }
        let _ = shutdown_tx.send(true);
    });

    consumer.run(shutdown_rx).await?;

    info!("sprout worker stopped");
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
    }
}
