use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use seedwatch::api;
use seedwatch::commands::CommandResponder;
use seedwatch::config::MonitorConfig;
use seedwatch::engine::Monitor;
use seedwatch::messaging::{Notifier, SlackClient};
use seedwatch::probes::NetworkProber;
use seedwatch::snapshot::SharedSnapshot;
use seedwatch::utils;

#[derive(Parser, Debug)]
#[command(version, about = "DNS seeder, website and node tip monitor")]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    utils::init_tracing();
    let args = Args::parse();

    let mut config = MonitorConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;

    let state = SharedSnapshot::new();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let prober = NetworkProber::new(Duration::from_secs(config.probe_timeout), config.node.as_ref())
        .context("Failed to build probe clients")?;

    let mut notifier: Option<Arc<dyn Notifier>> = None;
    let mut messaging_task = None;
    if let Some(slack) = config.slack.clone() {
        let responder = CommandResponder::new(state.clone(), config.api_host(), config.api_port());
        let client = SlackClient::connect(slack, responder)
            .await
            .context("Failed to start messaging session")?;
        let handle: Arc<dyn Notifier> = Arc::new(client.handle());
        notifier = Some(handle);
        messaging_task = Some(tokio::spawn(client.run(shutdown_rx.clone())));
    } else {
        info!("no messaging platform configured, alerts go to the log only");
    }

    let api_addr = config.http_server.clone();
    let api_state = state.clone();
    let api_shutdown = shutdown_rx.clone();
    let api_task = tokio::spawn(async move {
        if let Err(e) = api::start_server(&api_addr, api_state, api_shutdown).await {
            error!("Status API failed: {}", e);
        }
    });

    let monitor = Monitor::new(config.clone(), Arc::new(prober), state, notifier);
    let monitor_task = tokio::spawn(monitor.run(shutdown_rx));

    wait_for_signal().await?;
    info!("Shutdown signal received, stopping monitor...");
    let _ = shutdown_tx.send(true);

    let known_errors = monitor_task.await.context("Monitor task panicked")?;
    config.set_known_errors(&known_errors);
    config
        .save(&args.config)
        .with_context(|| format!("Failed to persist known errors to {}", args.config.display()))?;
    info!(count = known_errors.len(), "known error endpoints saved");

    if let Some(task) = messaging_task {
        let _ = task.await;
    }
    let _ = api_task.await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.context("Failed to listen for ctrl-c")?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Result<()> {
    tokio::signal::ctrl_c().await.context("Failed to listen for ctrl-c")
}
