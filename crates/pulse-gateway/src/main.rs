mod server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use pipeline::{ContactDirectory, Pipeline, PipelineConfig};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Real-time behavioral telemetry gateway.
#[derive(Debug, Parser)]
#[command(name = "pulse-gateway", version, about)]
struct Cli {
    /// Address to bind the HTTP listener on.
    #[arg(long, default_value = "127.0.0.1:8600", env = "PULSE_BIND_ADDR")]
    bind: SocketAddr,
    /// Executive contact directory (TOML). Built-in local tiers when omitted.
    #[arg(long, env = "PULSE_CONTACTS_FILE")]
    contacts: Option<PathBuf>,
    /// Seconds between metrics summary logs; 0 disables the logger.
    #[arg(long, default_value_t = 60, env = "PULSE_METRICS_INTERVAL_SECS")]
    metrics_interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::default();
    let directory = match &cli.contacts {
        Some(path) => ContactDirectory::load(path)
            .with_context(|| format!("loading contact directory from {}", path.display()))?,
        None => ContactDirectory::default(),
    };

    // Startup is the only place a failure is fatal; once serving, the
    // pipeline degrades instead of exiting.
    let pipeline = Arc::new(Pipeline::new(config, directory).context("assembling pipeline")?);
    let cancel = CancellationToken::new();
    let mut tasks = pipeline.spawn_background(&cancel);
    if cli.metrics_interval_secs > 0 {
        tasks.push(server::spawn_metrics_logger(
            Arc::clone(&pipeline),
            cli.metrics_interval_secs,
            cancel.clone(),
        ));
    }

    let app = server::build_router(Arc::clone(&pipeline));
    let listener = tokio::net::TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;
    info!(addr = %cli.bind, "gateway listening");

    let shutdown = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
            shutdown.cancel();
        })
        .await
        .context("serving")?;

    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    info!("gateway stopped");
    Ok(())
}
