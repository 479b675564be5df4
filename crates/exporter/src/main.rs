//! fio-exporter binary.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use fio_exporter::{BootstrapError, Cli, Exporter, ExporterConfig, HttpConnector};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level)
            .with_context(|| format!("invalid log level: {}", cli.log_level))?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ExporterConfig::from(&cli);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoints = config.endpoints.len(),
        "starting fio-exporter"
    );

    let connector = HttpConnector::new(config.request_timeout);
    let mut exporter = Exporter::new(config).context("registering metrics")?;

    match exporter.connect(&connector).await {
        Ok(count) => tracing::info!(count, "endpoints connected"),
        Err(BootstrapError::NoTargets) => {
            eprintln!("No endpoints could be reached.\n");
            let _ = Cli::command().print_help();
            std::process::exit(1);
        }
    }

    tokio::spawn(wait_for_shutdown(exporter.cancel_token()));
    exporter.run().await
}

async fn wait_for_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => tracing::info!("received SIGINT, shutting down"),
                    _ = sigterm.recv() => tracing::info!("received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not register SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, shutting down");
    }

    cancel.cancel();
}
