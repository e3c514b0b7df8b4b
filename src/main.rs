//! # Leasegate Entry Point

use anyhow::Context;
use clap::{Parser, Subcommand};
use leasegate::{config::ConfigLoader, db, server::run_server, telemetry::init_tracing};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "leasegate", version, about = "Property management authorization and invite service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Serve the HTTP API (default)
    Serve {
        /// Apply pending migrations before serving
        #[arg(long)]
        migrate: bool,
    },
    /// Apply pending migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config).context("initializing telemetry")?;

    match config.redacted_json() {
        Ok(redacted) => tracing::info!(profile = %config.profile, config = %redacted, "Loaded configuration"),
        Err(err) => tracing::warn!(error = %err, "Could not render configuration"),
    }

    let db = db::init_pool(&config)
        .await
        .context("initializing database connection pool")?;

    match cli.command.unwrap_or(Command::Serve { migrate: false }) {
        Command::Migrate => db::run_migrations(&db).await,
        Command::Serve { migrate } => {
            if migrate {
                db::run_migrations(&db).await?;
            }

            let shutdown = CancellationToken::new();
            let trigger = shutdown.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                trigger.cancel();
            });

            run_server(config, db, shutdown).await
        }
    }
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
