use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use gatekeeper::admission::{AdmissionController, Sweeper};
use gatekeeper::config::{GatekeeperConfig, LoggingConfig};
use gatekeeper::http::{AppState, HttpServer};

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper")]
#[command(about = "API gateway with per-client admission control", version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port, overrides the configuration file and API_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Log filter directive, e.g. "debug" or "gatekeeper=trace"
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = GatekeeperConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.http_addr.set_port(port);
    }

    init_tracing(&config.logging, args.log_level.as_deref());

    info!("Starting Gatekeeper");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        info!(path = %path.display(), "Configuration file loaded");
    }
    info!(
        http_addr = %config.server.http_addr,
        window_ms = config.admission.window_ms,
        max_requests = config.admission.max_requests,
        "Configuration loaded"
    );

    // Initialize the admission controller
    let policy = config.admission.policy()?;
    let controller = Arc::new(AdmissionController::new(policy));
    let sweeper = Sweeper::spawn(Arc::clone(&controller), config.admission.sweep_interval());
    info!("Admission controller initialized");

    let state = AppState::new(Arc::clone(&controller), &config.server);
    let server = HttpServer::new(config.server.http_addr, state);

    // Run the server with graceful shutdown on Ctrl+C
    let served = server.serve_with_shutdown(shutdown_signal()).await;

    sweeper.shutdown().await;
    let drained = controller.drain();
    info!(counters = drained, "Admission controller drained");

    served?;
    info!("Gatekeeper stopped");
    Ok(())
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig, level_override: Option<&str>) {
    let directive = level_override.unwrap_or(&logging.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
