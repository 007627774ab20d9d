//! OSO Volume Restore Kubernetes Operator
//!
//! Main entry point for the operator. Sets up the Kubernetes client,
//! registers the CRD, selects the restore driver, and runs the
//! reconciliation loop.

use std::sync::Arc;

use kube::Client;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use volume_restore_operator::{
    adapters::driver,
    controllers::{self, Context},
    crd, metrics,
};

/// Default metrics port
const METRICS_PORT: u16 = 8080;

/// Environment variable naming the restore driver to use
const DRIVER_ENV: &str = "RESTORE_DRIVER";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    info!("Starting OSO Volume Restore Operator");

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Register the VolumeSnapshotRestore CRD before watching it
    crd::bootstrap::register(&client).await?;

    // Resolve the data-plane driver
    let driver_name = std::env::var(DRIVER_ENV).unwrap_or_else(|_| "mock".to_string());
    let restore_driver = driver::get(&driver_name)?;
    info!(driver = restore_driver.name(), "Using restore driver");

    // Create shared context
    let context = Arc::new(Context::new(client.clone(), restore_driver));

    // Start metrics server
    let metrics_handle = tokio::spawn(metrics::serve(METRICS_PORT));
    info!("Metrics server starting on port {}", METRICS_PORT);

    // Run the restore controller
    let restore_controller = controllers::run_restore_controller(client.clone(), context);

    // Handle graceful shutdown
    tokio::select! {
        _ = restore_controller => {
            error!("Restore controller exited unexpectedly");
        }
        _ = metrics_handle => {
            error!("Metrics server exited unexpectedly");
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
        }
    }

    info!("OSO Volume Restore Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kube=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
