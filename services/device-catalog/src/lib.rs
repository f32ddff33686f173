//! Device catalog synchronization service
//!
//! Fetches the devices registered on a LoRaWAN network server, groups them by
//! device type and publishes the result as shared state. Concurrent loads are
//! coalesced into a single registry request.

pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod io;
pub mod refresher;
pub mod registry;
pub mod store;
pub mod telemetry;

pub use catalog::{aggregate, Catalog, DeviceGroup, DeviceRecord};
pub use config::{load_config, Config};
pub use error::{CatalogError, Result};
pub use registry::{DeviceRegistry, RegistryClient};
pub use store::{CatalogSnapshot, CatalogStore, LoadState, Subscription};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::io::ReqwestHttpClient;
use crate::telemetry::TelemetryClient;

/// Run the device catalog service with the given configuration
pub async fn run(config: Config) -> Result<()> {
    let http: Arc<dyn io::HttpClient> = Arc::new(ReqwestHttpClient::with_timeout(
        Duration::from_secs(config.registry.timeout_seconds),
    )?);
    let cancel = CancellationToken::new();

    let registry = Arc::new(RegistryClient::new(&config.registry, Arc::clone(&http)));
    let store = CatalogStore::new(registry);
    let telemetry = Arc::new(TelemetryClient::new(
        &config.registry,
        &config.telemetry,
        Arc::clone(&http),
    ));

    // A failed first load leaves an empty catalog; consumers can retry.
    if let Err(e) = store.initialize().await {
        tracing::warn!("Initial catalog load failed: {}", e);
    }

    // Setup shutdown handler
    let cancel_for_signal = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        cancel_for_signal.cancel();
    });

    let mut tasks = Vec::new();

    if config.refresh.interval_seconds > 0 {
        let interval = Duration::from_secs(config.refresh.interval_seconds);
        tracing::info!("Refreshing catalog every {:?}", interval);
        tasks.push(tokio::spawn(refresher::run_refresh_loop(
            store.clone(),
            interval,
            cancel.clone(),
        )));
    }

    if config.dashboard.enabled {
        let dashboard_port = config.dashboard.port;
        let router = dashboard::build_router(store.clone(), telemetry);
        let cancel_for_dashboard = cancel.clone();

        tasks.push(tokio::spawn(async move {
            let addr = SocketAddr::from(([0, 0, 0, 0], dashboard_port));
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(l) => l,
                Err(e) => {
                    tracing::error!(
                        "Failed to bind dashboard to port {}: {}. Continuing without dashboard.",
                        dashboard_port,
                        e
                    );
                    return;
                }
            };
            tracing::info!("Dashboard listening on http://{}", addr);

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    cancel_for_dashboard.cancelled().await;
                })
                .await
                .ok();

            tracing::debug!("Dashboard stopped");
        }));
    }

    tracing::info!("Device catalog service started");
    cancel.cancelled().await;

    for task in tasks {
        let _ = task.await;
    }
    tracing::info!("Device catalog service stopped");

    Ok(())
}
