//! Periodic catalog refresh

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::store::CatalogStore;

/// Re-initialize the store every `interval` until `cancel` fires
///
/// The first refresh happens one interval after the call. Failed loads are
/// logged and the loop keeps going; the store itself records the failure.
pub async fn run_refresh_loop(store: CatalogStore, interval: Duration, cancel: CancellationToken) {
    let mut consecutive_failures: u32 = 0;

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => {
                tracing::debug!("Catalog refresh loop cancelled");
                break;
            }
        }

        match store.initialize().await {
            Ok(()) => {
                if consecutive_failures > 0 {
                    tracing::info!(
                        "Catalog refresh recovered after {} failures",
                        consecutive_failures
                    );
                }
                consecutive_failures = 0;
            }
            Err(e) => {
                consecutive_failures += 1;
                tracing::warn!(
                    "Catalog refresh failed ({} in a row): {}",
                    consecutive_failures,
                    e
                );
            }
        }
    }
}
