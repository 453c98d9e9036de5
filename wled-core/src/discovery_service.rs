//! Periodic network discovery feeding the device store.
//!
//! Discovery itself is blocking socket I/O, so each sweep runs on the
//! blocking thread pool and its results are upserted into the store keyed by
//! MAC. Newly found devices get an immediate refresh so they show live state
//! without waiting for the next scheduled sweep.

use std::sync::Arc;

use tokio::sync::watch;

use crate::config::CoreConfig;
use crate::error::{CoreError, Result};
use crate::registry::ManagerRegistry;

/// Drives recurring mDNS sweeps and reconciles results into the store
pub struct DiscoveryService {
    registry: Arc<ManagerRegistry>,
    config: CoreConfig,
}

/// Handle to a running discovery loop
pub struct DiscoveryHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl DiscoveryHandle {
    /// Stop the loop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl DiscoveryService {
    pub fn new(registry: Arc<ManagerRegistry>, config: CoreConfig) -> Self {
        Self { registry, config }
    }

    /// Run one discovery sweep and upsert every result.
    ///
    /// Returns the number of controllers that answered. Devices that were
    /// not already known get an immediate refresh.
    pub async fn scan_once(&self) -> Result<usize> {
        let window = self.config.discovery_window;
        let found = tokio::task::spawn_blocking(move || wled_discovery::get_with_timeout(window))
            .await
            .map_err(|e| CoreError::DiscoveryTask(e.to_string()))?;

        let count = found.len();
        let known: std::collections::HashSet<_> = self
            .registry
            .store()
            .devices()
            .into_iter()
            .filter_map(|d| d.mac)
            .collect();

        for device in found {
            let is_new = !known.contains(&device.mac);
            let id = self.registry.store().upsert_discovered(&device);
            if is_new {
                let manager = self.registry.manager_for(&id);
                tokio::spawn(async move {
                    manager.refresh().await;
                });
            }
        }

        tracing::info!(count, "discovery sweep complete");
        Ok(count)
    }

    /// Spawn the periodic discovery loop.
    ///
    /// The first sweep runs immediately; later sweeps follow the configured
    /// interval. Use the returned handle to stop the loop.
    pub fn spawn(self) -> DiscoveryHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.discovery_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if let Err(e) = self.scan_once().await {
                            tracing::warn!(error = %e, "discovery sweep failed");
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("discovery service stopping");
                        return;
                    }
                }
            }
        });

        DiscoveryHandle { shutdown_tx, task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeviceStore;
    use std::time::Duration;
    use wled_api::{HttpTransport, Transport};

    #[tokio::test]
    async fn test_scan_once_on_quiet_network() {
        // With a tiny window on a network with no controllers, the sweep
        // completes quickly and finds nothing.
        let store = Arc::new(DeviceStore::new());
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new().unwrap());
        let registry = Arc::new(ManagerRegistry::new(Arc::clone(&store), transport));
        let config = CoreConfig::default().with_discovery_window(Duration::from_millis(50));
        let service = DiscoveryService::new(registry, config);

        let count = service.scan_once().await.unwrap();

        assert_eq!(count, store.len());
    }
}
