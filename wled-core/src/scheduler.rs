//! Periodic bulk refresh of every visible device.
//!
//! The scheduler fans one refresh task out per device and joins them all, so
//! one slow or offline controller never delays the others. Devices already
//! mid-refresh are skipped; the per-device manager coalesces any remaining
//! races.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::CoreConfig;
use crate::registry::ManagerRegistry;

/// Drives recurring refresh sweeps across the whole store
pub struct RefreshScheduler {
    registry: Arc<ManagerRegistry>,
    config: CoreConfig,
}

/// Handle to a running scheduler loop
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    task: tokio::task::JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the loop and wait for it to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl RefreshScheduler {
    pub fn new(registry: Arc<ManagerRegistry>, config: CoreConfig) -> Self {
        Self { registry, config }
    }

    /// Refresh all devices once, in parallel. Returns when every device's
    /// refresh (and follow-up preset fetch) has completed or been coalesced.
    pub async fn refresh_all(&self) {
        let mut tasks = JoinSet::new();

        for device in self.registry.store().devices() {
            if device.is_refreshing {
                tracing::debug!(device = %device.id, "skipping device already refreshing");
                continue;
            }

            let manager = self.registry.manager_for(&device.id);
            tasks.spawn(async move {
                if manager.refresh().await {
                    manager.fetch_presets().await;
                }
            });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "refresh task failed");
            }
        }
    }

    /// Spawn the periodic refresh loop.
    ///
    /// The first sweep runs immediately; later sweeps follow the configured
    /// interval. Use the returned handle to stop the loop.
    pub fn spawn(self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.config.refresh_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        tracing::debug!("starting refresh sweep");
                        self.refresh_all().await;
                    }
                    _ = shutdown_rx.changed() => {
                        tracing::debug!("refresh scheduler stopping");
                        return;
                    }
                }
            }
        });

        SchedulerHandle { shutdown_tx, task }
    }
}
