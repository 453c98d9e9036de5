//! Registry mapping device ids to their request managers.
//!
//! Managers are created lazily on first use and shared by `Arc`, so the
//! scheduler, discovery service and host UI all funnel a device's requests
//! through the same queue.

use std::sync::Arc;

use dashmap::DashMap;

use wled_api::wire::InfoResponse;
use wled_api::{RequestSpec, Transport};
use wled_discovery::DiscoveredDevice;

use crate::error::{ApplyError, CoreError, Result};
use crate::model::{DeviceId, DeviceRecord};
use crate::request::DEVICE_INFO_PATH;
use crate::store::DeviceStore;

/// Owns one `DeviceRequestManager` per known device
pub struct ManagerRegistry {
    store: Arc<DeviceStore>,
    transport: Arc<dyn Transport>,
    managers: DashMap<DeviceId, Arc<crate::manager::DeviceRequestManager>>,
}

impl ManagerRegistry {
    pub fn new(store: Arc<DeviceStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            managers: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<DeviceStore> {
        &self.store
    }

    /// Get or create the manager for a device.
    ///
    /// Two concurrent calls for the same id converge on one manager; the
    /// entry API makes the create-if-absent atomic.
    pub fn manager_for(&self, id: &DeviceId) -> Arc<crate::manager::DeviceRequestManager> {
        self.managers
            .entry(id.clone())
            .or_insert_with(|| {
                Arc::new(crate::manager::DeviceRequestManager::new(
                    id.clone(),
                    Arc::clone(&self.store),
                    Arc::clone(&self.transport),
                ))
            })
            .clone()
    }

    /// Drop the cached manager for a device, if any.
    ///
    /// In-flight work keeps its own `Arc` and finishes; its requests then
    /// no-op against the store once the record is gone.
    pub fn evict(&self, id: &DeviceId) {
        self.managers.remove(id);
    }

    /// Remove a device from the store and evict its manager
    pub fn remove_device(&self, id: &DeviceId) -> Option<DeviceRecord> {
        self.evict(id);
        self.store.remove(id)
    }

    /// Validate a manually entered address and add the device.
    ///
    /// Fetches `/json/info` the way discovery validation does and keys the
    /// record by the reported MAC, so adding a controller that discovery
    /// already knows converges on its existing record. Manual adds are
    /// visible regardless of how the record was first created.
    ///
    /// # Errors
    ///
    /// `CoreError::Transport` when the address does not answer,
    /// `CoreError::NotWled` when the responder reports no MAC,
    /// `CoreError::Apply` when the info document does not decode.
    pub async fn add_device_by_address(&self, address: &str) -> Result<DeviceId> {
        let body = self
            .transport
            .execute(address, &RequestSpec::get(DEVICE_INFO_PATH))
            .await?;
        let info: InfoResponse = serde_json::from_value(body).map_err(ApplyError::Decode)?;

        let mac = info
            .mac
            .as_ref()
            .filter(|m| !m.is_empty())
            .map(|m| m.to_lowercase())
            .ok_or_else(|| CoreError::NotWled(address.to_string()))?;

        let discovered = DiscoveredDevice {
            mac,
            name: info.name.unwrap_or_default(),
            address: address.to_string(),
            version: info.ver,
        };
        let id = self.store.upsert_discovered(&discovered);
        self.store.set_hidden(&id, false);
        Ok(id)
    }

    /// Number of live managers
    pub fn len(&self) -> usize {
        self.managers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.managers.is_empty()
    }
}
