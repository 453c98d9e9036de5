//! Authoritative device store with change notification.
//!
//! The `DeviceStore` owns the canonical `DeviceRecord` for every known
//! controller plus the preset side-table. It is explicitly constructed and
//! passed by `Arc` to the scheduler and discovery service; there is no
//! global instance.
//!
//! Locking is per-device: both tables are dashmaps, so mutating one record
//! holds that entry exclusively without stalling work on other devices.
//! All operational-state mutation funnels through the request apply path
//! (`with_device_mut`) or the discovery upsert; the UI-facing surface is
//! limited to user-owned fields (name, hidden, skip tag) and reads.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

use wled_discovery::DiscoveredDevice;

use crate::model::{DeviceId, DeviceRecord, Preset, PresetTable, UNDEFINED_PRESET};

/// A change in the store, broadcast to subscribers.
///
/// This is the explicit publish/subscribe surface UI layers observe instead
/// of binding to store internals.
#[derive(Debug, Clone)]
pub enum StoreChange {
    DeviceAdded { id: DeviceId },
    DeviceUpdated { id: DeviceId },
    DeviceRemoved { id: DeviceId },
    PresetsReplaced { id: DeviceId },
    PresetSelected { id: DeviceId, preset: i32 },
}

/// Authoritative collection of devices and their preset catalogs
pub struct DeviceStore {
    devices: DashMap<DeviceId, DeviceRecord>,
    presets: DashMap<DeviceId, PresetTable>,
    /// MAC → id index so discovery can match devices whose address moved
    mac_index: DashMap<String, DeviceId>,
    changes_tx: broadcast::Sender<StoreChange>,
}

impl DeviceStore {
    /// Create a new empty store
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(256);
        Self {
            devices: DashMap::new(),
            presets: DashMap::new(),
            mac_index: DashMap::new(),
            changes_tx,
        }
    }

    // ========================================================================
    // Reading
    // ========================================================================

    /// Snapshot of one device record
    pub fn get(&self, id: &DeviceId) -> Option<DeviceRecord> {
        self.devices.get(id).map(|r| r.clone())
    }

    /// Snapshot of all device records
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.devices.iter().map(|r| r.clone()).collect()
    }

    /// Snapshot of all non-hidden device records
    pub fn visible_devices(&self) -> Vec<DeviceRecord> {
        self.devices
            .iter()
            .filter(|r| !r.is_hidden)
            .map(|r| r.clone())
            .collect()
    }

    /// Ids of all known devices
    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|r| r.id.clone()).collect()
    }

    /// Look up a device id by MAC address
    pub fn id_for_mac(&self, mac: &str) -> Option<DeviceId> {
        self.mac_index.get(mac).map(|r| r.clone())
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Subscribe to store change events
    pub fn subscribe_changes(&self) -> broadcast::Receiver<StoreChange> {
        self.changes_tx.subscribe()
    }

    // ========================================================================
    // Adding and removing devices
    // ========================================================================

    /// Insert a record (manual add). Returns the device id.
    pub fn insert(&self, record: DeviceRecord) -> DeviceId {
        let id = record.id.clone();
        if let Some(mac) = &record.mac {
            self.mac_index.insert(mac.clone(), id.clone());
        }
        self.devices.insert(id.clone(), record);
        self.notify(StoreChange::DeviceAdded { id: id.clone() });
        id
    }

    /// Upsert a discovery result, keyed by MAC.
    ///
    /// A known MAC refreshes the existing record's address/name/version (the
    /// address may have moved via DHCP). An unknown MAC creates a new record,
    /// hidden by default and online (it just answered a probe). The MAC claim
    /// goes through the index entry guard, so overlapping scans converge on
    /// one record per MAC even when they race.
    pub fn upsert_discovered(&self, discovered: &DiscoveredDevice) -> DeviceId {
        loop {
            let existing = match self.mac_index.entry(discovered.mac.clone()) {
                Entry::Occupied(entry) => entry.get().clone(),
                Entry::Vacant(entry) => {
                    let mut record =
                        DeviceRecord::new(discovered.address.clone(), discovered.name.clone());
                    record.mac = Some(discovered.mac.clone());
                    record.is_hidden = true;
                    record.is_online = true;
                    record.version = discovered.version.clone();
                    let id = record.id.clone();

                    // The record must be in the device table before the
                    // index entry becomes readable; the entry guard holds
                    // the index shard until we return.
                    self.devices.insert(id.clone(), record);
                    entry.insert(id.clone());

                    tracing::info!(mac = %discovered.mac, address = %discovered.address, "discovered new device");
                    self.notify(StoreChange::DeviceAdded { id: id.clone() });
                    return id;
                }
            };

            let updated = self.with_device_mut(&existing, |device| {
                device.address = discovered.address.clone();
                device.name = discovered.name.clone();
                if discovered.version.is_some() {
                    device.version = discovered.version.clone();
                }
            });
            if updated.is_some() {
                tracing::debug!(device = %existing, mac = %discovered.mac, "discovery refreshed known device");
                return existing;
            }
            // Index pointed at a removed record; drop the stale mapping and
            // retry, unless another claim already replaced it
            self.mac_index
                .remove_if(&discovered.mac, |_, id| *id == existing);
        }
    }

    /// Remove a device and its preset catalog. Returns the removed record.
    pub fn remove(&self, id: &DeviceId) -> Option<DeviceRecord> {
        let (_, record) = self.devices.remove(id)?;
        if let Some(mac) = &record.mac {
            self.mac_index.remove(mac);
        }
        self.presets.remove(id);
        self.notify(StoreChange::DeviceRemoved { id: id.clone() });
        Some(record)
    }

    // ========================================================================
    // User-owned fields (the only direct writes the UI may perform)
    // ========================================================================

    pub fn set_name(&self, id: &DeviceId, name: impl Into<String>) -> bool {
        let name = name.into();
        self.with_device_mut(id, |device| device.name = name).is_some()
    }

    pub fn set_hidden(&self, id: &DeviceId, hidden: bool) -> bool {
        self.with_device_mut(id, |device| device.is_hidden = hidden)
            .is_some()
    }

    /// Record that the user wants to skip a specific release tag
    pub fn set_skip_update_tag(&self, id: &DeviceId, tag: Option<String>) -> bool {
        self.with_device_mut(id, |device| device.skip_update_tag = tag)
            .is_some()
    }

    // ========================================================================
    // Operational-state mutation (request apply / discovery only)
    // ========================================================================

    /// Mutate one device record under its exclusive entry guard.
    ///
    /// Returns `None` when the device is gone. Emits `DeviceUpdated`.
    pub(crate) fn with_device_mut<R>(
        &self,
        id: &DeviceId,
        f: impl FnOnce(&mut DeviceRecord) -> R,
    ) -> Option<R> {
        let result = {
            let mut entry = self.devices.get_mut(id)?;
            f(entry.value_mut())
        };
        self.notify(StoreChange::DeviceUpdated { id: id.clone() });
        Some(result)
    }

    /// Atomically claim the refresh slot for a device.
    ///
    /// Check-and-set under the entry's exclusive guard: of two racing
    /// claims, exactly one wins. Returns `false` when a refresh is already
    /// in flight or the device is unknown.
    pub(crate) fn try_begin_refresh(&self, id: &DeviceId) -> bool {
        let claimed = {
            let mut entry = match self.devices.get_mut(id) {
                Some(entry) => entry,
                None => return false,
            };
            if entry.is_refreshing {
                false
            } else {
                entry.is_refreshing = true;
                true
            }
        };
        if claimed {
            self.notify(StoreChange::DeviceUpdated { id: id.clone() });
        }
        claimed
    }

    /// Release the refresh slot once the device's queue has fully drained
    pub(crate) fn end_refresh(&self, id: &DeviceId) {
        let cleared = {
            match self.devices.get_mut(id) {
                Some(mut entry) => {
                    let was = entry.is_refreshing;
                    entry.is_refreshing = false;
                    was
                }
                None => false,
            }
        };
        if cleared {
            self.notify(StoreChange::DeviceUpdated { id: id.clone() });
        }
    }

    /// Mark a device offline after an unreachable transport result
    pub(crate) fn mark_offline(&self, id: &DeviceId) {
        self.with_device_mut(id, |device| device.is_online = false);
    }

    // ========================================================================
    // Preset side-table
    // ========================================================================

    /// Snapshot of a device's preset table
    pub fn presets(&self, id: &DeviceId) -> Option<PresetTable> {
        self.presets.get(id).map(|t| t.clone())
    }

    /// Currently selected preset, `UNDEFINED_PRESET` when nothing is selected
    pub fn selected_preset(&self, id: &DeviceId) -> i32 {
        self.presets
            .get(id)
            .map(|t| t.selected)
            .unwrap_or(UNDEFINED_PRESET)
    }

    /// Record the user's preset selection
    pub fn select_preset(&self, id: &DeviceId, preset: i32) {
        {
            let mut table = self.presets.entry(id.clone()).or_default();
            table.selected = preset;
        }
        self.notify(StoreChange::PresetSelected {
            id: id.clone(),
            preset,
        });
    }

    /// Replace a device's preset catalog wholesale.
    ///
    /// The selection survives the replacement unless the selected id is no
    /// longer in the catalog, in which case it resets to `UNDEFINED_PRESET`.
    pub(crate) fn replace_presets(&self, id: &DeviceId, presets: Vec<Preset>) {
        {
            let mut table = self.presets.entry(id.clone()).or_default();
            table.presets = presets;
            if table.selected != UNDEFINED_PRESET && !table.contains(table.selected) {
                tracing::debug!(device = %id, preset = table.selected, "selected preset vanished from catalog");
                table.selected = UNDEFINED_PRESET;
            }
        }
        self.notify(StoreChange::PresetsReplaced { id: id.clone() });
    }

    fn notify(&self, change: StoreChange) {
        // Nobody listening is fine
        let _ = self.changes_tx.send(change);
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
