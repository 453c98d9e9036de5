//! Firmware release tracking.
//!
//! Hosts feed the index the newest known release tag per branch (typically
//! from a GitHub releases fetch they perform themselves); the index decides
//! per device whether an update is available, honoring the user's skip tag,
//! and can stamp the result onto the store.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::model::{Branch, DeviceRecord};
use crate::store::DeviceStore;

/// Latest known release tag per firmware branch
pub struct ReleaseIndex {
    latest: RwLock<HashMap<Branch, String>>,
}

impl ReleaseIndex {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(HashMap::new()),
        }
    }

    /// Record the newest release tag for a branch
    pub fn set_latest(&self, branch: Branch, tag: impl Into<String>) {
        self.latest.write().insert(branch, tag.into());
    }

    /// Newest known tag for a branch
    pub fn latest_for(&self, branch: Branch) -> Option<String> {
        self.latest.read().get(&branch).cloned()
    }

    /// Tag of the update available for this device, if any.
    ///
    /// `None` when the device's branch or installed version is unknown, when
    /// it is already on the newest release, or when the user skipped the
    /// newest tag.
    pub fn update_available_for(&self, device: &DeviceRecord) -> Option<String> {
        let installed = device.version.as_deref()?;
        let latest = self.latest_for(device.branch)?;

        if versions_match(installed, &latest) {
            return None;
        }
        if let Some(skipped) = device.skip_update_tag.as_deref() {
            if versions_match(skipped, &latest) {
                return None;
            }
        }
        Some(latest)
    }

    /// Recompute `latest_update_tag` for every device in the store
    pub fn apply_to(&self, store: &DeviceStore) {
        for device in store.devices() {
            let tag = self.update_available_for(&device);
            if tag != device.latest_update_tag {
                store.with_device_mut(&device.id, |record| record.latest_update_tag = tag);
            }
        }
    }
}

impl Default for ReleaseIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Release tags carry a leading "v" that firmware version strings omit
fn normalize_version(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}

fn versions_match(a: &str, b: &str) -> bool {
    normalize_version(a) == normalize_version(b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceRecord;

    fn device_on(version: &str, branch: Branch) -> DeviceRecord {
        let mut device = DeviceRecord::new("10.0.0.5:80", "Desk");
        device.version = Some(version.to_string());
        device.branch = branch;
        device
    }

    #[test]
    fn test_update_available_when_behind() {
        let index = ReleaseIndex::new();
        index.set_latest(Branch::Stable, "v0.15.0");

        let device = device_on("0.14.4", Branch::Stable);
        assert_eq!(index.update_available_for(&device), Some("v0.15.0".to_string()));
    }

    #[test]
    fn test_no_update_when_current() {
        let index = ReleaseIndex::new();
        index.set_latest(Branch::Stable, "v0.15.0");

        let device = device_on("0.15.0", Branch::Stable);
        assert_eq!(index.update_available_for(&device), None);
    }

    #[test]
    fn test_skip_tag_suppresses_update() {
        let index = ReleaseIndex::new();
        index.set_latest(Branch::Stable, "v0.15.0");

        let mut device = device_on("0.14.4", Branch::Stable);
        device.skip_update_tag = Some("v0.15.0".to_string());
        assert_eq!(index.update_available_for(&device), None);

        // A newer release supersedes the skip
        index.set_latest(Branch::Stable, "v0.15.1");
        assert_eq!(index.update_available_for(&device), Some("v0.15.1".to_string()));
    }

    #[test]
    fn test_branches_tracked_independently() {
        let index = ReleaseIndex::new();
        index.set_latest(Branch::Stable, "v0.15.0");
        index.set_latest(Branch::Beta, "v0.16.0-b1");

        let beta = device_on("0.15.0-b2", Branch::Beta);
        assert_eq!(index.update_available_for(&beta), Some("v0.16.0-b1".to_string()));

        let unknown = device_on("0.14.4", Branch::Unknown);
        assert_eq!(index.update_available_for(&unknown), None);
    }

    #[test]
    fn test_unknown_version_gets_no_update() {
        let index = ReleaseIndex::new();
        index.set_latest(Branch::Stable, "v0.15.0");

        let device = DeviceRecord::new("10.0.0.5:80", "Desk");
        assert_eq!(index.update_available_for(&device), None);
    }

    #[test]
    fn test_apply_to_stamps_store() {
        let index = ReleaseIndex::new();
        index.set_latest(Branch::Stable, "v0.15.0");

        let store = DeviceStore::new();
        let behind = store.insert(device_on("0.14.4", Branch::Stable));
        let current = store.insert(device_on("0.15.0", Branch::Stable));

        index.apply_to(&store);

        assert_eq!(
            store.get(&behind).unwrap().latest_update_tag,
            Some("v0.15.0".to_string())
        );
        assert_eq!(store.get(&current).unwrap().latest_update_tag, None);
        assert!(store.get(&behind).unwrap().update_available());
    }
}
