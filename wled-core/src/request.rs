//! Request variants: how each operation builds its wire request and applies
//! the wire response back onto device state.
//!
//! Building a spec is a pure function of the current record. Applying a
//! response is the only code path (besides discovery upsert) allowed to
//! touch operational device state, and it always runs under the store's
//! per-device entry guard.

use serde_json::Value;

use wled_api::wire::{
    self, PresetsDocument, StatePatch, StateResponse, INFO_PATH, PRESETS_PATH, STATE_PATH,
};
use wled_api::RequestSpec;

use crate::error::ApplyError;
use crate::model::{Branch, DeviceId, DeviceRecord, Preset};
use crate::store::DeviceStore;

/// Partial state change requested by the user.
///
/// Only explicitly set fields reach the wire; everything else is omitted so
/// the firmware leaves it untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateChange {
    pub on: Option<bool>,
    pub brightness: Option<u8>,
    pub preset_id: Option<i32>,
    pub color: Option<u32>,
}

impl StateChange {
    pub fn power(on: bool) -> Self {
        Self {
            on: Some(on),
            ..Default::default()
        }
    }

    pub fn brightness(brightness: u8) -> Self {
        Self {
            brightness: Some(brightness),
            ..Default::default()
        }
    }

    pub fn preset(preset_id: i32) -> Self {
        Self {
            preset_id: Some(preset_id),
            ..Default::default()
        }
    }

    pub fn color(color: u32) -> Self {
        Self {
            color: Some(color),
            ..Default::default()
        }
    }

    /// Wire payload with only the set fields present
    fn to_patch(&self) -> StatePatch {
        let mut patch = StatePatch {
            on: self.on,
            bri: self.brightness.map(i64::from),
            ps: self.preset_id.map(i64::from),
            seg: None,
        };
        if let Some(color) = self.color {
            patch = patch.with_color(color);
        }
        patch
    }

    /// Optimistic local application; also used to reconcile after a
    /// successful round trip
    pub(crate) fn apply_to(&self, device: &mut DeviceRecord) {
        if let Some(on) = self.on {
            device.is_powered_on = on;
        }
        if let Some(brightness) = self.brightness {
            device.brightness = brightness;
        }
        if let Some(preset_id) = self.preset_id {
            device.preset_id = preset_id;
        }
        if let Some(color) = self.color {
            device.color = color & 0x00FF_FFFF;
        }
    }
}

/// One operation against a device, executed by its request manager
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceRequest {
    /// Fetch current status and overwrite local cached fields
    Refresh,
    /// Push a partial state patch
    ChangeState(StateChange),
    /// Fetch the preset catalog and replace the side-table entry
    FetchPresets,
}

impl DeviceRequest {
    /// Refresh requests coalesce; everything else queues
    pub fn is_refresh(&self) -> bool {
        matches!(self, DeviceRequest::Refresh)
    }

    /// Build the wire request for this operation from current device state
    pub fn build_spec(&self, _device: &DeviceRecord) -> RequestSpec {
        match self {
            DeviceRequest::Refresh => RequestSpec::get(STATE_PATH),
            DeviceRequest::ChangeState(change) => {
                let body = serde_json::to_value(change.to_patch()).unwrap_or(Value::Null);
                RequestSpec::post(STATE_PATH, body)
            }
            DeviceRequest::FetchPresets => RequestSpec::get(PRESETS_PATH),
        }
    }

    /// Apply a successful wire response to the device's state.
    ///
    /// # Errors
    ///
    /// `ApplyError::Decode` when the body is not the expected document (no
    /// state is changed), `ApplyError::DeviceRemoved` when the device left
    /// the store mid-flight.
    pub fn apply_response(
        &self,
        store: &DeviceStore,
        id: &DeviceId,
        body: Value,
    ) -> Result<(), ApplyError> {
        match self {
            DeviceRequest::Refresh => {
                let state: StateResponse = serde_json::from_value(body)?;
                store
                    .with_device_mut(id, |device| apply_refresh(device, &state))
                    .ok_or_else(|| ApplyError::DeviceRemoved(id.clone()))
            }
            DeviceRequest::ChangeState(change) => {
                // The firmware acks with {"success":true} (or echoes state);
                // either way the round trip succeeded, so the optimistic
                // update stands and the device is demonstrably online.
                store
                    .with_device_mut(id, |device| {
                        change.apply_to(device);
                        device.is_online = true;
                    })
                    .ok_or_else(|| ApplyError::DeviceRemoved(id.clone()))?;
                if let Some(preset_id) = change.preset_id {
                    store.select_preset(id, preset_id);
                }
                Ok(())
            }
            DeviceRequest::FetchPresets => {
                let document: PresetsDocument = serde_json::from_value(body)?;
                if store.get(id).is_none() {
                    return Err(ApplyError::DeviceRemoved(id.clone()));
                }
                store.replace_presets(id, catalog_from_document(document));
                Ok(())
            }
        }
    }
}

/// Overwrite cached status fields from a refresh response.
///
/// A device that answered is online by definition; offline marking happens
/// in the manager on transport failure, never here.
fn apply_refresh(device: &mut DeviceRecord, state: &StateResponse) {
    device.is_online = true;

    if let Some(on) = state.on {
        device.is_powered_on = on;
    }
    if let Some(bri) = state.bri {
        device.brightness = wire::clamp_brightness(bri);
    }
    if let Some(ps) = state.ps {
        device.preset_id = wire::clamp_preset_id(ps);
    }
    if let Some(rssi) = state.rssi() {
        device.rssi = rssi.clamp(i32::MIN as i64, i32::MAX as i64) as i32;
    }
    if let Some(color) = state.primary_color() {
        device.color = color;
    }
    if let Some(info) = &state.info {
        if let Some(ver) = &info.ver {
            device.version = Some(ver.clone());
            device.branch = branch_from_version(ver);
        }
        if device.mac.is_none() {
            device.mac = info.mac.as_ref().map(|m| m.to_lowercase());
        }
    }
}

/// WLED beta builds carry a "-b" pre-release marker in the version string
fn branch_from_version(version: &str) -> Branch {
    if version.contains("-b") {
        Branch::Beta
    } else {
        Branch::Stable
    }
}

/// Convert the raw catalog document into sorted presets.
///
/// Non-numeric ids are skipped, id 0 is the firmware's "no preset" slot,
/// and unnamed presets get a placeholder label.
fn catalog_from_document(document: PresetsDocument) -> Vec<Preset> {
    let mut presets: Vec<Preset> = document
        .into_iter()
        .filter_map(|(key, info)| {
            let id: i32 = key.parse().ok()?;
            if id == 0 {
                return None;
            }
            let name = match info.n {
                Some(n) if !n.is_empty() => n,
                _ => format!("Preset {}", id),
            };
            Some(Preset { id, name })
        })
        .collect();
    presets.sort_by_key(|p| p.id);
    presets
}

/// Path used for standalone info fetches (exposed for hosts that want to
/// validate a manually entered address the way discovery does)
pub const DEVICE_INFO_PATH: &str = INFO_PATH;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UNDEFINED_PRESET;
    use serde_json::json;
    use wled_api::Method;

    fn store_with_device() -> (DeviceStore, DeviceId) {
        let store = DeviceStore::new();
        let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));
        (store, id)
    }

    #[test]
    fn test_refresh_builds_get_state() {
        let device = DeviceRecord::new("10.0.0.5:80", "Desk");
        let spec = DeviceRequest::Refresh.build_spec(&device);
        assert_eq!(spec.method, Method::Get);
        assert_eq!(spec.path, "/json/state");
        assert!(spec.body.is_none());
    }

    #[test]
    fn test_change_state_serializes_only_set_fields() {
        let device = DeviceRecord::new("10.0.0.5:80", "Desk");
        let spec = DeviceRequest::ChangeState(StateChange::brightness(10)).build_spec(&device);

        assert_eq!(spec.method, Method::Post);
        assert_eq!(spec.body, Some(json!({"bri": 10})));
    }

    #[test]
    fn test_change_state_color_payload() {
        let device = DeviceRecord::new("10.0.0.5:80", "Desk");
        let change = StateChange {
            on: Some(true),
            color: Some(0xFF0020),
            ..Default::default()
        };
        let spec = DeviceRequest::ChangeState(change).build_spec(&device);

        assert_eq!(
            spec.body,
            Some(json!({"on": true, "seg": [{"col": [[255, 0, 32]]}]}))
        );
    }

    #[test]
    fn test_fetch_presets_builds_get() {
        let device = DeviceRecord::new("10.0.0.5:80", "Desk");
        let spec = DeviceRequest::FetchPresets.build_spec(&device);
        assert_eq!(spec.path, "/presets.json");
    }

    #[test]
    fn test_apply_refresh_sets_fields_and_online() {
        let (store, id) = store_with_device();

        DeviceRequest::Refresh
            .apply_response(
                &store,
                &id,
                json!({"on": false, "bri": 0, "rssi": -65, "ps": 2}),
            )
            .unwrap();

        let device = store.get(&id).unwrap();
        assert!(device.is_online);
        assert!(!device.is_powered_on);
        assert_eq!(device.brightness, 0);
        assert_eq!(device.rssi, -65);
        assert_eq!(device.preset_id, 2);
    }

    #[test]
    fn test_apply_refresh_clamps_out_of_range() {
        let (store, id) = store_with_device();

        DeviceRequest::Refresh
            .apply_response(&store, &id, json!({"bri": 9000, "ps": 40000000000i64}))
            .unwrap();

        let device = store.get(&id).unwrap();
        assert_eq!(device.brightness, 255);
        assert_eq!(device.preset_id, i32::MAX);
    }

    #[test]
    fn test_apply_refresh_captures_version_and_branch() {
        let (store, id) = store_with_device();

        DeviceRequest::Refresh
            .apply_response(
                &store,
                &id,
                json!({"on": true, "info": {"ver": "0.15.0-b2", "mac": "A1B2C3"}}),
            )
            .unwrap();

        let device = store.get(&id).unwrap();
        assert_eq!(device.version.as_deref(), Some("0.15.0-b2"));
        assert_eq!(device.branch, Branch::Beta);
        assert_eq!(device.mac.as_deref(), Some("a1b2c3"));
    }

    #[test]
    fn test_apply_refresh_decode_error_changes_nothing() {
        let (store, id) = store_with_device();
        let before = store.get(&id).unwrap();

        let result = DeviceRequest::Refresh.apply_response(&store, &id, json!("not an object"));

        assert!(matches!(result, Err(ApplyError::Decode(_))));
        assert_eq!(store.get(&id).unwrap(), before);
    }

    #[test]
    fn test_apply_refresh_ignores_unknown_fields() {
        let (store, id) = store_with_device();

        DeviceRequest::Refresh
            .apply_response(&store, &id, json!({"on": true, "nl": {"on": false}, "lor": 0}))
            .unwrap();

        assert!(store.get(&id).unwrap().is_powered_on);
    }

    #[test]
    fn test_apply_change_state_reconciles_and_selects_preset() {
        let (store, id) = store_with_device();

        DeviceRequest::ChangeState(StateChange::preset(5))
            .apply_response(&store, &id, json!({"success": true}))
            .unwrap();

        let device = store.get(&id).unwrap();
        assert!(device.is_online);
        assert_eq!(device.preset_id, 5);
        assert_eq!(store.selected_preset(&id), 5);
    }

    #[test]
    fn test_apply_presets_replaces_catalog() {
        let (store, id) = store_with_device();

        DeviceRequest::FetchPresets
            .apply_response(
                &store,
                &id,
                json!({"0": {}, "1": {"n": "Sunset"}, "5": {"n": ""}, "x": {"n": "bad id"}}),
            )
            .unwrap();

        let table = store.presets(&id).unwrap();
        assert_eq!(table.presets.len(), 2);
        assert_eq!(table.presets[0], Preset { id: 1, name: "Sunset".to_string() });
        assert_eq!(table.presets[1], Preset { id: 5, name: "Preset 5".to_string() });
        assert_eq!(table.selected, UNDEFINED_PRESET);
    }

    #[test]
    fn test_apply_to_removed_device() {
        let (store, id) = store_with_device();
        store.remove(&id);

        let result = DeviceRequest::Refresh.apply_response(&store, &id, json!({"on": true}));
        assert!(matches!(result, Err(ApplyError::DeviceRemoved(_))));
    }

    #[test]
    fn test_state_change_apply_to_masks_color() {
        let mut device = DeviceRecord::new("10.0.0.5:80", "Desk");
        StateChange::color(0xFF123456).apply_to(&mut device);
        assert_eq!(device.color, 0x123456);
    }
}
