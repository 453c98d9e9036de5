//! Device and preset data model.
//!
//! `DeviceRecord` is the canonical record the store owns for each
//! controller. The preset catalog lives in a side-table keyed by device id
//! (see `store`), not on the record, so the user's preset selection can
//! survive catalog refreshes.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel preset selection meaning "no preset selected"
pub const UNDEFINED_PRESET: i32 = -1;

/// Stable, opaque identity of a device record.
///
/// Distinct from the network address (DHCP can move a controller) and from
/// the MAC (a record can be created manually before the MAC is known).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(Uuid);

impl DeviceId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DeviceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Firmware release channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    Stable,
    Beta,
    Unknown,
}

impl Branch {
    pub fn as_str(&self) -> &'static str {
        match self {
            Branch::Stable => "stable",
            Branch::Beta => "beta",
            Branch::Unknown => "unknown",
        }
    }

    /// Parse a stored branch value; anything unrecognized is `Unknown`
    pub fn parse(value: &str) -> Self {
        match value {
            "stable" => Branch::Stable,
            "beta" => Branch::Beta,
            _ => Branch::Unknown,
        }
    }
}

impl Default for Branch {
    fn default() -> Self {
        Branch::Unknown
    }
}

/// Canonical record for one WLED controller.
///
/// Owned exclusively by the `DeviceStore`; mutated only through request
/// apply, discovery upsert, or the store's user-field setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,
    /// Network address as "host:port"
    pub address: String,
    /// MAC address, lowercased; stable identity used by discovery upsert
    pub mac: Option<String>,
    pub name: String,
    /// Hidden records stay in the store but are filtered from visible lists
    pub is_hidden: bool,
    pub is_online: bool,
    /// Signal strength in dBm, 0 until first refresh
    pub rssi: i32,
    /// Brightness 0–255
    pub brightness: u8,
    pub is_powered_on: bool,
    /// Primary color as a packed 24-bit int
    pub color: u32,
    /// Preset the firmware reports as active
    pub preset_id: i32,
    pub branch: Branch,
    /// Installed firmware version, when known
    pub version: Option<String>,
    /// Latest release tag available for this device's branch, if newer
    pub latest_update_tag: Option<String>,
    /// Release tag the user chose to skip
    pub skip_update_tag: Option<String>,
    /// True from refresh enqueue until the device's queue fully drains
    pub is_refreshing: bool,
}

impl DeviceRecord {
    /// Create a record for a manually added device
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: DeviceId::new(),
            address: address.into(),
            mac: None,
            name: name.into(),
            is_hidden: false,
            is_online: false,
            rssi: 0,
            brightness: 0,
            is_powered_on: false,
            color: 0,
            preset_id: UNDEFINED_PRESET,
            branch: Branch::Unknown,
            version: None,
            latest_update_tag: None,
            skip_update_tag: None,
            is_refreshing: false,
        }
    }

    /// Name for display; newly discovered devices may not have one yet
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "(New Device)"
        } else {
            &self.name
        }
    }

    /// True when a newer release tag is recorded for this device
    pub fn update_available(&self) -> bool {
        self.latest_update_tag
            .as_deref()
            .map_or(false, |tag| !tag.is_empty())
    }
}

/// One preset from a device's catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    pub id: i32,
    pub name: String,
}

/// Per-device preset catalog plus the user's current selection.
///
/// The catalog is replaced wholesale on each successful presets fetch; the
/// selection persists across replacements unless the selected id vanished.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PresetTable {
    pub presets: Vec<Preset>,
    pub selected: i32,
}

impl PresetTable {
    pub fn new(presets: Vec<Preset>) -> Self {
        Self {
            presets,
            selected: UNDEFINED_PRESET,
        }
    }

    pub fn contains(&self, id: i32) -> bool {
        self.presets.iter().any(|p| p.id == id)
    }
}
