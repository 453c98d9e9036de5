//! JSON wire types for the WLED firmware API.
//!
//! Field names here are firmware-defined (`on`, `bri`, `ps`, `seg`, `col`,
//! `rssi`, `n`) and must be preserved bit-for-bit for wire compatibility.
//! Deserialization is lenient: every field is optional and unknown fields
//! are ignored, so a partial or newer firmware document still applies
//! best-effort. Numeric values from the wire are clamped into firmware
//! ranges, never rejected.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Path of the device status document
pub const STATE_PATH: &str = "/json/state";
/// Path of the device info document
pub const INFO_PATH: &str = "/json/info";
/// Path of the preset catalog
pub const PRESETS_PATH: &str = "/presets.json";

// ============================================================================
// Status document (GET /json/state)
// ============================================================================

/// Device status as reported by `GET /json/state`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StateResponse {
    pub on: Option<bool>,
    /// Brightness, 0–255 on the firmware but carried as i64 for headroom
    pub bri: Option<i64>,
    /// Active preset id
    pub ps: Option<i64>,
    /// Some builds report signal strength at the top level
    pub rssi: Option<i64>,
    #[serde(default)]
    pub seg: Vec<Segment>,
    /// The composite `/json` document nests info next to state
    pub info: Option<InfoResponse>,
}

impl StateResponse {
    /// Signal strength, wherever the firmware put it.
    pub fn rssi(&self) -> Option<i64> {
        self.rssi
            .or_else(|| self.info.as_ref()?.wifi.as_ref()?.rssi)
    }

    /// Primary color of the first segment as a packed 24-bit int.
    pub fn primary_color(&self) -> Option<u32> {
        self.seg.first().and_then(|s| col_to_color(&s.col))
    }
}

/// One LED segment; only the color slots are of interest here.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Segment {
    /// Color slots, each an `[r, g, b]` (or longer) channel array
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub col: Vec<Vec<i64>>,
}

// ============================================================================
// State patch (POST /json/state)
// ============================================================================

/// Partial state patch for `POST /json/state`.
///
/// Absent fields are omitted from the wire payload entirely; the firmware
/// treats a present field as an instruction, so serializing defaults would
/// overwrite device state the caller never touched.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct StatePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bri: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ps: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seg: Option<Vec<Segment>>,
}

impl StatePatch {
    /// True when no field is set (an empty patch should never hit the wire)
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set the primary color of the first segment from a packed 24-bit int
    pub fn with_color(mut self, color: u32) -> Self {
        self.seg = Some(vec![Segment {
            col: vec![color_to_channels(color)],
        }]);
        self
    }
}

// ============================================================================
// Info document (GET /json/info)
// ============================================================================

/// Device info as reported by `GET /json/info`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct InfoResponse {
    pub name: Option<String>,
    pub ver: Option<String>,
    pub mac: Option<String>,
    pub wifi: Option<WifiInfo>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct WifiInfo {
    pub rssi: Option<i64>,
}

// ============================================================================
// Preset catalog (GET /presets.json)
// ============================================================================

/// One entry of the preset catalog
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct PresetInfo {
    /// Display name
    pub n: Option<String>,
}

/// The raw preset catalog: preset id (as a string key) to preset info
pub type PresetsDocument = HashMap<String, PresetInfo>;

// ============================================================================
// Numeric helpers
// ============================================================================

/// Clamp a wire brightness into the firmware's 0–255 range
pub fn clamp_brightness(bri: i64) -> u8 {
    bri.clamp(0, 255) as u8
}

/// Clamp a wire preset id into i32 range
pub fn clamp_preset_id(ps: i64) -> i32 {
    ps.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

/// Pack RGB channels into a 24-bit int
pub fn pack_color(r: u8, g: u8, b: u8) -> u32 {
    ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Unpack a 24-bit int into RGB channels
pub fn unpack_color(color: u32) -> (u8, u8, u8) {
    (
        ((color >> 16) & 0xFF) as u8,
        ((color >> 8) & 0xFF) as u8,
        (color & 0xFF) as u8,
    )
}

/// Channel array for the wire (`[r, g, b]`) from a packed color
pub fn color_to_channels(color: u32) -> Vec<i64> {
    let (r, g, b) = unpack_color(color);
    vec![r as i64, g as i64, b as i64]
}

/// Packed color from the first color slot of a segment's `col` array.
///
/// Out-of-range channel values are clamped per the firmware-compat policy.
pub fn col_to_color(col: &[Vec<i64>]) -> Option<u32> {
    let primary = col.first()?;
    if primary.len() < 3 {
        return None;
    }
    let r = primary[0].clamp(0, 255) as u8;
    let g = primary[1].clamp(0, 255) as u8;
    let b = primary[2].clamp(0, 255) as u8;
    Some(pack_color(r, g, b))
}
