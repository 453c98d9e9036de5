//! Controller probing and validation.
//!
//! mDNS tells us where a candidate lives; this module asks the candidate's
//! HTTP API who it is. A device only becomes a discovery result once its
//! `/json/info` document confirms it is running WLED and carries a MAC
//! address we can key it by.

use serde::Deserialize;

use crate::error::{DiscoveryError, Result};
use crate::DiscoveredDevice;

/// Subset of the firmware's `/json/info` document used for validation.
#[derive(Debug, Deserialize)]
pub struct ControllerInfo {
    pub name: Option<String>,
    pub ver: Option<String>,
    pub mac: Option<String>,
    pub brand: Option<String>,
}

impl ControllerInfo {
    /// Parse controller info from a `/json/info` body.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::ParseError` if the body is not the expected
    /// JSON shape.
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|e| DiscoveryError::ParseError(format!("Failed to parse /json/info: {}", e)))
    }

    /// Check whether this responder is a WLED controller.
    ///
    /// The firmware reports `brand: "WLED"`; older builds may omit it, in
    /// which case a version string plus MAC is accepted.
    pub fn is_wled(&self) -> bool {
        if let Some(ref brand) = self.brand {
            return brand.eq_ignore_ascii_case("wled");
        }
        self.ver.is_some() && self.mac.is_some()
    }

    /// Convert to the public `DiscoveredDevice` type.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::NotWled` when the info document has no MAC,
    /// since the MAC is the stable identity discovery results are keyed by.
    pub fn to_discovered(&self, address: String) -> Result<DiscoveredDevice> {
        let mac = self
            .mac
            .as_ref()
            .filter(|m| !m.is_empty())
            .ok_or_else(|| DiscoveryError::NotWled(format!("no MAC reported by {}", address)))?;

        Ok(DiscoveredDevice {
            mac: mac.to_lowercase(),
            name: self.name.clone().unwrap_or_else(|| "WLED".to_string()),
            address,
            version: self.ver.clone(),
        })
    }
}

/// Fetch and validate `/json/info` from a candidate address ("host:port").
pub(crate) fn probe_controller(
    client: &reqwest::blocking::Client,
    address: &str,
) -> Result<DiscoveredDevice> {
    let url = format!("http://{}/json/info", address);

    let response = client
        .get(&url)
        .send()
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to fetch {}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(DiscoveryError::NetworkError(format!(
            "{} returned HTTP {}",
            url,
            response.status()
        )));
    }

    let body = response
        .text()
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to read response body: {}", e)))?;

    let info = ControllerInfo::from_json(&body)?;

    if !info.is_wled() {
        return Err(DiscoveryError::NotWled(address.to_string()));
    }

    info.to_discovered(address.to_string())
}
