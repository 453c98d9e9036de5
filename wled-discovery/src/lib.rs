//! WLED controller discovery library
//!
//! This crate provides a simple API for discovering WLED LED controllers on
//! a local network using mDNS service queries and HTTP validation.
//!
//! # Quick Start
//!
//! ```no_run
//! use wled_discovery::get;
//!
//! // Discover all WLED controllers on the network
//! let devices = get();
//! for device in devices {
//!     println!("Found {} at {}", device.name, device.address);
//! }
//! ```
//!
//! # Iterator-based Discovery
//!
//! For more control, use the iterator API:
//!
//! ```no_run
//! use wled_discovery::{get_iter, DeviceEvent};
//!
//! for event in get_iter() {
//!     match event {
//!         DeviceEvent::Found(device) => {
//!             println!("Found: {}", device.name);
//!             // Can break early if needed
//!         }
//!     }
//! }
//! ```

mod discovery;
mod error;
mod mdns;
pub mod probe;

pub use discovery::DiscoveryIterator;
pub use error::{DiscoveryError, Result};

use std::time::Duration;

/// Information about a discovered WLED controller.
///
/// Carries the stable identity (MAC) and the current network location of a
/// controller. Addresses are not stable across DHCP leases; the MAC is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// MAC address reported by the firmware, lowercased (stable identity)
    pub mac: String,
    /// Advertised name (e.g. "Bedroom Shelf")
    pub name: String,
    /// Network address as "host:port"
    pub address: String,
    /// Installed firmware version, when reported
    pub version: Option<String>,
}

/// Events emitted during device discovery.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A WLED controller was found on the network
    Found(DiscoveredDevice),
}

/// Discover all WLED controllers on the local network with a default
/// 3-second timeout.
///
/// Convenience function that collects all discovered controllers into a Vec.
/// For more control over the discovery process, use `get_iter()` instead.
pub fn get() -> Vec<DiscoveredDevice> {
    get_with_timeout(Duration::from_secs(3))
}

/// Discover all WLED controllers on the local network with a custom timeout.
///
/// The timeout bounds both the mDNS listening window and each HTTP probe.
pub fn get_with_timeout(timeout: Duration) -> Vec<DiscoveredDevice> {
    get_iter_with_timeout(timeout)
        .map(|event| match event {
            DeviceEvent::Found(device) => device,
        })
        .collect()
}

/// Get an iterator for discovering WLED controllers with a default
/// 3-second timeout.
pub fn get_iter() -> DiscoveryIterator {
    get_iter_with_timeout(Duration::from_secs(3))
}

/// Get an iterator for discovering WLED controllers with a custom timeout.
///
/// Yields `DeviceEvent::Found` per validated controller, which allows
/// streaming processing and early termination.
pub fn get_iter_with_timeout(timeout: Duration) -> DiscoveryIterator {
    DiscoveryIterator::new(timeout).unwrap_or_else(|_| {
        // If the socket can't be created, yield nothing rather than panic
        DiscoveryIterator::empty()
    })
}
