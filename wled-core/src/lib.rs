//! Device coordination core for WLED controllers.
//!
//! This crate owns the canonical device state and everything that keeps it
//! fresh:
//!
//! - [`DeviceStore`]: the authoritative device records and preset catalogs,
//!   with change broadcast for UI layers
//! - [`DeviceRequestManager`]: per-device FIFO request queue with refresh
//!   coalescing, one in-flight request per device
//! - [`ManagerRegistry`]: one manager per device, created lazily
//! - [`RefreshScheduler`]: periodic parallel refresh of every device
//! - [`DiscoveryService`]: periodic mDNS sweeps reconciled into the store
//! - [`ReleaseIndex`]: firmware update availability per branch
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wled_core::{
//!     CoreConfig, DeviceStore, DiscoveryService, ManagerRegistry, RefreshScheduler,
//! };
//! use wled_api::{HttpTransport, Transport};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(DeviceStore::new());
//! let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new()?);
//! let registry = Arc::new(ManagerRegistry::new(Arc::clone(&store), transport));
//!
//! let config = CoreConfig::default();
//! let scheduler = RefreshScheduler::new(Arc::clone(&registry), config.clone()).spawn();
//! let discovery = DiscoveryService::new(Arc::clone(&registry), config).spawn();
//!
//! // ... hand the store and registry to the UI layer ...
//!
//! scheduler.shutdown().await;
//! discovery.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod config;
mod discovery_service;
mod error;
pub mod logging;
mod manager;
mod model;
mod registry;
mod releases;
mod request;
mod scheduler;
mod store;

pub use config::CoreConfig;
pub use discovery_service::{DiscoveryHandle, DiscoveryService};
pub use error::{ApplyError, CoreError, Result};
pub use manager::DeviceRequestManager;
pub use model::{Branch, DeviceId, DeviceRecord, Preset, PresetTable, UNDEFINED_PRESET};
pub use registry::ManagerRegistry;
pub use releases::ReleaseIndex;
pub use request::{DeviceRequest, StateChange, DEVICE_INFO_PATH};
pub use scheduler::{RefreshScheduler, SchedulerHandle};
pub use store::{DeviceStore, StoreChange};

pub use wled_api::{HttpTransport, Transport, TransportError};
pub use wled_discovery::DiscoveredDevice;
