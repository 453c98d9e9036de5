use thiserror::Error;

use wled_api::TransportError;

use crate::model::DeviceId;

/// Errors from applying a decoded wire response to device state.
///
/// No apply error is fatal: the request is dropped, the device keeps its
/// prior online/offline state, and the rest of the queue still runs.
#[derive(Error, Debug)]
pub enum ApplyError {
    /// Response decoded as JSON but not as the expected document shape
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Device was removed from the store while the request was in flight
    #[error("Device {0} is no longer in the store")]
    DeviceRemoved(DeviceId),
}

/// Errors surfaced by the coordination core's public operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The address answered, but not as a WLED controller
    #[error("No WLED controller answered at {0}")]
    NotWled(String),

    /// The blocking discovery task panicked or was cancelled
    #[error("Discovery task failed: {0}")]
    DiscoveryTask(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
