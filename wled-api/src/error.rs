use thiserror::Error;

/// Errors produced by the HTTP transport layer.
///
/// There is deliberately no retry logic here; retry policy belongs to the
/// caller (the per-device request manager and the refresh scheduler).
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP client could not be constructed
    #[error("Failed to initialize HTTP client: {0}")]
    ClientInit(String),

    /// Device could not be reached (connection refused, DNS failure, timeout)
    #[error("Device unreachable: {0}")]
    Unreachable(String),

    /// Device answered, but not with a usable response (non-2xx, bad JSON)
    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;
