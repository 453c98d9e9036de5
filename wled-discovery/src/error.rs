//! Error types for the discovery system.

use std::fmt;

/// Error type for discovery operations.
///
/// Represents the failure modes that can occur while probing the local
/// network for WLED controllers: socket issues, malformed mDNS packets,
/// timeouts, and candidates that turn out not to be WLED devices.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Network-related errors (socket creation, HTTP requests, etc.)
    NetworkError(String),
    /// Parsing errors (DNS message, /json/info body, etc.)
    ParseError(String),
    /// Operation timed out waiting for responses
    Timeout,
    /// Responder is not a WLED controller
    NotWled(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DiscoveryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DiscoveryError::Timeout => write!(f, "Operation timed out"),
            DiscoveryError::NotWled(msg) => write!(f, "Not a WLED controller: {}", msg),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
