//! Configuration for the coordination core.

use std::time::Duration;

/// Tunables for transport, scheduling and discovery.
///
/// The defaults match the behavior of the reference app: 5-second device
/// requests, a 30-second bulk refresh while the device list is visible, and
/// a discovery sweep every minute with a 3-second mDNS listening window.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Per-request HTTP timeout
    pub http_timeout: Duration,
    /// Interval between scheduled bulk refreshes
    pub refresh_interval: Duration,
    /// Interval between discovery sweeps
    pub discovery_interval: Duration,
    /// How long a single discovery sweep listens for mDNS responses
    pub discovery_window: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            http_timeout: wled_api::REQUEST_TIMEOUT,
            refresh_interval: Duration::from_secs(30),
            discovery_interval: Duration::from_secs(60),
            discovery_window: Duration::from_secs(3),
        }
    }
}

impl CoreConfig {
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_discovery_interval(mut self, interval: Duration) -> Self {
        self.discovery_interval = interval;
        self
    }

    pub fn with_discovery_window(mut self, window: Duration) -> Self {
        self.discovery_window = window;
        self
    }
}
