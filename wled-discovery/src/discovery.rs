//! Core discovery logic and iterator implementation.
//!
//! The discovery algorithm:
//! 1. Sends an mDNS PTR query for `_wled._tcp.local`
//! 2. Collects and deduplicates mDNS responses
//! 3. Probes each candidate's `/json/info` over HTTP
//! 4. Yields validated controllers as events

use std::collections::HashSet;
use std::time::Duration;

use crate::error::Result;
use crate::mdns::{MdnsClient, MdnsResponse, WLED_SERVICE};
use crate::probe::probe_controller;
use crate::DeviceEvent;

/// Iterator that discovers WLED controllers on the local network.
///
/// Yields `DeviceEvent::Found` for each controller that answers the mDNS
/// query and passes HTTP validation. Duplicate responders and non-WLED
/// devices are filtered out automatically.
///
/// # Examples
///
/// ```no_run
/// use wled_discovery::{get_iter, DeviceEvent};
///
/// for event in get_iter() {
///     match event {
///         DeviceEvent::Found(device) => {
///             println!("Found: {} at {}", device.name, device.address);
///         }
///     }
/// }
/// ```
pub struct DiscoveryIterator {
    mdns_client: Option<MdnsClient>,
    response_buffer: Vec<MdnsResponse>,
    buffer_index: usize,
    seen_addresses: HashSet<String>,
    http_client: reqwest::blocking::Client,
    finished: bool,
}

impl DiscoveryIterator {
    /// Create a new discovery iterator with the specified timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let mdns_client = MdnsClient::new(timeout)?;
        let http_client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                crate::error::DiscoveryError::NetworkError(format!(
                    "Failed to create HTTP client: {}",
                    e
                ))
            })?;

        Ok(Self {
            mdns_client: Some(mdns_client),
            response_buffer: Vec::new(),
            buffer_index: 0,
            seen_addresses: HashSet::new(),
            http_client,
            finished: false,
        })
    }

    /// Create an empty iterator that yields no results.
    /// Used as a fallback when initialization fails.
    pub(crate) fn empty() -> Self {
        let http_client = reqwest::blocking::Client::new();
        Self {
            mdns_client: None,
            response_buffer: Vec::new(),
            buffer_index: 0,
            seen_addresses: HashSet::new(),
            http_client,
            finished: true,
        }
    }

    /// Run the mDNS query and buffer every response until the socket times out
    fn fill_buffer(&mut self) {
        if let Some(client) = self.mdns_client.take() {
            match client.query(WLED_SERVICE) {
                Ok(iter) => {
                    for result in iter {
                        if let Ok(response) = result {
                            self.response_buffer.push(response);
                        }
                    }
                }
                Err(_) => {
                    // Query failed to send; nothing to buffer
                }
            }
            self.finished = true;
        }
    }
}

impl Iterator for DiscoveryIterator {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.mdns_client.is_some() {
            self.fill_buffer();
        }

        loop {
            if self.buffer_index >= self.response_buffer.len() {
                return None;
            }

            let response = &self.response_buffer[self.buffer_index];
            self.buffer_index += 1;

            let address = response.address();

            // Deduplicate by address
            if self.seen_addresses.contains(&address) {
                continue;
            }
            self.seen_addresses.insert(address.clone());

            // Validate over HTTP; skip candidates that fail or aren't WLED
            let device = match probe_controller(&self.http_client, &address) {
                Ok(device) => device,
                Err(_) => continue,
            };

            return Some(DeviceEvent::Found(device));
        }
    }
}

impl Drop for DiscoveryIterator {
    fn drop(&mut self) {
        // Drop the mDNS client explicitly so the UDP socket is released
        // even when the iterator is abandoned early
        if let Some(client) = self.mdns_client.take() {
            drop(client);
        }
    }
}
