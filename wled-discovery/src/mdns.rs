//! Minimal mDNS client for WLED service discovery.
//!
//! This module provides the internal multicast-DNS query functionality used
//! to find WLED controllers advertising `_wled._tcp.local`. It implements
//! only the subset of DNS needed here (PTR/SRV/A records, compressed names)
//! and is not part of the public API.

use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use crate::error::{DiscoveryError, Result};

/// Service type advertised by WLED firmware.
pub(crate) const WLED_SERVICE: &str = "_wled._tcp.local";

const MDNS_GROUP: &str = "224.0.0.251:5353";

const TYPE_A: u16 = 1;
const TYPE_PTR: u16 = 12;
const TYPE_SRV: u16 = 33;
const CLASS_IN: u16 = 1;

/// Parsed mDNS response with the fields discovery cares about.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MdnsResponse {
    /// Address the response packet came from
    pub source_ip: String,
    /// Service instance name (e.g. "wled-bedroom"), if advertised
    pub instance: Option<String>,
    /// HTTP port from the SRV record, defaults to 80
    pub port: u16,
    /// Address from an A record, preferred over `source_ip` when present
    pub addr: Option<Ipv4Addr>,
}

impl MdnsResponse {
    /// Best-known address of the responder as "host:port".
    pub fn address(&self) -> String {
        match self.addr {
            Some(ip) => format!("{}:{}", ip, self.port),
            None => format!("{}:{}", self.source_ip, self.port),
        }
    }
}

/// mDNS client for service discovery
pub(crate) struct MdnsClient {
    socket: UdpSocket,
}

impl MdnsClient {
    /// Create a new mDNS client with the specified timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to bind UDP socket: {}", e)))?;

        socket
            .set_read_timeout(Some(timeout))
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set read timeout: {}", e)))?;

        socket
            .set_multicast_loop_v4(true)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to set multicast loop: {}", e)))?;

        Ok(Self { socket })
    }

    /// Send a PTR query for the given service and return an iterator of responses
    pub fn query(&self, service: &str) -> Result<MdnsResponseIterator> {
        let packet = encode_ptr_query(service);

        self.socket
            .send_to(&packet, MDNS_GROUP)
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to send mDNS query: {}", e)))?;

        Ok(MdnsResponseIterator::new(&self.socket))
    }
}

/// Iterator for mDNS responses; ends when the socket read times out
pub(crate) struct MdnsResponseIterator<'a> {
    socket: &'a UdpSocket,
    buffer: [u8; 4096],
    finished: bool,
}

impl<'a> MdnsResponseIterator<'a> {
    fn new(socket: &'a UdpSocket) -> Self {
        Self {
            socket,
            buffer: [0; 4096],
            finished: false,
        }
    }
}

impl<'a> Iterator for MdnsResponseIterator<'a> {
    type Item = Result<MdnsResponse>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.finished {
                return None;
            }

            match self.socket.recv_from(&mut self.buffer) {
                Ok((size, src)) => {
                    match parse_mdns_response(&self.buffer[..size], src.ip().to_string()) {
                        Some(response) => return Some(Ok(response)),
                        // Not an answer we understand, try the next packet
                        None => continue,
                    }
                }
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut
                    {
                        self.finished = true;
                        return None;
                    } else {
                        return Some(Err(DiscoveryError::NetworkError(format!(
                            "Socket error: {}",
                            e
                        ))));
                    }
                }
            }
        }
    }
}

/// Build a standard-query packet with a single PTR question
fn encode_ptr_query(service: &str) -> Vec<u8> {
    let mut packet = Vec::with_capacity(12 + service.len() + 6);

    // Header: id 0, flags 0 (standard query), one question
    packet.extend_from_slice(&[0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);

    for label in service.split('.').filter(|l| !l.is_empty()) {
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);

    packet.extend_from_slice(&TYPE_PTR.to_be_bytes());
    packet.extend_from_slice(&CLASS_IN.to_be_bytes());

    packet
}

/// Parse an mDNS answer packet into the fields we need.
///
/// Returns `None` for packets without an answer section or with a shape we
/// don't understand. Malformed packets are skipped, never an error.
fn parse_mdns_response(buf: &[u8], source_ip: String) -> Option<MdnsResponse> {
    if buf.len() < 12 {
        return None;
    }

    let qdcount = u16_at(buf, 4)?;
    let ancount = u16_at(buf, 6)?;
    let nscount = u16_at(buf, 8)?;
    let arcount = u16_at(buf, 10)?;

    if ancount == 0 {
        return None;
    }

    let mut pos = 12usize;

    // Skip the question section
    for _ in 0..qdcount {
        let (_, next) = read_name(buf, pos)?;
        pos = next.checked_add(4)?;
    }

    let mut instance: Option<String> = None;
    let mut port: u16 = 80;
    let mut addr: Option<Ipv4Addr> = None;

    for _ in 0..(ancount as u32 + nscount as u32 + arcount as u32) {
        if pos >= buf.len() {
            break;
        }
        let (name, next) = read_name(buf, pos)?;
        pos = next;
        let rtype = u16_at(buf, pos)?;
        let rdlength = u16_at(buf, pos + 8)? as usize;
        let rdata = pos + 10;
        pos = rdata.checked_add(rdlength)?;
        if pos > buf.len() {
            return None;
        }

        match rtype {
            TYPE_PTR => {
                let (target, _) = read_name(buf, rdata)?;
                if instance.is_none() {
                    instance = first_label(&target);
                }
            }
            TYPE_SRV => {
                if rdlength >= 6 {
                    port = u16_at(buf, rdata + 4)?;
                }
                if instance.is_none() {
                    instance = first_label(&name);
                }
            }
            TYPE_A => {
                if rdlength == 4 {
                    addr = Some(Ipv4Addr::new(
                        buf[rdata],
                        buf[rdata + 1],
                        buf[rdata + 2],
                        buf[rdata + 3],
                    ));
                }
            }
            _ => {}
        }
    }

    Some(MdnsResponse {
        source_ip,
        instance,
        port,
        addr,
    })
}

/// Read a possibly-compressed DNS name starting at `pos`.
///
/// Returns the dotted name and the position immediately after the name in
/// the original record (pointers are followed but do not advance `pos`).
fn read_name(buf: &[u8], mut pos: usize) -> Option<(String, usize)> {
    let mut labels: Vec<String> = Vec::new();
    let mut jumped = false;
    let mut next_pos = pos;
    let mut jumps = 0;

    loop {
        let len = *buf.get(pos)? as usize;

        if len == 0 {
            if !jumped {
                next_pos = pos + 1;
            }
            break;
        }

        // Compression pointer: two bytes, top bits 0b11
        if len & 0xC0 == 0xC0 {
            let low = *buf.get(pos + 1)? as usize;
            if !jumped {
                next_pos = pos + 2;
                jumped = true;
            }
            pos = ((len & 0x3F) << 8) | low;
            jumps += 1;
            if jumps > 8 {
                return None;
            }
            continue;
        }

        let start = pos + 1;
        let end = start.checked_add(len)?;
        let label = buf.get(start..end)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos = end;
    }

    Some((labels.join("."), next_pos))
}

fn u16_at(buf: &[u8], pos: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*buf.get(pos)?, *buf.get(pos + 1)?]))
}

fn first_label(name: &str) -> Option<String> {
    name.split('.').next().filter(|l| !l.is_empty()).map(|l| l.to_string())
}
