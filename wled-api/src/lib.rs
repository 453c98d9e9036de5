//! HTTP transport and wire types for the WLED firmware API.
//!
//! This crate is the lowest network-facing layer of the SDK: it defines the
//! JSON documents the firmware speaks (`wire`) and a one-shot request
//! executor with timeout and error normalization (`transport`). It holds no
//! device state and performs no retries or coalescing; all coordination
//! lives in `wled-core`.

mod error;
pub mod transport;
pub mod wire;

pub use error::{Result, TransportError};
pub use transport::{HttpTransport, Method, RequestSpec, Transport, REQUEST_TIMEOUT};
