//! Per-device request manager.
//!
//! Each device gets one manager that serializes its requests: at most one
//! request is on the wire per device at any time, queued requests run FIFO,
//! and refresh requests coalesce while one is already pending or in flight.
//!
//! The queue mutex is only ever held for pointer-sized bookkeeping, never
//! across an await. Whoever flips `busy` from false becomes the runner and
//! drains the queue inline; later submitters just append.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use wled_api::{Transport, TransportError};

use crate::model::DeviceId;
use crate::request::{DeviceRequest, StateChange};
use crate::store::DeviceStore;

struct QueueState {
    pending: VecDeque<DeviceRequest>,
    busy: bool,
}

/// Held for the duration of a queue drain. Dropping it without an explicit
/// release means the draining future was cancelled; the device must not be
/// left busy with the refresh claim held.
struct RunnerSlot<'a> {
    manager: &'a DeviceRequestManager,
    released: bool,
}

impl Drop for RunnerSlot<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let mut state = self.manager.state.lock();
        self.manager.store.end_refresh(&self.manager.device_id);
        state.busy = false;
    }
}

/// Serializes and coalesces requests for a single device
pub struct DeviceRequestManager {
    device_id: DeviceId,
    store: Arc<DeviceStore>,
    transport: Arc<dyn Transport>,
    state: Mutex<QueueState>,
}

impl DeviceRequestManager {
    pub fn new(
        device_id: DeviceId,
        store: Arc<DeviceStore>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            device_id,
            store,
            transport,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                busy: false,
            }),
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Submit a request. Returns `false` when a refresh was coalesced into
    /// one already pending or in flight.
    ///
    /// When this call wins the runner slot it drains the device's queue
    /// before returning; otherwise it returns immediately after enqueueing.
    pub async fn submit(&self, request: DeviceRequest) -> bool {
        let run = {
            let mut state = self.state.lock();

            // The refresh claim happens under the queue lock so it is
            // ordered against the runner's drain-and-release below: a
            // racing refresh either sees the claim held (coalesced) or
            // lands after release and becomes a fresh refresh.
            if request.is_refresh() && !self.store.try_begin_refresh(&self.device_id) {
                tracing::debug!(device = %self.device_id, "refresh coalesced");
                return false;
            }

            state.pending.push_back(request);
            if state.busy {
                false
            } else {
                state.busy = true;
                true
            }
        };

        if run {
            self.run_queue().await;
        }
        true
    }

    /// Convenience: submit a refresh
    pub async fn refresh(&self) -> bool {
        self.submit(DeviceRequest::Refresh).await
    }

    /// Convenience: submit a partial state change
    pub async fn change_state(&self, change: StateChange) -> bool {
        self.submit(DeviceRequest::ChangeState(change)).await
    }

    /// Convenience: submit a preset catalog fetch
    pub async fn fetch_presets(&self) -> bool {
        self.submit(DeviceRequest::FetchPresets).await
    }

    /// Drain the queue. Only the submitter that flipped `busy` runs this.
    ///
    /// The drain runs in the submitter's own future. If that caller stops
    /// polling mid-drain (timeout, abort), the slot guard releases `busy`
    /// and the refresh claim so the device does not stay wedged; anything
    /// still pending runs when the next submission takes the slot.
    async fn run_queue(&self) {
        let mut slot = RunnerSlot {
            manager: self,
            released: false,
        };
        loop {
            let next = {
                let mut state = self.state.lock();
                match state.pending.pop_front() {
                    Some(request) => request,
                    None => {
                        // Release the refresh claim before giving up the
                        // runner slot, still under the queue lock, so a
                        // racing submit cannot observe busy=false with the
                        // claim still held.
                        self.store.end_refresh(&self.device_id);
                        state.busy = false;
                        slot.released = true;
                        return;
                    }
                }
            };
            self.execute(next).await;
        }
    }

    /// Execute one request against the device.
    ///
    /// A failed request is dropped; the rest of the queue still runs.
    async fn execute(&self, request: DeviceRequest) {
        let device = match self.store.get(&self.device_id) {
            Some(device) => device,
            None => {
                tracing::debug!(device = %self.device_id, "device removed, dropping request");
                return;
            }
        };

        // Optimistic update so the UI reflects the user's action while the
        // round trip is in flight. Reconciled by apply_response on success.
        if let DeviceRequest::ChangeState(change) = &request {
            self.store
                .with_device_mut(&self.device_id, |record| change.apply_to(record));
        }

        let spec = request.build_spec(&device);
        match self.transport.execute(&device.address, &spec).await {
            Ok(body) => {
                if let Err(e) = request.apply_response(&self.store, &self.device_id, body) {
                    tracing::warn!(device = %self.device_id, error = %e, "discarding unusable response");
                }
            }
            Err(TransportError::Unreachable(e)) => {
                tracing::warn!(device = %self.device_id, address = %device.address, error = %e, "device unreachable");
                self.store.mark_offline(&self.device_id);
            }
            Err(e) => {
                // Malformed responses prove the host answered; cached state
                // stays as-is.
                tracing::warn!(device = %self.device_id, error = %e, "request failed");
            }
        }
    }
}
