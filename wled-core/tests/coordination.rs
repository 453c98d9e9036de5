//! End-to-end coordination tests over a scripted transport: coalescing,
//! queue ordering, failure isolation and preset bookkeeping across the
//! store, managers, registry and scheduler together.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::sync::Semaphore;

use wled_api::{RequestSpec, Transport, TransportError};
use wled_core::{
    CoreConfig, DeviceRecord, DeviceStore, ManagerRegistry, RefreshScheduler, StateChange,
    UNDEFINED_PRESET,
};

/// Scripted transport.
///
/// Responses are keyed by (address, path); unscripted requests get a
/// path-appropriate default. A semaphore gates request completion so tests
/// can hold a request in flight while they poke at the queue.
struct ScriptedTransport {
    scripted: Mutex<HashMap<(String, String), VecDeque<Result<Value, TransportError>>>>,
    calls: Mutex<Vec<(String, String)>>,
    gate: Semaphore,
    gated: bool,
}

impl ScriptedTransport {
    fn open() -> Arc<Self> {
        Arc::new(Self {
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
            gated: false,
        })
    }

    fn gated() -> Arc<Self> {
        Arc::new(Self {
            scripted: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: Semaphore::new(0),
            gated: true,
        })
    }

    fn script(&self, address: &str, path: &str, result: Result<Value, TransportError>) {
        self.scripted
            .lock()
            .entry((address.to_string(), path.to_string()))
            .or_default()
            .push_back(result);
    }

    fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().iter().filter(|(_, p)| p == path).count()
    }

    async fn wait_for_calls(&self, n: usize) {
        for _ in 0..200 {
            if self.calls.lock().len() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("transport never saw {} calls", n);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        base_address: &str,
        spec: &RequestSpec,
    ) -> Result<Value, TransportError> {
        self.calls
            .lock()
            .push((base_address.to_string(), spec.path.clone()));

        if self.gated {
            let permit = self.gate.acquire().await.unwrap();
            permit.forget();
        }

        let scripted = self
            .scripted
            .lock()
            .get_mut(&(base_address.to_string(), spec.path.to_string()))
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(result) => result,
            None => match spec.path.as_str() {
                "/presets.json" => Ok(json!({"1": {"n": "Sunset"}, "5": {"n": "Party"}})),
                _ => Ok(json!({"on": true, "bri": 100, "rssi": -50})),
            },
        }
    }
}

fn setup(transport: Arc<ScriptedTransport>) -> (Arc<DeviceStore>, Arc<ManagerRegistry>) {
    let store = Arc::new(DeviceStore::new());
    let registry = Arc::new(ManagerRegistry::new(
        Arc::clone(&store),
        transport as Arc<dyn Transport>,
    ));
    (store, registry)
}

#[tokio::test]
async fn test_concurrent_refreshes_collapse_to_one_request() {
    let transport = ScriptedTransport::gated();
    let (store, registry) = setup(transport.clone());
    let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));

    let manager = registry.manager_for(&id);
    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.refresh().await })
    };
    transport.wait_for_calls(1).await;

    // Refresh is in flight: further refreshes coalesce into it
    assert!(!manager.refresh().await);
    assert!(!manager.refresh().await);
    assert!(store.get(&id).unwrap().is_refreshing);

    transport.release(1);
    assert!(runner.await.unwrap());

    assert_eq!(transport.calls_to("/json/state"), 1);
    assert!(!store.get(&id).unwrap().is_refreshing);
}

#[tokio::test]
async fn test_requests_queue_in_order_behind_inflight_refresh() {
    let transport = ScriptedTransport::gated();
    let (store, registry) = setup(transport.clone());
    let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));

    let manager = registry.manager_for(&id);
    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.refresh().await })
    };
    transport.wait_for_calls(1).await;

    // These enqueue behind the in-flight refresh and return immediately
    assert!(manager.change_state(StateChange::brightness(10)).await);
    assert!(manager.change_state(StateChange::brightness(20)).await);
    assert_eq!(transport.calls().len(), 1);

    transport.release(3);
    runner.await.unwrap();
    transport.wait_for_calls(3).await;

    let paths: Vec<String> = transport.calls().into_iter().map(|(_, p)| p).collect();
    assert_eq!(paths, vec!["/json/state", "/json/state", "/json/state"]);
    // FIFO: the later write wins
    assert_eq!(store.get(&id).unwrap().brightness, 20);
    assert!(!store.get(&id).unwrap().is_refreshing);
}

#[tokio::test]
async fn test_timed_out_refresh_leaves_device_usable() {
    let transport = ScriptedTransport::gated();
    let (store, registry) = setup(transport.clone());
    let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));
    let manager = registry.manager_for(&id);

    // The caller gives up while the request is still gated; the dropped
    // future must release the busy slot and the refresh claim
    let result = tokio::time::timeout(Duration::from_millis(50), manager.refresh()).await;
    assert!(result.is_err());
    assert!(!store.get(&id).unwrap().is_refreshing);

    // The device is not wedged: a later refresh claims and fires again
    transport.release(1);
    assert!(manager.refresh().await);
    assert_eq!(transport.calls_to("/json/state"), 2);
    assert!(!store.get(&id).unwrap().is_refreshing);
    assert!(store.get(&id).unwrap().is_online);
}

#[tokio::test]
async fn test_refresh_applies_exact_device_state() {
    let transport = ScriptedTransport::open();
    let (store, registry) = setup(transport.clone());
    let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));
    transport.script(
        "10.0.0.5:80",
        "/json/state",
        Ok(json!({
            "on": false,
            "bri": 0,
            "ps": -1,
            "rssi": -65,
            "seg": [{"col": [[255, 160, 0]]}]
        })),
    );

    registry.manager_for(&id).refresh().await;

    let device = store.get(&id).unwrap();
    assert!(device.is_online);
    assert!(!device.is_powered_on);
    assert_eq!(device.brightness, 0);
    assert_eq!(device.rssi, -65);
    assert_eq!(device.preset_id, UNDEFINED_PRESET);
    assert_eq!(device.color, 0xFFA000);
}

#[tokio::test]
async fn test_sweep_isolates_unreachable_device() {
    let transport = ScriptedTransport::open();
    let (store, registry) = setup(transport.clone());
    let flaky = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));
    let healthy = store.insert(DeviceRecord::new("10.0.0.6:80", "Shelf"));
    transport.script(
        "10.0.0.5:80",
        "/json/state",
        Err(TransportError::Unreachable("connect timeout".to_string())),
    );

    let scheduler = RefreshScheduler::new(Arc::clone(&registry), CoreConfig::default());
    scheduler.refresh_all().await;

    assert!(!store.get(&flaky).unwrap().is_online);
    assert!(store.get(&healthy).unwrap().is_online);
    assert_eq!(store.get(&healthy).unwrap().brightness, 100);

    // Next sweep: the device answers again and comes back online
    scheduler.refresh_all().await;
    assert!(store.get(&flaky).unwrap().is_online);
    assert!(!store.get(&flaky).unwrap().is_refreshing);
}

#[tokio::test]
async fn test_sweep_fetches_presets_after_state() {
    let transport = ScriptedTransport::open();
    let (store, registry) = setup(transport.clone());
    let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));

    RefreshScheduler::new(Arc::clone(&registry), CoreConfig::default())
        .refresh_all()
        .await;

    let paths: Vec<String> = transport.calls().into_iter().map(|(_, p)| p).collect();
    assert_eq!(paths, vec!["/json/state", "/presets.json"]);

    let table = store.presets(&id).unwrap();
    assert_eq!(table.presets.len(), 2);
    assert_eq!(table.presets[0].name, "Sunset");
}

#[tokio::test]
async fn test_preset_selection_flow() {
    let transport = ScriptedTransport::open();
    let (store, registry) = setup(transport.clone());
    let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));
    let manager = registry.manager_for(&id);

    manager.fetch_presets().await;
    manager.change_state(StateChange::preset(5)).await;
    assert_eq!(store.selected_preset(&id), 5);
    assert_eq!(store.get(&id).unwrap().preset_id, 5);

    // The selected preset disappears from the catalog on the next fetch
    transport.script("10.0.0.5:80", "/presets.json", Ok(json!({"1": {"n": "Sunset"}})));
    manager.fetch_presets().await;

    assert_eq!(store.selected_preset(&id), UNDEFINED_PRESET);
    assert_eq!(store.presets(&id).unwrap().presets.len(), 1);
}

#[tokio::test]
async fn test_removed_device_drops_queued_work() {
    let transport = ScriptedTransport::gated();
    let (store, registry) = setup(transport.clone());
    let id = store.insert(DeviceRecord::new("10.0.0.5:80", "Desk"));

    let manager = registry.manager_for(&id);
    let runner = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.refresh().await })
    };
    transport.wait_for_calls(1).await;
    assert!(manager.change_state(StateChange::power(true)).await);

    registry.remove_device(&id);
    transport.release(2);
    runner.await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The in-flight refresh finished against a gone device; the queued
    // change was dropped without touching the wire.
    assert_eq!(transport.calls().len(), 1);
    assert!(store.get(&id).is_none());
    assert!(registry.is_empty());
}
