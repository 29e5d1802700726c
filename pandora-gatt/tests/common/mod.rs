//! In-memory platform that answers through the same callback channel a real
//! stack would use.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use pandora_gatt::bt_uuid::from_u16;
use pandora_gatt::{
    CharacteristicInfo, Config, DescriptorInfo, GATT_SUCCESS, GattCallbacks, GattClient,
    GattEvent, GattPlatform, GattService, PlatformError, PlatformEvent, ServiceInfo, ServiceType,
};
use pandora_proto::Connection;
use tokio::sync::broadcast;
use uuid::Uuid;

pub const COOKIE: &[u8] = &[0xaa, 0xbb, 0xcc, 0x01, 0x02, 0x03];

pub const BATTERY_LEVEL: u16 = 0x0012;
pub const BATTERY_LEVEL_CCCD: u16 = 0x0013;
pub const DEVICE_NAME: u16 = 0x0003;

pub struct FakePlatform {
    peers: Mutex<HashMap<Vec<u8>, Arc<FakeClient>>>,
    sdp: Mutex<HashMap<Vec<u8>, Vec<Uuid>>>,
    /// cookies whose attach never completes
    hanging: Mutex<HashSet<Vec<u8>>>,
    /// accept SDP fetches but never publish a result
    pub sdp_silent: AtomicBool,
    events: broadcast::Sender<PlatformEvent>,
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            peers: Mutex::new(HashMap::new()),
            sdp: Mutex::new(HashMap::new()),
            hanging: Mutex::new(HashSet::new()),
            sdp_silent: AtomicBool::new(false),
            events,
        })
    }

    pub fn add_peer(&self, cookie: &[u8], services: Vec<ServiceInfo>) -> Arc<FakeClient> {
        let client = Arc::new(FakeClient::new(services));
        self.peers.lock().unwrap().insert(cookie.to_vec(), client.clone());
        client
    }

    pub fn add_hanging_peer(&self, cookie: &[u8]) {
        self.hanging.lock().unwrap().insert(cookie.to_vec());
    }

    pub fn set_sdp_uuids(&self, address: &[u8], uuids: Vec<Uuid>) {
        self.sdp.lock().unwrap().insert(address.to_vec(), uuids);
    }
}

impl GattPlatform for FakePlatform {
    type Client = FakeClient;

    async fn connect_gatt(
        &self,
        cookie: &[u8],
        callbacks: GattCallbacks,
    ) -> Result<Arc<FakeClient>, PlatformError> {
        let hangs = self.hanging.lock().unwrap().contains(cookie);
        if hangs {
            std::future::pending::<()>().await;
        }

        let client = self
            .peers
            .lock()
            .unwrap()
            .get(cookie)
            .cloned()
            .ok_or_else(|| PlatformError::NoConnection(format!("{cookie:02x?}")))?;
        client.attach(callbacks);
        Ok(client)
    }

    fn fetch_uuids_with_sdp(&self, address: &[u8]) -> Result<(), PlatformError> {
        let uuids = self
            .sdp
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or(PlatformError::Rejected("sdp fetch"))?;
        if self.sdp_silent.load(Ordering::SeqCst) {
            return Ok(());
        }

        // unrelated device first, the handler must skip it
        let _ = self.events.send(PlatformEvent::UuidsFetched {
            address: vec![0; 6],
            uuids: Vec::new(),
        });
        let _ = self.events.send(PlatformEvent::UuidsFetched {
            address: address.to_vec(),
            uuids,
        });
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }
}

/// Operation names understood by [`Behavior`].
pub mod op {
    pub const MTU: &str = "request_mtu";
    pub const DISCOVER: &str = "discover_services";
    pub const DISCOVER_BY_UUID: &str = "discover_service_by_uuid";
    pub const REFRESH: &str = "refresh";
    pub const READ: &str = "read_characteristic";
    pub const READ_BY_UUID: &str = "read_by_uuid";
    pub const READ_DESCRIPTOR: &str = "read_descriptor";
    pub const WRITE: &str = "write_characteristic";
}

#[derive(Default)]
pub struct Behavior {
    /// calls refused up front
    pub reject: HashSet<&'static str>,
    /// calls accepted but never answered
    pub silent: HashSet<&'static str>,
    /// status reported in the callback instead of success
    pub status: HashMap<&'static str, u16>,
}

pub struct FakeClient {
    services: Vec<ServiceInfo>,
    values: Mutex<HashMap<u16, (Vec<u8>, u16)>>,
    callbacks: Mutex<Option<GattCallbacks>>,
    connected: AtomicBool,
    pub behavior: Mutex<Behavior>,
    pub writes: Mutex<Vec<(u16, Vec<u8>)>>,
    pub calls: Mutex<Vec<&'static str>>,
    pub attaches: AtomicUsize,
}

impl FakeClient {
    fn new(services: Vec<ServiceInfo>) -> Self {
        Self {
            services,
            values: Mutex::new(HashMap::new()),
            callbacks: Mutex::new(None),
            connected: AtomicBool::new(true),
            behavior: Mutex::new(Behavior::default()),
            writes: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            attaches: AtomicUsize::new(0),
        }
    }

    fn attach(&self, callbacks: GattCallbacks) {
        self.attaches.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        *self.callbacks.lock().unwrap() = Some(callbacks);
    }

    pub fn set_value(&self, handle: u16, value: &[u8], status: u16) {
        self.values
            .lock()
            .unwrap()
            .insert(handle, (value.to_vec(), status));
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.send(GattEvent::ConnectionStateChanged {
            connected: false,
            status: GATT_SUCCESS,
        });
    }

    /// Fire a discovery completion the adapter did not ask for, like a stack
    /// that discovers on its own after connecting.
    pub fn finish_discovery(&self, status: u16) {
        self.send(GattEvent::ServicesDiscovered { status });
    }

    fn send(&self, event: GattEvent) {
        if let Some(callbacks) = self.callbacks.lock().unwrap().as_ref() {
            let _ = callbacks.send(event);
        }
    }

    fn start(&self, name: &'static str) -> Result<Option<u16>, PlatformError> {
        self.calls.lock().unwrap().push(name);
        let behavior = self.behavior.lock().unwrap();
        if behavior.reject.contains(name) {
            return Err(PlatformError::Rejected(name));
        }
        if behavior.silent.contains(name) {
            return Ok(None);
        }
        Ok(Some(behavior.status.get(name).copied().unwrap_or(GATT_SUCCESS)))
    }

    fn value(&self, handle: u16) -> (Vec<u8>, u16) {
        self.values
            .lock()
            .unwrap()
            .get(&handle)
            .cloned()
            .unwrap_or((Vec::new(), GATT_SUCCESS))
    }

    fn characteristics(&self) -> impl Iterator<Item = &CharacteristicInfo> {
        self.services.iter().flat_map(|s| s.characteristics.iter())
    }
}

impl GattClient for FakeClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn request_mtu(&self, mtu: u16) -> Result<(), PlatformError> {
        if let Some(status) = self.start(op::MTU)? {
            self.send(GattEvent::MtuChanged {
                mtu: mtu.min(247),
                status,
            });
        }
        Ok(())
    }

    fn discover_services(&self) -> Result<(), PlatformError> {
        if let Some(status) = self.start(op::DISCOVER)? {
            self.send(GattEvent::ServicesDiscovered { status });
        }
        Ok(())
    }

    fn discover_service_by_uuid(&self, _uuid: Uuid) -> Result<(), PlatformError> {
        self.start(op::DISCOVER_BY_UUID).map(|_| ())
    }

    fn refresh(&self) -> Result<(), PlatformError> {
        self.start(op::REFRESH).map(|_| ())
    }

    fn services(&self) -> Vec<ServiceInfo> {
        self.services.clone()
    }

    fn read_characteristic(&self, handle: u16) -> Result<(), PlatformError> {
        if let Some(status) = self.start(op::READ)? {
            let uuid = self
                .characteristics()
                .find(|c| c.handle == handle)
                .map(|c| c.uuid)
                .unwrap_or_default();
            let (value, value_status) = self.value(handle);
            self.send(GattEvent::CharacteristicRead {
                handle,
                uuid,
                value,
                status: if status == GATT_SUCCESS { value_status } else { status },
            });
        }
        Ok(())
    }

    fn read_using_characteristic_uuid(
        &self,
        uuid: Uuid,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<(), PlatformError> {
        if self.start(op::READ_BY_UUID)?.is_some() {
            let found = self
                .characteristics()
                .find(|c| c.uuid == uuid && (start_handle..=end_handle).contains(&c.handle))
                .map(|c| c.handle);
            let (handle, value, status) = match found {
                // the remote answers a malformed range with Invalid Handle
                _ if start_handle == 0 || start_handle > end_handle => {
                    (start_handle, Vec::new(), 0x01)
                }
                Some(handle) => {
                    let (value, status) = self.value(handle);
                    (handle, value, status)
                }
                None => (start_handle, Vec::new(), 0x0a),
            };
            self.send(GattEvent::CharacteristicReadByUuid {
                handle,
                uuid,
                value,
                status,
            });
        }
        Ok(())
    }

    fn read_descriptor(&self, handle: u16) -> Result<(), PlatformError> {
        if let Some(status) = self.start(op::READ_DESCRIPTOR)? {
            let (value, value_status) = self.value(handle);
            self.send(GattEvent::DescriptorRead {
                handle,
                value,
                status: if status == GATT_SUCCESS { value_status } else { status },
            });
        }
        Ok(())
    }

    fn write_characteristic(&self, handle: u16, value: &[u8]) -> Result<(), PlatformError> {
        if let Some(status) = self.start(op::WRITE)? {
            self.writes.lock().unwrap().push((handle, value.to_vec()));
            self.send(GattEvent::CharacteristicWritten { handle, status });
        }
        Ok(())
    }
}

/// GAP service with Device Name, Battery service with Battery Level + CCCD,
/// the battery service including a secondary service.
pub fn sample_services() -> Vec<ServiceInfo> {
    vec![
        ServiceInfo {
            handle: 0x0001,
            service_type: ServiceType::Primary,
            uuid: from_u16(0x1800),
            included_services: Vec::new(),
            characteristics: vec![CharacteristicInfo {
                handle: DEVICE_NAME,
                uuid: from_u16(0x2a00),
                properties: 0x02,
                permissions: 0x01,
                descriptors: Vec::new(),
            }],
        },
        ServiceInfo {
            handle: 0x0010,
            service_type: ServiceType::Primary,
            uuid: from_u16(0x180f),
            included_services: vec![ServiceInfo {
                handle: 0x0020,
                service_type: ServiceType::Secondary,
                uuid: from_u16(0x1801),
                included_services: Vec::new(),
                characteristics: Vec::new(),
            }],
            characteristics: vec![CharacteristicInfo {
                handle: BATTERY_LEVEL,
                uuid: from_u16(0x2a19),
                properties: 0x1a,
                permissions: 0x11,
                descriptors: vec![DescriptorInfo {
                    handle: BATTERY_LEVEL_CCCD,
                    uuid: from_u16(0x2902),
                    permissions: 0x11,
                }],
            }],
        },
    ]
}

pub fn test_config() -> Config {
    Config {
        callback_timeout_ms: 200,
        discovery_by_uuid_delay_ms: 0,
        ..Config::default()
    }
}

/// Service over a fake platform with one connected peer at [`COOKIE`].
pub fn setup() -> (GattService<FakePlatform>, Arc<FakePlatform>, Arc<FakeClient>) {
    let platform = FakePlatform::new();
    let client = platform.add_peer(COOKIE, sample_services());
    let service = GattService::new(platform.clone(), &test_config());
    (service, platform, client)
}

pub fn connection() -> Option<Connection> {
    Some(Connection::new(COOKIE))
}
