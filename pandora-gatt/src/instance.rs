//! GattInstance: bridges platform callbacks for one connection into awaitable calls
//!
//! Every `*_blocking` call registers a pending entry, asks the platform to
//! start the operation and then waits for the matching callback. The entry is
//! registered before the platform call so that a callback fired from inside
//! the call is not lost.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::GattError;
use crate::platform::{
    GATT_FAILURE, GATT_SUCCESS, GattClient, GattEvent, GattPlatform, PlatformError, ServiceInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    InProgress,
    Done { status: u16 },
}

/// A characteristic or descriptor value as reported by the read callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRead {
    pub handle: u16,
    pub value: Vec<u8>,
    pub status: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PendingOp {
    Mtu,
    ReadCharacteristic(u16),
    ReadByUuid(Uuid),
    ReadDescriptor(u16),
    WriteCharacteristic(u16),
}

impl fmt::Display for PendingOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PendingOp::Mtu => write!(f, "mtu exchange"),
            PendingOp::ReadCharacteristic(h) => write!(f, "characteristic read on handle {h}"),
            PendingOp::ReadByUuid(uuid) => write!(f, "characteristic read by uuid {uuid}"),
            PendingOp::ReadDescriptor(h) => write!(f, "descriptor read on handle {h}"),
            PendingOp::WriteCharacteristic(h) => write!(f, "characteristic write on handle {h}"),
        }
    }
}

#[derive(Debug)]
enum Completion {
    Mtu { mtu: u16, status: u16 },
    Read(ValueRead),
    Written { status: u16 },
}

struct Shared {
    pending: Mutex<HashMap<PendingOp, oneshot::Sender<Completion>>>,
    discovery: watch::Sender<DiscoveryState>,
    connected: AtomicBool,
}

pub struct GattInstance<C: GattClient> {
    cookie: Vec<u8>,
    client: Arc<C>,
    shared: Arc<Shared>,
    timeout: Duration,
    events: JoinHandle<()>,
}

impl<C: GattClient> GattInstance<C> {
    /// Attach to the platform connection behind `cookie` and start draining
    /// its callbacks.
    pub async fn open<P>(platform: &P, cookie: &[u8], timeout: Duration) -> Result<Self, GattError>
    where
        P: GattPlatform<Client = C>,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = platform.connect_gatt(cookie, tx).await?;

        let shared = Arc::new(Shared {
            pending: Mutex::new(HashMap::new()),
            discovery: watch::Sender::new(DiscoveryState::Idle),
            connected: AtomicBool::new(client.is_connected()),
        });

        let events = tokio::spawn(run_events(rx, shared.clone()));

        tracing::debug!(cookie = %cookie_str(cookie), "gatt instance opened");

        Ok(Self {
            cookie: cookie.to_vec(),
            client,
            shared,
            timeout,
            events,
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    pub fn discovery_state(&self) -> DiscoveryState {
        *self.shared.discovery.borrow()
    }

    pub fn services(&self) -> Vec<ServiceInfo> {
        self.client.services()
    }

    /// Start a full discovery and wait for it to finish.
    pub async fn discover_services(&self) -> Result<(), GattError> {
        self.ensure_connected()?;
        self.shared.discovery.send_replace(DiscoveryState::InProgress);
        if let Err(e) = self.client.discover_services() {
            self.shared.discovery.send_replace(DiscoveryState::Idle);
            return Err(e.into());
        }
        self.wait_for_discovery_end().await
    }

    /// Discover unless the services are already known, then wait for the
    /// running discovery (if any) to end.
    pub async fn try_discover_services(&self) -> Result<(), GattError> {
        match self.discovery_state() {
            DiscoveryState::Done { status: GATT_SUCCESS } => Ok(()),
            DiscoveryState::InProgress => self.wait_for_discovery_end().await,
            _ => self.discover_services().await,
        }
    }

    pub async fn wait_for_discovery_end(&self) -> Result<(), GattError> {
        let mut rx = self.shared.discovery.subscribe();
        let waited = tokio::time::timeout(self.timeout, async {
            rx.wait_for(|s| *s != DiscoveryState::InProgress)
                .await
                .map(|s| *s)
        })
        .await;

        let state = match waited {
            Ok(state) => state.map_err(|_| GattError::Disconnected)?,
            Err(_) => {
                // let the next request start over unless a result just landed
                self.shared.discovery.send_if_modified(|s| {
                    let stuck = *s == DiscoveryState::InProgress;
                    if stuck {
                        *s = DiscoveryState::Idle;
                    }
                    stuck
                });
                return Err(GattError::Timeout("service discovery".to_string()));
            }
        };

        match state {
            DiscoveryState::Done { status: GATT_SUCCESS } => Ok(()),
            DiscoveryState::Done { status } => Err(GattError::Status {
                operation: "service discovery",
                status,
            }),
            _ if !self.is_connected() => Err(GattError::Disconnected),
            _ => Err(GattError::Status {
                operation: "service discovery",
                status: GATT_FAILURE,
            }),
        }
    }

    /// Drop the platform cache; the next lookup rediscovers.
    pub fn refresh(&self) -> Result<(), GattError> {
        self.client.refresh()?;
        self.shared.discovery.send_replace(DiscoveryState::Idle);
        Ok(())
    }

    /// Returns the MTU reported by the platform.
    pub async fn request_mtu_blocking(&self, mtu: u16) -> Result<u16, GattError> {
        match self.transact(PendingOp::Mtu, |c| c.request_mtu(mtu)).await? {
            Completion::Mtu { mtu, status: GATT_SUCCESS } => Ok(mtu),
            other => Err(failed("mtu exchange", other)),
        }
    }

    pub async fn read_characteristic_blocking(&self, handle: u16) -> Result<ValueRead, GattError> {
        let completion = self
            .transact(PendingOp::ReadCharacteristic(handle), |c| {
                c.read_characteristic(handle)
            })
            .await?;
        into_read("characteristic read", completion)
    }

    pub async fn read_characteristic_uuid_blocking(
        &self,
        uuid: Uuid,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<ValueRead, GattError> {
        let completion = self
            .transact(PendingOp::ReadByUuid(uuid), |c| {
                c.read_using_characteristic_uuid(uuid, start_handle, end_handle)
            })
            .await?;
        into_read("characteristic read by uuid", completion)
    }

    pub async fn read_descriptor_blocking(&self, handle: u16) -> Result<ValueRead, GattError> {
        let completion = self
            .transact(PendingOp::ReadDescriptor(handle), |c| c.read_descriptor(handle))
            .await?;
        into_read("descriptor read", completion)
    }

    pub async fn write_characteristic_blocking(
        &self,
        handle: u16,
        value: &[u8],
    ) -> Result<(), GattError> {
        match self
            .transact(PendingOp::WriteCharacteristic(handle), |c| {
                c.write_characteristic(handle, value)
            })
            .await?
        {
            Completion::Written { status: GATT_SUCCESS } => Ok(()),
            other => Err(failed("characteristic write", other)),
        }
    }

    fn ensure_connected(&self) -> Result<(), GattError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(GattError::Disconnected)
        }
    }

    async fn transact<F>(&self, op: PendingOp, start: F) -> Result<Completion, GattError>
    where
        F: FnOnce(&C) -> Result<(), PlatformError>,
    {
        self.ensure_connected()?;

        // Register before starting so that an immediate callback finds us
        let rx = {
            let mut pending = self.shared.pending.lock().await;
            if pending.contains_key(&op) {
                return Err(GattError::Busy(op.to_string()));
            }
            let (tx, rx) = oneshot::channel();
            pending.insert(op.clone(), tx);
            rx
        };

        if let Err(e) = start(&self.client) {
            self.shared.pending.lock().await.remove(&op);
            return Err(e.into());
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(completion)) => Ok(completion),
            // sender dropped: connection went away
            Ok(Err(_)) => Err(GattError::Disconnected),
            Err(_) => {
                self.shared.pending.lock().await.remove(&op);
                Err(GattError::Timeout(op.to_string()))
            }
        }
    }
}

impl<C: GattClient> Drop for GattInstance<C> {
    fn drop(&mut self) {
        tracing::debug!(cookie = %cookie_str(&self.cookie), "gatt instance closed");
        self.events.abort();
    }
}

fn into_read(operation: &'static str, completion: Completion) -> Result<ValueRead, GattError> {
    match completion {
        Completion::Read(read) => Ok(read),
        other => Err(failed(operation, other)),
    }
}

fn failed(operation: &'static str, completion: Completion) -> GattError {
    let status = match completion {
        Completion::Mtu { status, .. } | Completion::Written { status } => status,
        Completion::Read(read) => read.status,
    };
    GattError::Status {
        operation,
        status: if status == GATT_SUCCESS { GATT_FAILURE } else { status },
    }
}

async fn run_events(mut rx: mpsc::UnboundedReceiver<GattEvent>, shared: Arc<Shared>) {
    while let Some(event) = rx.recv().await {
        dispatch(&shared, event).await;
    }

    // the platform dropped its callback sender, nothing will complete any more
    shared.connected.store(false, Ordering::SeqCst);
    shared.pending.lock().await.clear();
    shared.discovery.send_replace(DiscoveryState::Idle);
}

async fn dispatch(shared: &Shared, event: GattEvent) {
    let (key, completion) = match event {
        GattEvent::ConnectionStateChanged { connected, status } => {
            tracing::info!(connected, status, "connection state changed");
            shared.connected.store(connected, Ordering::SeqCst);
            if !connected {
                // dropping the senders wakes every waiter with Disconnected
                shared.pending.lock().await.clear();
                shared.discovery.send_replace(DiscoveryState::Idle);
            }
            return;
        }
        GattEvent::ServicesDiscovered { status } => {
            tracing::debug!(status, "services discovered");
            shared.discovery.send_replace(DiscoveryState::Done { status });
            return;
        }
        GattEvent::MtuChanged { mtu, status } => (PendingOp::Mtu, Completion::Mtu { mtu, status }),
        GattEvent::CharacteristicRead {
            handle,
            uuid,
            value,
            status,
        } => {
            tracing::trace!(%uuid, handle, "characteristic read");
            (
                PendingOp::ReadCharacteristic(handle),
                Completion::Read(ValueRead {
                    handle,
                    value,
                    status,
                }),
            )
        }
        GattEvent::CharacteristicReadByUuid {
            handle,
            uuid,
            value,
            status,
        } => (
            PendingOp::ReadByUuid(uuid),
            Completion::Read(ValueRead {
                handle,
                value,
                status,
            }),
        ),
        GattEvent::DescriptorRead {
            handle,
            value,
            status,
        } => (
            PendingOp::ReadDescriptor(handle),
            Completion::Read(ValueRead {
                handle,
                value,
                status,
            }),
        ),
        GattEvent::CharacteristicWritten { handle, status } => (
            PendingOp::WriteCharacteristic(handle),
            Completion::Written { status },
        ),
    };

    let waiter = shared.pending.lock().await.remove(&key);

    match waiter {
        Some(tx) => {
            let _ = tx.send(completion);
        }
        None => tracing::debug!(?completion, "callback with no waiter, dropping"),
    }
}

pub(crate) fn cookie_str(cookie: &[u8]) -> String {
    data_encoding::HEXLOWER.encode(cookie)
}
