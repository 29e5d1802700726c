//! `GattClient` for one btleplug peripheral
//!
//! btleplug's API is async request/response; each call spawns a task that
//! awaits it and reports the outcome on the callback channel.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use btleplug::api::{Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use pandora_gatt::{
    GATT_FAILURE, GATT_SUCCESS, GattCallbacks, GattClient, GattEvent, PlatformError, ServiceInfo,
};
use uuid::Uuid;

use crate::handles::HandleTable;

const INVALID_HANDLE: u16 = 0x01;
const READ_NOT_PERMITTED: u16 = 0x02;
const WRITE_NOT_PERMITTED: u16 = 0x03;
const ATTRIBUTE_NOT_FOUND: u16 = 0x0a;

pub(crate) struct ClientState {
    pub(crate) callbacks: GattCallbacks,
    pub(crate) connected: AtomicBool,
    table: Mutex<HandleTable>,
}

impl ClientState {
    pub(crate) fn new(callbacks: GattCallbacks) -> Self {
        Self {
            callbacks,
            connected: AtomicBool::new(true),
            table: Mutex::new(HandleTable::default()),
        }
    }

    fn table(&self) -> MutexGuard<'_, HandleTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: GattEvent) {
        if self.callbacks.send(event).is_err() {
            tracing::debug!("callback receiver gone, dropping event");
        }
    }

    pub(crate) fn disconnected(&self) {
        self.connected.store(false, Ordering::SeqCst);
        self.emit(GattEvent::ConnectionStateChanged {
            connected: false,
            status: GATT_SUCCESS,
        });
    }
}

pub struct BtleplugClient {
    peripheral: Peripheral,
    state: Arc<ClientState>,
}

impl BtleplugClient {
    pub(crate) fn new(peripheral: Peripheral, state: Arc<ClientState>) -> Self {
        Self { peripheral, state }
    }

    fn spawn<F>(&self, task: impl FnOnce(Peripheral, Arc<ClientState>) -> F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(task(self.peripheral.clone(), self.state.clone()));
    }

    /// Run discovery and rebuild the handle table, returning the GATT status.
    async fn rediscover(peripheral: &Peripheral, state: &ClientState) -> u16 {
        match peripheral.discover_services().await {
            Ok(()) => {
                let table = HandleTable::build(&peripheral.services());
                tracing::debug!(services = table.services().len(), "handle table rebuilt");
                *state.table() = table;
                GATT_SUCCESS
            }
            Err(e) => {
                tracing::warn!(error = %e, "service discovery failed");
                GATT_FAILURE
            }
        }
    }
}

fn att_status(e: &btleplug::Error, denied: u16) -> u16 {
    tracing::warn!(error = %e, "gatt operation failed");
    match e {
        btleplug::Error::PermissionDenied => denied,
        _ => GATT_FAILURE,
    }
}

impl GattClient for BtleplugClient {
    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::SeqCst)
    }

    fn request_mtu(&self, _mtu: u16) -> Result<(), PlatformError> {
        Err(PlatformError::Unsupported("mtu exchange"))
    }

    fn discover_services(&self) -> Result<(), PlatformError> {
        self.spawn(|peripheral, state| async move {
            let status = Self::rediscover(&peripheral, &state).await;
            state.emit(GattEvent::ServicesDiscovered { status });
        });
        Ok(())
    }

    fn discover_service_by_uuid(&self, uuid: Uuid) -> Result<(), PlatformError> {
        // btleplug only discovers the whole database; no callback either way
        tracing::debug!(%uuid, "discovering all services for single service request");
        self.spawn(|peripheral, state| async move {
            Self::rediscover(&peripheral, &state).await;
        });
        Ok(())
    }

    fn refresh(&self) -> Result<(), PlatformError> {
        *self.state.table() = HandleTable::default();
        Ok(())
    }

    fn services(&self) -> Vec<ServiceInfo> {
        self.state.table().services().to_vec()
    }

    fn read_characteristic(&self, handle: u16) -> Result<(), PlatformError> {
        let characteristic = self
            .state
            .table()
            .characteristic(handle)
            .cloned()
            .ok_or(PlatformError::Rejected("read of unknown characteristic"))?;

        self.spawn(|peripheral, state| async move {
            let (value, status) = match peripheral.read(&characteristic).await {
                Ok(value) => (value, GATT_SUCCESS),
                Err(e) => (Vec::new(), att_status(&e, READ_NOT_PERMITTED)),
            };
            state.emit(GattEvent::CharacteristicRead {
                handle,
                uuid: characteristic.uuid,
                value,
                status,
            });
        });
        Ok(())
    }

    fn read_using_characteristic_uuid(
        &self,
        uuid: Uuid,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<(), PlatformError> {
        let invalid_range = start_handle == 0 || start_handle > end_handle;
        let found = self
            .state
            .table()
            .find_by_uuid(uuid, start_handle, end_handle)
            .map(|(handle, c)| (handle, c.clone()));

        self.spawn(|peripheral, state| async move {
            let event = match found {
                _ if invalid_range => GattEvent::CharacteristicReadByUuid {
                    handle: start_handle,
                    uuid,
                    value: Vec::new(),
                    status: INVALID_HANDLE,
                },
                Some((handle, characteristic)) => {
                    let (value, status) = match peripheral.read(&characteristic).await {
                        Ok(value) => (value, GATT_SUCCESS),
                        Err(e) => (Vec::new(), att_status(&e, READ_NOT_PERMITTED)),
                    };
                    GattEvent::CharacteristicReadByUuid {
                        handle,
                        uuid,
                        value,
                        status,
                    }
                }
                None => GattEvent::CharacteristicReadByUuid {
                    handle: start_handle,
                    uuid,
                    value: Vec::new(),
                    status: ATTRIBUTE_NOT_FOUND,
                },
            };
            state.emit(event);
        });
        Ok(())
    }

    fn read_descriptor(&self, handle: u16) -> Result<(), PlatformError> {
        let descriptor = self
            .state
            .table()
            .descriptor(handle)
            .cloned()
            .ok_or(PlatformError::Rejected("read of unknown descriptor"))?;

        self.spawn(|peripheral, state| async move {
            let (value, status) = match peripheral.read_descriptor(&descriptor).await {
                Ok(value) => (value, GATT_SUCCESS),
                Err(e) => (Vec::new(), att_status(&e, READ_NOT_PERMITTED)),
            };
            state.emit(GattEvent::DescriptorRead {
                handle,
                value,
                status,
            });
        });
        Ok(())
    }

    fn write_characteristic(&self, handle: u16, value: &[u8]) -> Result<(), PlatformError> {
        let characteristic = self
            .state
            .table()
            .characteristic(handle)
            .cloned()
            .ok_or(PlatformError::Rejected("write of unknown characteristic"))?;
        let value = value.to_vec();

        self.spawn(|peripheral, state| async move {
            let status = match peripheral
                .write(&characteristic, &value, WriteType::WithResponse)
                .await
            {
                Ok(()) => GATT_SUCCESS,
                Err(e) => att_status(&e, WRITE_NOT_PERMITTED),
            };
            state.emit(GattEvent::CharacteristicWritten { handle, status });
        });
        Ok(())
    }
}
