//! The seam between this adapter and the platform Bluetooth stack
//!
//! The platform is treated as an opaque GATT client in the style of the OS
//! Bluetooth APIs: each operation call only says whether the request was
//! accepted, and the outcome arrives later as a [`GattEvent`] on the callback
//! channel handed over in [`GattPlatform::connect_gatt`].

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

/// GATT status reported by a successful operation.
pub const GATT_SUCCESS: u16 = 0x00;

/// Generic failure status used when the platform gives no better code.
pub const GATT_FAILURE: u16 = 0x101;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceType {
    Primary,
    Secondary,
}

impl ServiceType {
    /// Numeric value used on the wire: 0 = primary, 1 = secondary.
    pub fn as_u32(self) -> u32 {
        match self {
            ServiceType::Primary => 0,
            ServiceType::Secondary => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorInfo {
    pub handle: u16,
    pub uuid: Uuid,
    pub permissions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub handle: u16,
    pub uuid: Uuid,
    pub properties: u32,
    pub permissions: u32,
    pub descriptors: Vec<DescriptorInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub handle: u16,
    pub service_type: ServiceType,
    pub uuid: Uuid,
    pub included_services: Vec<ServiceInfo>,
    pub characteristics: Vec<CharacteristicInfo>,
}

/// Callbacks delivered by a [`GattClient`] for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattEvent {
    ConnectionStateChanged { connected: bool, status: u16 },
    ServicesDiscovered { status: u16 },
    MtuChanged { mtu: u16, status: u16 },
    CharacteristicRead {
        handle: u16,
        uuid: Uuid,
        value: Vec<u8>,
        status: u16,
    },
    /// Completion of [`GattClient::read_using_characteristic_uuid`]; `handle`
    /// is the attribute that matched, or the range start when none did.
    CharacteristicReadByUuid {
        handle: u16,
        uuid: Uuid,
        value: Vec<u8>,
        status: u16,
    },
    DescriptorRead {
        handle: u16,
        value: Vec<u8>,
        status: u16,
    },
    CharacteristicWritten { handle: u16, status: u16 },
}

pub type GattCallbacks = mpsc::UnboundedSender<GattEvent>;

/// Adapter-wide notifications, not tied to a GATT connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Result of [`GattPlatform::fetch_uuids_with_sdp`].
    UuidsFetched { address: Vec<u8>, uuids: Vec<Uuid> },
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("no connection for {0}")]
    NoConnection(String),
    #[error("{0} is not supported by this platform")]
    Unsupported(&'static str),
    #[error("platform rejected {0}")]
    Rejected(&'static str),
    #[error("platform error: {0}")]
    Other(String),
}

/// One GATT client connection owned by the platform.
///
/// Calls must not block; completion is reported through the callback channel.
pub trait GattClient: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    fn request_mtu(&self, mtu: u16) -> Result<(), PlatformError>;

    fn discover_services(&self) -> Result<(), PlatformError>;

    /// Discovery restricted to one service. Platforms do not report a
    /// callback for this call.
    fn discover_service_by_uuid(&self, uuid: Uuid) -> Result<(), PlatformError>;

    /// Drop the platform's cached attribute database.
    fn refresh(&self) -> Result<(), PlatformError>;

    /// The platform's current view of the remote database.
    fn services(&self) -> Vec<ServiceInfo>;

    fn read_characteristic(&self, handle: u16) -> Result<(), PlatformError>;

    fn read_using_characteristic_uuid(
        &self,
        uuid: Uuid,
        start_handle: u16,
        end_handle: u16,
    ) -> Result<(), PlatformError>;

    fn read_descriptor(&self, handle: u16) -> Result<(), PlatformError>;

    /// Write with response.
    fn write_characteristic(&self, handle: u16, value: &[u8]) -> Result<(), PlatformError>;
}

pub trait GattPlatform: Send + Sync + 'static {
    type Client: GattClient;

    /// Attach to the already established connection identified by `cookie`.
    fn connect_gatt(
        &self,
        cookie: &[u8],
        callbacks: GattCallbacks,
    ) -> impl Future<Output = Result<Arc<Self::Client>, PlatformError>> + Send;

    /// Start an SDP UUID fetch; the result is published on [`Self::events`].
    fn fetch_uuids_with_sdp(&self, address: &[u8]) -> Result<(), PlatformError>;

    fn events(&self) -> broadcast::Receiver<PlatformEvent>;
}
