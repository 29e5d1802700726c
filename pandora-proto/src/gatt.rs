//! `pandora.GATT` messages
//!
//! Field numbers follow the Pandora schema, do not renumber.

use crate::Connection;

/// `google.protobuf.Empty`
#[derive(Clone, Copy, PartialEq, Eq, prost::Message)]
pub struct Empty {}

/// ATT status reported with read results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum AttStatusCode {
    Success = 0x00,
    InvalidHandle = 0x01,
    ReadNotPermitted = 0x02,
    WriteNotPermitted = 0x03,
    InsufficientAuthentication = 0x05,
    RequestNotSupported = 0x06,
    InvalidOffset = 0x07,
    InsufficientAuthorization = 0x08,
    AttributeNotFound = 0x0A,
    AttributeNotLong = 0x0B,
    InsufficientEncryptionKeySize = 0x0C,
    InvalidAttributeLength = 0x0D,
    InsufficientEncryption = 0x0F,
    ApplicationError = 0x80,
    UnknownError = 0x101,
}

impl AttStatusCode {
    /// Map a platform GATT status onto the closest ATT code.
    ///
    /// Statuses the schema does not know about collapse to `UnknownError`.
    pub fn from_status(status: u16) -> Self {
        Self::try_from(i32::from(status)).unwrap_or(Self::UnknownError)
    }
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GattCharacteristicDescriptor {
    #[prost(uint32, tag = "1")]
    pub handle: u32,
    #[prost(uint32, tag = "2")]
    pub permissions: u32,
    #[prost(string, tag = "3")]
    pub uuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GattCharacteristic {
    #[prost(uint32, tag = "1")]
    pub properties: u32,
    #[prost(uint32, tag = "2")]
    pub permissions: u32,
    #[prost(string, tag = "3")]
    pub uuid: String,
    #[prost(message, repeated, tag = "4")]
    pub descriptors: Vec<GattCharacteristicDescriptor>,
    #[prost(uint32, tag = "5")]
    pub handle: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct GattService {
    #[prost(uint32, tag = "1")]
    pub handle: u32,
    /// 0 = primary, 1 = secondary
    #[prost(uint32, tag = "2")]
    pub r#type: u32,
    #[prost(string, tag = "3")]
    pub uuid: String,
    #[prost(message, repeated, tag = "4")]
    pub included_services: Vec<GattService>,
    #[prost(message, repeated, tag = "5")]
    pub characteristics: Vec<GattCharacteristic>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ExchangeMtuRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
    #[prost(int32, tag = "2")]
    pub mtu: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct WriteCharacteristicRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
    #[prost(uint32, tag = "2")]
    pub handle: u32,
    #[prost(bytes = "vec", tag = "3")]
    pub value: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DiscoverServiceByUuidRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
    #[prost(string, tag = "2")]
    pub uuid: String,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DiscoverServicesRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DiscoverServicesResponse {
    #[prost(message, repeated, tag = "1")]
    pub services: Vec<GattService>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DiscoverServicesSdpRequest {
    #[prost(bytes = "vec", tag = "1")]
    pub address: Vec<u8>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DiscoverServicesSdpResponse {
    #[prost(string, repeated, tag = "1")]
    pub service_uuids: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ClearCacheRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadCharacteristicRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
    #[prost(uint32, tag = "2")]
    pub handle: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadCharacteristicFromUuidRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
    #[prost(string, tag = "2")]
    pub uuid: String,
    #[prost(uint32, tag = "3")]
    pub start_handle: u32,
    #[prost(uint32, tag = "4")]
    pub end_handle: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadCharacteristicResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
    #[prost(enumeration = "AttStatusCode", tag = "2")]
    pub status: i32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadCharacteristicDescriptorRequest {
    #[prost(message, optional, tag = "1")]
    pub connection: Option<Connection>,
    #[prost(uint32, tag = "2")]
    pub handle: u32,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ReadCharacteristicDescriptorResponse {
    #[prost(bytes = "vec", tag = "1")]
    pub value: Vec<u8>,
    #[prost(enumeration = "AttStatusCode", tag = "2")]
    pub status: i32,
}
