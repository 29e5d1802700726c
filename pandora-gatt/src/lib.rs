//! Pandora GATT adapter
//!
//! Serves the `pandora.GATT` gRPC service by forwarding each call to a
//! platform Bluetooth stack behind [`GattPlatform`] and turning the
//! platform's callbacks into responses.
//!
//! # Example
//!
//! ```ignore
//! let config = pandora_gatt::Config::load(&pandora_gatt::default_config_path())?;
//! let service = pandora_gatt::GattService::new(std::sync::Arc::new(platform), &config);
//!
//! tonic::transport::Server::builder()
//!     .add_service(service.into_server())
//!     .serve(config.listen_addr()?)
//!     .await?;
//! ```

pub mod bt_uuid;
mod config;
mod error;
mod instance;
pub mod platform;
mod registry;
mod service;
pub mod topology;

pub use config::{Config, ConfigError, DEFAULT_LISTEN_ADDR, default_config_path, pandora_home};
pub use error::GattError;
pub use instance::{DiscoveryState, GattInstance, ValueRead};
pub use platform::{
    CharacteristicInfo, DescriptorInfo, GATT_FAILURE, GATT_SUCCESS, GattCallbacks, GattClient,
    GattEvent, GattPlatform, PlatformError, PlatformEvent, ServiceInfo, ServiceType,
};
pub use registry::Connections;
pub use service::GattService;
