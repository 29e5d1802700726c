//! Pandora BLE platform
//!
//! A [`pandora_gatt::GattPlatform`] on top of the host's Bluetooth adapter via
//! `btleplug` (BlueZ, CoreBluetooth or WinRT).
//!
//! btleplug does not expose ATT handles, so the handle numbers handed to the
//! harness are synthesized from the discovered database, see [`handles`].
//!
//! # Example
//!
//! ```ignore
//! let platform = pandora_ble::BtleplugPlatform::new(0).await?;
//! let service = pandora_gatt::GattService::new(std::sync::Arc::new(platform), &config);
//! ```

mod address;
mod client;
mod error;
pub mod handles;
mod platform;

pub use address::parse_address;
pub use client::BtleplugClient;
pub use error::BleError;
pub use platform::BtleplugPlatform;
