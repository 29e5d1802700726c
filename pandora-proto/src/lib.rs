//! Pandora GATT protocol - message types and the generated gRPC service
//!
//! Messages are declared by hand with prost derives and stay wire compatible
//! with the Pandora `gatt.proto` / `host.proto` schema. The server side of
//! the `pandora.GATT` service is generated by `build.rs`.

pub mod gatt;
pub mod host;

mod generated {
    include!(concat!(env!("OUT_DIR"), "/pandora.GATT.rs"));
}

// tonic_build snake-cases the service name letter by letter
pub use generated::g_a_t_t_server as gatt_server;
pub use generated::g_a_t_t_server::{GATT as Gatt, GATTServer as GattServer};
pub use host::Connection;
