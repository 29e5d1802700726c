//! Generates the `pandora.GATT` tonic service from a hand-written method table.
//!
//! The messages live in `src/gatt.rs` as prost derives, so no `protoc` is needed.

/// (rust method name, wire method name, request type, response type)
const GATT_METHODS: &[(&str, &str, &str, &str)] = &[
    ("exchange_mtu", "ExchangeMTU", "ExchangeMtuRequest", "Empty"),
    (
        "write_characteristic_from_handle",
        "WriteCharacteristicFromHandle",
        "WriteCharacteristicRequest",
        "Empty",
    ),
    (
        "discover_service_by_uuid",
        "DiscoverServiceByUuid",
        "DiscoverServiceByUuidRequest",
        "DiscoverServicesResponse",
    ),
    (
        "discover_services",
        "DiscoverServices",
        "DiscoverServicesRequest",
        "DiscoverServicesResponse",
    ),
    (
        "discover_services_sdp",
        "DiscoverServicesSdp",
        "DiscoverServicesSdpRequest",
        "DiscoverServicesSdpResponse",
    ),
    ("clear_cache", "ClearCache", "ClearCacheRequest", "Empty"),
    (
        "read_characteristic_from_handle",
        "ReadCharacteristicFromHandle",
        "ReadCharacteristicRequest",
        "ReadCharacteristicResponse",
    ),
    (
        "read_characteristic_from_uuid",
        "ReadCharacteristicFromUuid",
        "ReadCharacteristicFromUuidRequest",
        "ReadCharacteristicResponse",
    ),
    (
        "read_characteristic_descriptor_from_handle",
        "ReadCharacteristicDescriptorFromHandle",
        "ReadCharacteristicDescriptorRequest",
        "ReadCharacteristicDescriptorResponse",
    ),
];

fn main() {
    let mut service = tonic_build::manual::Service::builder()
        .name("GATT")
        .package("pandora")
        .comment("GATT client operations exposed to the test harness.");

    for (name, route, input, output) in GATT_METHODS {
        service = service.method(
            tonic_build::manual::Method::builder()
                .name(*name)
                .route_name(*route)
                .input_type(format!("crate::gatt::{input}"))
                .output_type(format!("crate::gatt::{output}"))
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        );
    }

    tonic_build::manual::Builder::new()
        .build_client(false)
        .compile(&[service.build()]);

    println!("cargo:rerun-if-changed=build.rs");
}
