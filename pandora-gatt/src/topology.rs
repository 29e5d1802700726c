//! Flattening of the platform's attribute tree into `pandora.GATT` messages

use pandora_proto::gatt::{GattCharacteristic, GattCharacteristicDescriptor, GattService};

use crate::platform::{CharacteristicInfo, DescriptorInfo, ServiceInfo};

/// Included services nested deeper than this are dropped.
pub const MAX_INCLUDE_DEPTH: usize = 8;

pub fn services_to_proto(services: &[ServiceInfo]) -> Vec<GattService> {
    generate_services(services, 1)
}

fn generate_services(services: &[ServiceInfo], depth: usize) -> Vec<GattService> {
    services
        .iter()
        .map(|service| {
            let included_services = if depth < MAX_INCLUDE_DEPTH {
                generate_services(&service.included_services, depth + 1)
            } else {
                if !service.included_services.is_empty() {
                    tracing::warn!(
                        handle = service.handle,
                        "included services nested deeper than {MAX_INCLUDE_DEPTH}, dropping"
                    );
                }
                Vec::new()
            };

            GattService {
                handle: service.handle.into(),
                r#type: service.service_type.as_u32(),
                uuid: service.uuid.to_string(),
                included_services,
                characteristics: service.characteristics.iter().map(characteristic_to_proto).collect(),
            }
        })
        .collect()
}

fn characteristic_to_proto(characteristic: &CharacteristicInfo) -> GattCharacteristic {
    GattCharacteristic {
        properties: characteristic.properties,
        permissions: characteristic.permissions,
        uuid: characteristic.uuid.to_string(),
        descriptors: characteristic.descriptors.iter().map(descriptor_to_proto).collect(),
        handle: characteristic.handle.into(),
    }
}

fn descriptor_to_proto(descriptor: &DescriptorInfo) -> GattCharacteristicDescriptor {
    GattCharacteristicDescriptor {
        handle: descriptor.handle.into(),
        permissions: descriptor.permissions,
        uuid: descriptor.uuid.to_string(),
    }
}

/// Characteristic with the given handle among the top-level services.
pub fn find_characteristic(services: &[ServiceInfo], handle: u32) -> Option<&CharacteristicInfo> {
    services
        .iter()
        .flat_map(|s| s.characteristics.iter())
        .find(|c| u32::from(c.handle) == handle)
}

/// Descriptor with the given handle among the top-level services.
pub fn find_descriptor(services: &[ServiceInfo], handle: u32) -> Option<&DescriptorInfo> {
    services
        .iter()
        .flat_map(|s| s.characteristics.iter())
        .flat_map(|c| c.descriptors.iter())
        .find(|d| u32::from(d.handle) == handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bt_uuid::from_u16;
    use crate::platform::ServiceType;

    fn battery_service() -> ServiceInfo {
        ServiceInfo {
            handle: 0x10,
            service_type: ServiceType::Primary,
            uuid: from_u16(0x180f),
            included_services: vec![ServiceInfo {
                handle: 0x20,
                service_type: ServiceType::Secondary,
                uuid: from_u16(0x1801),
                included_services: Vec::new(),
                characteristics: Vec::new(),
            }],
            characteristics: vec![CharacteristicInfo {
                handle: 0x12,
                uuid: from_u16(0x2a19),
                properties: 0x12,
                permissions: 0x01,
                descriptors: vec![DescriptorInfo {
                    handle: 0x13,
                    uuid: from_u16(0x2902),
                    permissions: 0x11,
                }],
            }],
        }
    }

    #[test]
    fn flattens_service_tree() {
        let services = services_to_proto(&[battery_service()]);
        assert_eq!(services.len(), 1);

        let battery = &services[0];
        assert_eq!(battery.handle, 0x10);
        assert_eq!(battery.r#type, 0);
        assert_eq!(battery.uuid, "0000180f-0000-1000-8000-00805f9b34fb");
        assert_eq!(battery.included_services.len(), 1);
        assert_eq!(battery.included_services[0].r#type, 1);

        let level = &battery.characteristics[0];
        assert_eq!(level.handle, 0x12);
        assert_eq!(level.properties, 0x12);
        assert_eq!(level.permissions, 0x01);
        assert_eq!(level.descriptors[0].handle, 0x13);
        assert_eq!(level.descriptors[0].uuid, "00002902-0000-1000-8000-00805f9b34fb");
    }

    #[test]
    fn include_nesting_is_capped() {
        let mut service = battery_service();
        for _ in 0..MAX_INCLUDE_DEPTH + 4 {
            let mut outer = battery_service();
            outer.included_services = vec![service];
            service = outer;
        }

        let flattened = services_to_proto(&[service]);
        let mut depth = 0;
        let mut level = &flattened;
        while let Some(s) = level.first() {
            depth += 1;
            level = &s.included_services;
        }
        assert_eq!(depth, MAX_INCLUDE_DEPTH);
    }

    #[test]
    fn handle_lookups() {
        let services = vec![battery_service()];
        assert_eq!(find_characteristic(&services, 0x12).map(|c| c.uuid), Some(from_u16(0x2a19)));
        assert!(find_characteristic(&services, 0x13).is_none());
        assert_eq!(find_descriptor(&services, 0x13).map(|d| d.permissions), Some(0x11));
        assert!(find_descriptor(&services, 0x1_0013).is_none());
    }
}
