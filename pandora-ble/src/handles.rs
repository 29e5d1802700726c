//! Synthesized attribute handles
//!
//! btleplug reports services and characteristics as sets ordered by UUID, so
//! handles follow UUID order rather than the remote's attribute order. Within
//! that order they are laid out like an ATT database: one handle for the
//! service declaration, then for every characteristic a declaration handle
//! and a value handle, then one handle per descriptor. The handle reported
//! for a characteristic is its value handle.

use std::collections::BTreeMap;

use btleplug::api::{Characteristic, Descriptor, Service};
use pandora_gatt::{CharacteristicInfo, DescriptorInfo, ServiceInfo, ServiceType};
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct HandleTable {
    services: Vec<ServiceInfo>,
    characteristics: BTreeMap<u16, Characteristic>,
    descriptors: BTreeMap<u16, Descriptor>,
}

impl HandleTable {
    pub fn build<'a>(services: impl IntoIterator<Item = &'a Service>) -> Self {
        let mut table = HandleTable::default();
        let mut next: u16 = 1;

        for service in services {
            let service_handle = next;
            next = next.saturating_add(1);

            let mut characteristics = Vec::new();
            for characteristic in &service.characteristics {
                let value_handle = next.saturating_add(1);
                next = next.saturating_add(2);

                let mut descriptors = Vec::new();
                for descriptor in &characteristic.descriptors {
                    descriptors.push(DescriptorInfo {
                        handle: next,
                        uuid: descriptor.uuid,
                        permissions: 0,
                    });
                    table.descriptors.insert(next, descriptor.clone());
                    next = next.saturating_add(1);
                }

                characteristics.push(CharacteristicInfo {
                    handle: value_handle,
                    uuid: characteristic.uuid,
                    properties: u32::from(characteristic.properties.bits()),
                    // btleplug does not report permissions
                    permissions: 0,
                    descriptors,
                });
                table
                    .characteristics
                    .insert(value_handle, characteristic.clone());
            }

            table.services.push(ServiceInfo {
                handle: service_handle,
                service_type: if service.primary {
                    ServiceType::Primary
                } else {
                    ServiceType::Secondary
                },
                uuid: service.uuid,
                included_services: Vec::new(),
                characteristics,
            });
        }

        table
    }

    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    pub fn characteristic(&self, handle: u16) -> Option<&Characteristic> {
        self.characteristics.get(&handle)
    }

    pub fn descriptor(&self, handle: u16) -> Option<&Descriptor> {
        self.descriptors.get(&handle)
    }

    /// First characteristic with `uuid` whose value handle is in the range.
    pub fn find_by_uuid(&self, uuid: Uuid, start: u16, end: u16) -> Option<(u16, &Characteristic)> {
        if start > end {
            return None;
        }
        self.characteristics
            .range(start..=end)
            .find(|(_, c)| c.uuid == uuid)
            .map(|(handle, c)| (*handle, c))
    }
}
