//! `pandora.GATT` request handlers
//!
//! Each handler looks up the connection, invokes one platform call, waits for
//! its callback when there is one, and shapes the response. Failures are
//! forwarded as gRPC statuses without retry.

use std::sync::Arc;
use std::time::Duration;

use pandora_proto::gatt::{
    AttStatusCode, ClearCacheRequest, DiscoverServiceByUuidRequest, DiscoverServicesRequest,
    DiscoverServicesResponse, DiscoverServicesSdpRequest, DiscoverServicesSdpResponse, Empty,
    ExchangeMtuRequest, ReadCharacteristicDescriptorRequest, ReadCharacteristicDescriptorResponse,
    ReadCharacteristicFromUuidRequest, ReadCharacteristicRequest, ReadCharacteristicResponse,
    WriteCharacteristicRequest,
};
use pandora_proto::{Gatt, GattServer};
use tokio::sync::broadcast;
use tonic::{Request, Response, Status};

use crate::bt_uuid::parse_uuid;
use crate::instance::{GattInstance, cookie_str};
use crate::platform::{GattClient, GattPlatform, PlatformEvent};
use crate::registry::Connections;
use crate::topology::{find_characteristic, find_descriptor, services_to_proto};
use crate::{Config, GattError};

pub struct GattService<P: GattPlatform> {
    connections: Connections<P>,
    discovery_by_uuid_delay: Duration,
}

impl<P: GattPlatform> GattService<P> {
    pub fn new(platform: Arc<P>, config: &Config) -> Self {
        Self {
            connections: Connections::new(platform, config.callback_timeout()),
            discovery_by_uuid_delay: config.discovery_by_uuid_delay(),
        }
    }

    pub fn into_server(self) -> GattServer<Self> {
        GattServer::new(self)
    }

    pub fn connections(&self) -> &Connections<P> {
        &self.connections
    }

    async fn handle_exchange_mtu(&self, request: ExchangeMtuRequest) -> Result<Empty, GattError> {
        tracing::info!(mtu = request.mtu, "exchange_mtu");
        // the platform clamps or refuses out of range values itself
        let mtu = u16::try_from(request.mtu).map_err(|_| GattError::InvalidMtu(request.mtu))?;

        let instance = self.connections.get(request.connection.as_ref()).await?;
        let negotiated = instance.request_mtu_blocking(mtu).await?;
        tracing::info!(requested = mtu, negotiated, "mtu exchanged");
        Ok(Empty {})
    }

    async fn handle_write_characteristic_from_handle(
        &self,
        request: WriteCharacteristicRequest,
    ) -> Result<Empty, GattError> {
        tracing::info!(handle = request.handle, "write_characteristic_from_handle");
        let instance = self.connections.get(request.connection.as_ref()).await?;
        let handle = characteristic_handle(&*instance, request.handle).await?;
        instance
            .write_characteristic_blocking(handle, &request.value)
            .await?;
        Ok(Empty {})
    }

    async fn handle_discover_service_by_uuid(
        &self,
        request: DiscoverServiceByUuidRequest,
    ) -> Result<DiscoverServicesResponse, GattError> {
        tracing::info!(uuid = %request.uuid, "discover_service_by_uuid");
        let uuid = parse_uuid(&request.uuid)?;
        let instance = self.connections.get(request.connection.as_ref()).await?;

        // The platform may still be running the discovery it started on
        // connection and gives no way to tell, so let it settle first.
        tokio::time::sleep(self.discovery_by_uuid_delay).await;
        instance.client().discover_service_by_uuid(uuid)?;

        // The platform call reports neither a callback nor services.
        Ok(DiscoverServicesResponse::default())
    }

    async fn handle_discover_services(
        &self,
        request: DiscoverServicesRequest,
    ) -> Result<DiscoverServicesResponse, GattError> {
        tracing::info!("discover_services");
        let instance = self.connections.get(request.connection.as_ref()).await?;
        instance.discover_services().await?;
        Ok(DiscoverServicesResponse {
            services: services_to_proto(&instance.services()),
        })
    }

    async fn handle_discover_services_sdp(
        &self,
        request: DiscoverServicesSdpRequest,
    ) -> Result<DiscoverServicesSdpResponse, GattError> {
        tracing::info!(address = %cookie_str(&request.address), "discover_services_sdp");
        let platform = self.connections.platform();

        // subscribe before starting so the result cannot slip past us
        let mut events = platform.events();
        platform.fetch_uuids_with_sdp(&request.address)?;

        let timeout = self.connections.callback_timeout();
        let uuids = tokio::time::timeout(timeout, async {
            loop {
                match events.recv().await {
                    Ok(PlatformEvent::UuidsFetched { address, uuids })
                        if address == request.address =>
                    {
                        return Ok(uuids);
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "platform event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Err(GattError::Disconnected),
                }
            }
        })
        .await
        .map_err(|_| GattError::Timeout("sdp uuid fetch".to_string()))??;

        Ok(DiscoverServicesSdpResponse {
            service_uuids: uuids.iter().map(|u| u.to_string()).collect(),
        })
    }

    async fn handle_clear_cache(&self, request: ClearCacheRequest) -> Result<Empty, GattError> {
        tracing::info!("clear_cache");
        let instance = self.connections.get(request.connection.as_ref()).await?;
        instance.refresh()?;
        Ok(Empty {})
    }

    async fn handle_read_characteristic_from_handle(
        &self,
        request: ReadCharacteristicRequest,
    ) -> Result<ReadCharacteristicResponse, GattError> {
        tracing::info!(handle = request.handle, "read_characteristic_from_handle");
        let instance = self.connections.get(request.connection.as_ref()).await?;
        let handle = characteristic_handle(&*instance, request.handle).await?;
        let read = instance.read_characteristic_blocking(handle).await?;
        Ok(ReadCharacteristicResponse {
            value: read.value,
            status: AttStatusCode::from_status(read.status) as i32,
        })
    }

    async fn handle_read_characteristic_from_uuid(
        &self,
        request: ReadCharacteristicFromUuidRequest,
    ) -> Result<ReadCharacteristicResponse, GattError> {
        tracing::info!(
            uuid = %request.uuid,
            start = request.start_handle,
            end = request.end_handle,
            "read_characteristic_from_uuid"
        );
        let uuid = parse_uuid(&request.uuid)?;
        let (start, end) = handle_range(request.start_handle, request.end_handle)?;

        let instance = self.connections.get(request.connection.as_ref()).await?;
        instance.try_discover_services().await?;
        let read = instance
            .read_characteristic_uuid_blocking(uuid, start, end)
            .await?;
        Ok(ReadCharacteristicResponse {
            value: read.value,
            status: AttStatusCode::from_status(read.status) as i32,
        })
    }

    async fn handle_read_characteristic_descriptor_from_handle(
        &self,
        request: ReadCharacteristicDescriptorRequest,
    ) -> Result<ReadCharacteristicDescriptorResponse, GattError> {
        tracing::info!(handle = request.handle, "read_characteristic_descriptor_from_handle");
        let instance = self.connections.get(request.connection.as_ref()).await?;
        instance.try_discover_services().await?;
        let handle = find_descriptor(&instance.services(), request.handle)
            .map(|d| d.handle)
            .ok_or(GattError::DescriptorNotFound(request.handle))?;

        let read = instance.read_descriptor_blocking(handle).await?;
        Ok(ReadCharacteristicDescriptorResponse {
            value: read.value,
            status: AttStatusCode::from_status(read.status) as i32,
        })
    }
}

/// Discover if needed, then resolve a characteristic handle.
async fn characteristic_handle<C: GattClient>(
    instance: &GattInstance<C>,
    handle: u32,
) -> Result<u16, GattError> {
    instance.try_discover_services().await?;
    find_characteristic(&instance.services(), handle)
        .map(|c| c.handle)
        .ok_or(GattError::CharacteristicNotFound(handle))
}

/// Range as ATT handles. Empty or reversed ranges go to the remote, which
/// answers them with an ATT status.
fn handle_range(start: u32, end: u32) -> Result<(u16, u16), GattError> {
    let invalid = || GattError::InvalidHandleRange { start, end };
    let s = u16::try_from(start).map_err(|_| invalid())?;
    let e = u16::try_from(end).map_err(|_| invalid())?;
    Ok((s, e))
}

fn reply<T>(method: &'static str, result: Result<T, GattError>) -> Result<Response<T>, Status> {
    match result {
        Ok(message) => Ok(Response::new(message)),
        Err(e) => {
            tracing::error!(method, error = %e, "request failed");
            Err(e.into())
        }
    }
}

#[tonic::async_trait]
impl<P: GattPlatform> Gatt for GattService<P> {
    async fn exchange_mtu(
        &self,
        request: Request<ExchangeMtuRequest>,
    ) -> Result<Response<Empty>, Status> {
        reply("ExchangeMTU", self.handle_exchange_mtu(request.into_inner()).await)
    }

    async fn write_characteristic_from_handle(
        &self,
        request: Request<WriteCharacteristicRequest>,
    ) -> Result<Response<Empty>, Status> {
        reply(
            "WriteCharacteristicFromHandle",
            self.handle_write_characteristic_from_handle(request.into_inner()).await,
        )
    }

    async fn discover_service_by_uuid(
        &self,
        request: Request<DiscoverServiceByUuidRequest>,
    ) -> Result<Response<DiscoverServicesResponse>, Status> {
        reply(
            "DiscoverServiceByUuid",
            self.handle_discover_service_by_uuid(request.into_inner()).await,
        )
    }

    async fn discover_services(
        &self,
        request: Request<DiscoverServicesRequest>,
    ) -> Result<Response<DiscoverServicesResponse>, Status> {
        reply("DiscoverServices", self.handle_discover_services(request.into_inner()).await)
    }

    async fn discover_services_sdp(
        &self,
        request: Request<DiscoverServicesSdpRequest>,
    ) -> Result<Response<DiscoverServicesSdpResponse>, Status> {
        reply(
            "DiscoverServicesSdp",
            self.handle_discover_services_sdp(request.into_inner()).await,
        )
    }

    async fn clear_cache(
        &self,
        request: Request<ClearCacheRequest>,
    ) -> Result<Response<Empty>, Status> {
        reply("ClearCache", self.handle_clear_cache(request.into_inner()).await)
    }

    async fn read_characteristic_from_handle(
        &self,
        request: Request<ReadCharacteristicRequest>,
    ) -> Result<Response<ReadCharacteristicResponse>, Status> {
        reply(
            "ReadCharacteristicFromHandle",
            self.handle_read_characteristic_from_handle(request.into_inner()).await,
        )
    }

    async fn read_characteristic_from_uuid(
        &self,
        request: Request<ReadCharacteristicFromUuidRequest>,
    ) -> Result<Response<ReadCharacteristicResponse>, Status> {
        reply(
            "ReadCharacteristicFromUuid",
            self.handle_read_characteristic_from_uuid(request.into_inner()).await,
        )
    }

    async fn read_characteristic_descriptor_from_handle(
        &self,
        request: Request<ReadCharacteristicDescriptorRequest>,
    ) -> Result<Response<ReadCharacteristicDescriptorResponse>, Status> {
        reply(
            "ReadCharacteristicDescriptorFromHandle",
            self.handle_read_characteristic_descriptor_from_handle(request.into_inner())
                .await,
        )
    }
}
