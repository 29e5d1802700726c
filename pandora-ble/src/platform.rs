use std::sync::Arc;

use btleplug::api::{BDAddr, Central, CentralEvent, Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use pandora_gatt::{GattCallbacks, GattPlatform, PlatformError, PlatformEvent};
use tokio::sync::broadcast;

use crate::client::{BtleplugClient, ClientState};
use crate::{BleError, parse_address};

/// Platform over one local adapter. Peripherals are never connected here; the
/// harness connects them through its host service and hands over the address.
pub struct BtleplugPlatform {
    adapter: Adapter,
    events: broadcast::Sender<PlatformEvent>,
}

impl BtleplugPlatform {
    /// Use the adapter at `index` in the order the OS reports them.
    pub async fn new(index: usize) -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(index)
            .ok_or(BleError::NoAdapter(index))?;

        match adapter.adapter_info().await {
            Ok(info) => tracing::info!(index, %info, "using bluetooth adapter"),
            Err(e) => tracing::warn!(index, error = %e, "could not query adapter info"),
        }

        Ok(Self::with_adapter(adapter))
    }

    pub fn with_adapter(adapter: Adapter) -> Self {
        let (events, _) = broadcast::channel(16);
        Self { adapter, events }
    }
}

async fn find_peripheral(
    adapter: &Adapter,
    address: BDAddr,
) -> Result<Option<Peripheral>, btleplug::Error> {
    Ok(adapter
        .peripherals()
        .await?
        .into_iter()
        .find(|p| p.address() == address))
}

/// Report the peripheral's disconnection once, then stop. Also stops when the
/// instance listening on the callbacks goes away.
async fn watch_connection(adapter: Adapter, id: PeripheralId, state: Arc<ClientState>) {
    let mut events = match adapter.events().await {
        Ok(events) => events,
        Err(e) => {
            tracing::warn!(error = %e, "cannot watch adapter events");
            return;
        }
    };

    loop {
        tokio::select! {
            _ = state.callbacks.closed() => return,
            event = events.next() => match event {
                Some(CentralEvent::DeviceDisconnected(gone)) if gone == id => {
                    tracing::info!(peripheral = ?id, "peripheral disconnected");
                    state.disconnected();
                    return;
                }
                Some(_) => {}
                None => return,
            },
        }
    }
}

impl GattPlatform for BtleplugPlatform {
    type Client = BtleplugClient;

    async fn connect_gatt(
        &self,
        cookie: &[u8],
        callbacks: GattCallbacks,
    ) -> Result<Arc<BtleplugClient>, PlatformError> {
        let address = parse_address(cookie)?;
        let peripheral = find_peripheral(&self.adapter, address)
            .await
            .map_err(BleError::from)?
            .ok_or_else(|| PlatformError::NoConnection(address.to_string()))?;

        if !peripheral.is_connected().await.map_err(BleError::from)? {
            return Err(PlatformError::NoConnection(address.to_string()));
        }

        let state = Arc::new(ClientState::new(callbacks));
        tokio::spawn(watch_connection(
            self.adapter.clone(),
            peripheral.id(),
            state.clone(),
        ));

        tracing::info!(%address, "attached to connected peripheral");
        Ok(Arc::new(BtleplugClient::new(peripheral, state)))
    }

    /// btleplug has no SDP; the advertised service UUIDs stand in for it.
    fn fetch_uuids_with_sdp(&self, address: &[u8]) -> Result<(), PlatformError> {
        let target = parse_address(address)?;
        let adapter = self.adapter.clone();
        let events = self.events.clone();
        let address = address.to_vec();

        tokio::spawn(async move {
            let uuids = match find_peripheral(&adapter, target).await {
                Ok(Some(peripheral)) => match peripheral.properties().await {
                    Ok(props) => props.map(|p| p.services).unwrap_or_default(),
                    Err(e) => {
                        tracing::warn!(%target, error = %e, "cannot read peripheral properties");
                        Vec::new()
                    }
                },
                Ok(None) => {
                    tracing::warn!(%target, "sdp fetch for unknown device");
                    Vec::new()
                }
                Err(e) => {
                    tracing::warn!(%target, error = %e, "cannot list peripherals");
                    Vec::new()
                }
            };

            // nobody listening is fine, the request may have timed out
            let _ = events.send(PlatformEvent::UuidsFetched { address, uuids });
        });
        Ok(())
    }

    fn events(&self) -> broadcast::Receiver<PlatformEvent> {
        self.events.subscribe()
    }
}
