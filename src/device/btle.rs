use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, CentralState, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::stream::{BoxStream, StreamExt};
use futures::future;
use log::{debug, info, warn};
use tokio::time::{sleep, Duration};

use crate::device::constants::WRITE_DEADLINE;
use crate::device::transport::{Link, Radio};
use crate::device::types::{AdapterState, CharacteristicRef, DeviceDescriptor, DeviceId, RadioEvent};
use crate::error::DeviceError;

fn device_id(id: &PeripheralId) -> DeviceId {
    format!("{:?}", id)
}

fn adapter_state(state: CentralState) -> AdapterState {
    match state {
        CentralState::PoweredOn => AdapterState::PoweredOn,
        CentralState::PoweredOff => AdapterState::PoweredOff,
        #[allow(unreachable_patterns)]
        _ => AdapterState::Unknown,
    }
}

async fn describe(adapter: &Adapter, id: &PeripheralId) -> Option<DeviceDescriptor> {
    let peripheral = match adapter.peripheral(id).await {
        Ok(v) => v,
        Err(err) => {
            debug!("Advertised peripheral vanished before it could be queried: {:?}", err);
            return None;
        },
    };

    match peripheral.properties().await {
        Err(err) => {
            warn!("Could not query peripheral for properties: {:?}", err);
            None
        },
        Ok(properties) => Some(DeviceDescriptor {
            id: device_id(id),
            name: properties.and_then(|properties| properties.local_name),
        }),
    }
}

/// The first adapter of the platform's btleplug manager.
pub struct BtleRadio {
    // the adapter is only valid while its manager is alive
    _manager: Manager,
    adapter: Adapter,
}

impl BtleRadio {
    pub async fn new() -> Result<Self, DeviceError> {
        let manager = Manager::new().await?;
        let adapter = manager.adapters().await?
            .into_iter()
            .next()
            .ok_or(DeviceError::AdapterUnavailable)?;

        info!("Using adapter {}", adapter.adapter_info().await.unwrap_or("UNKNOWN".to_string()));
        Ok(BtleRadio { _manager: manager, adapter })
    }

    async fn find_peripheral(&self, id: &DeviceId) -> Result<Peripheral, DeviceError> {
        self.adapter.peripherals().await?
            .into_iter()
            .find(|peripheral| &device_id(&peripheral.id()) == id)
            .ok_or_else(|| DeviceError::UnknownPeripheral(id.clone()))
    }
}

#[async_trait]
impl Radio for BtleRadio {
    type Link = BtleLink;

    async fn adapter_state(&self) -> Result<AdapterState, DeviceError> {
        Ok(adapter_state(self.adapter.adapter_state().await?))
    }

    async fn adapter_events(&self) -> Result<BoxStream<'static, AdapterState>, DeviceError> {
        let events = self.adapter.events().await?;

        Ok(events
            .filter_map(|event| future::ready(match event {
                CentralEvent::StateUpdate(state) => Some(adapter_state(state)),
                _ => None,
            }))
            .boxed())
    }

    async fn device_events(&self) -> Result<BoxStream<'static, RadioEvent>, DeviceError> {
        let events = self.adapter.events().await?;
        let adapter = self.adapter.clone();

        Ok(events
            .filter_map(move |event| {
                let adapter = adapter.clone();
                async move {
                    match event {
                        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                            describe(&adapter, &id).await.map(RadioEvent::DeviceFound)
                        },
                        CentralEvent::DeviceDisconnected(id) => Some(RadioEvent::DeviceDisconnected(device_id(&id))),
                        _ => None,
                    }
                }
            })
            .boxed())
    }

    async fn start_scan(&self) -> Result<(), DeviceError> {
        self.adapter.start_scan(ScanFilter::default()).await?;
        Ok(())
    }

    async fn stop_scan(&self) -> Result<(), DeviceError> {
        self.adapter.stop_scan().await?;
        Ok(())
    }

    async fn link(&self, device: &DeviceDescriptor) -> Result<BtleLink, DeviceError> {
        let peripheral = self.find_peripheral(&device.id).await?;
        Ok(BtleLink { peripheral })
    }

    async fn is_device_connected(&self, id: &DeviceId) -> Result<bool, DeviceError> {
        let peripheral = self.find_peripheral(id).await?;
        Ok(peripheral.is_connected().await?)
    }

    fn release(&self) {
        // btleplug has no explicit teardown, the adapter is freed when BtleRadio is dropped
        debug!("Released bluetooth adapter");
    }
}

#[derive(Debug, Clone)]
pub struct BtleLink {
    peripheral: Peripheral,
}

impl BtleLink {
    fn characteristic(&self, target: &CharacteristicRef) -> Option<Characteristic> {
        self.peripheral.characteristics()
            .into_iter()
            .find(|c| c.uuid == target.uuid && c.service_uuid == target.service_uuid)
    }
}

#[async_trait]
impl Link for BtleLink {
    fn id(&self) -> DeviceId {
        device_id(&self.peripheral.id())
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.peripheral.connect().await?;
        Ok(())
    }

    async fn discover(&self) -> Result<Vec<CharacteristicRef>, DeviceError> {
        self.peripheral.discover_services().await?;

        Ok(self.peripheral.characteristics()
            .iter()
            .map(|c| CharacteristicRef {
                service_uuid: c.service_uuid,
                uuid: c.uuid,
                writable_with_response: c.properties.contains(CharPropFlags::WRITE),
                writable_without_response: c.properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
            })
            .collect())
    }

    async fn is_connected(&self) -> Result<bool, DeviceError> {
        Ok(self.peripheral.is_connected().await?)
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn write_without_response(&self, target: &CharacteristicRef, payload: &[u8]) -> Result<(), DeviceError> {
        let characteristic = self.characteristic(target)
            .ok_or(DeviceError::Btle { source: btleplug::Error::NoSuchCharacteristic })?;
        let fut = self.peripheral.write(&characteristic, payload, WriteType::WithoutResponse);

        tokio::select! {
            _ = sleep(Duration::from_millis(WRITE_DEADLINE)) => {
                Err(DeviceError::Timeout(Duration::from_millis(WRITE_DEADLINE)))
            }
            result = fut => {
                result?;
                Ok(())
            }
        }
    }
}
