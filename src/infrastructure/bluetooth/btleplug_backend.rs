//! btleplug-backed BLE adapter for Linux, macOS and Windows.

use crate::domain::models::Advertisement;
use crate::infrastructure::bluetooth::adapter::{
    AdapterError, AdvertisementStream, BleAdapter, BlePeripheral, CharacteristicInfo, ServiceInfo,
};
use crate::infrastructure::bluetooth::protocol::MAX_WRITE_LEN;
use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use tracing::{debug, info};
use uuid::Uuid;

/// The first Bluetooth adapter reported by the platform.
#[derive(Clone)]
pub struct BtleplugAdapter {
    adapter: Adapter,
}

impl BtleplugAdapter {
    pub async fn new() -> Result<Self, AdapterError> {
        let manager = Manager::new()
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        let adapters = manager
            .adapters()
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::Unavailable("No Bluetooth adapter found".to_string()))?;
        Ok(Self { adapter })
    }

    async fn find_peripheral(&self, address: &str) -> Result<Peripheral, AdapterError> {
        let peripherals = self
            .adapter
            .peripherals()
            .await
            .map_err(|e| AdapterError::operation("list peripherals", e))?;

        peripherals
            .into_iter()
            .find(|p| p.address().to_string().eq_ignore_ascii_case(address))
            .ok_or_else(|| AdapterError::UnknownPeripheral(address.to_string()))
    }
}

async fn advertisement(adapter: Adapter, event: CentralEvent) -> Option<Advertisement> {
    let id = match event {
        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
        _ => return None,
    };

    let peripheral = adapter.peripheral(&id).await.ok()?;
    let props = peripheral.properties().await.ok().flatten();
    Some(Advertisement {
        address: peripheral.address().to_string(),
        local_name: props.as_ref().and_then(|p| p.local_name.clone()),
        rssi: props.and_then(|p| p.rssi),
    })
}

#[async_trait]
impl BleAdapter for BtleplugAdapter {
    type Peripheral = BtleplugPeripheral;

    async fn enable(&self) -> Result<(), AdapterError> {
        // btleplug has no power control; probing the adapter confirms it is reachable
        let info = self
            .adapter
            .adapter_info()
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;
        info!("Using Bluetooth adapter: {}", info);
        Ok(())
    }

    async fn disable(&self) -> Result<(), AdapterError> {
        self.stop_scan().await
    }

    async fn scan(&self) -> Result<AdvertisementStream, AdapterError> {
        let events = self
            .adapter
            .events()
            .await
            .map_err(|e| AdapterError::operation("subscribe to adapter events", e))?;
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| AdapterError::operation("start scan", e))?;

        let adapter = self.adapter.clone();
        let stream = events.filter_map(move |event| advertisement(adapter.clone(), event));
        Ok(stream.boxed())
    }

    async fn stop_scan(&self) -> Result<(), AdapterError> {
        self.adapter
            .stop_scan()
            .await
            .map_err(|e| AdapterError::operation("stop scan", e))
    }

    async fn connect(&self, address: &str) -> Result<Self::Peripheral, AdapterError> {
        let peripheral = self.find_peripheral(address).await?;
        peripheral
            .connect()
            .await
            .map_err(|e| AdapterError::operation("connect", e))?;
        Ok(BtleplugPeripheral { peripheral })
    }
}

/// A connected btleplug peripheral.
pub struct BtleplugPeripheral {
    peripheral: Peripheral,
}

impl BtleplugPeripheral {
    fn characteristic(&self, info: &CharacteristicInfo) -> Result<Characteristic, AdapterError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == info.uuid && c.service_uuid == info.service_uuid)
            .ok_or_else(|| AdapterError::Operation {
                operation: "lookup characteristic",
                message: format!("{} is not present on the peripheral", info.uuid),
            })
    }
}

#[async_trait]
impl BlePeripheral for BtleplugPeripheral {
    async fn discover_services(&self, uuids: &[Uuid]) -> Result<Vec<ServiceInfo>, AdapterError> {
        self.peripheral
            .discover_services()
            .await
            .map_err(|e| AdapterError::operation("discover services", e))?;

        let services: Vec<ServiceInfo> = self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| uuids.contains(&s.uuid))
            .map(|s| ServiceInfo { uuid: s.uuid })
            .collect();
        debug!("Found {} matching services", services.len());
        Ok(services)
    }

    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
        uuids: &[Uuid],
    ) -> Result<Vec<CharacteristicInfo>, AdapterError> {
        let characteristics = self
            .peripheral
            .services()
            .into_iter()
            .filter(|s| s.uuid == service.uuid)
            .flat_map(|s| s.characteristics)
            .filter(|c| uuids.contains(&c.uuid))
            .map(|c| CharacteristicInfo {
                uuid: c.uuid,
                service_uuid: c.service_uuid,
            })
            .collect();
        Ok(characteristics)
    }

    async fn mtu(&self, _characteristic: &CharacteristicInfo) -> Result<u16, AdapterError> {
        // btleplug does not expose the negotiated ATT MTU
        Ok(MAX_WRITE_LEN as u16)
    }

    async fn write_without_response(
        &self,
        characteristic: &CharacteristicInfo,
        data: &[u8],
    ) -> Result<(), AdapterError> {
        let characteristic = self.characteristic(characteristic)?;
        self.peripheral
            .write(&characteristic, data, WriteType::WithoutResponse)
            .await
            .map_err(|e| AdapterError::operation("write without response", e))
    }

    async fn disconnect(&self) -> Result<(), AdapterError> {
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| AdapterError::operation("disconnect", e))
    }
}
