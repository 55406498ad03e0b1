//! btleplug-backed transport implementation.

use async_trait::async_trait;
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Manager, Peripheral};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{PeripheralLink, ServiceTopology, Transport};

/// Production transport over the platform BLE stack.
pub struct BtleTransport {
    manager: Manager,
}

impl BtleTransport {
    /// Create a transport over the platform Bluetooth manager.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform Bluetooth stack cannot be reached.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new()
            .await
            .map_err(|_e| Error::BluetoothUnavailable)?;

        Ok(Self { manager })
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn bluetooth_enabled(&self) -> bool {
        self.manager.adapters().await.is_ok()
    }

    async fn adapter_count(&self) -> Result<usize> {
        let adapters = self.manager.adapters().await.map_err(Error::Bluetooth)?;
        Ok(adapters.len())
    }

    async fn scan(&self, duration: Duration) -> Result<Vec<Arc<dyn PeripheralLink>>> {
        let adapters = self.manager.adapters().await.map_err(Error::Bluetooth)?;
        let adapter = adapters.into_iter().next().ok_or(Error::NoAdaptersFound)?;

        info!(
            "Scanning for {:?} on adapter {:?}",
            duration,
            adapter.adapter_info().await.ok()
        );

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)?;

        tokio::time::sleep(duration).await;

        adapter.stop_scan().await.map_err(Error::Bluetooth)?;

        let peripherals = adapter.peripherals().await.map_err(Error::Bluetooth)?;
        debug!("Scan finished, {} peripherals seen", peripherals.len());

        let mut links: Vec<Arc<dyn PeripheralLink>> = Vec::with_capacity(peripherals.len());
        for peripheral in peripherals {
            let identifier = match peripheral.properties().await {
                Ok(Some(props)) => props.local_name.unwrap_or_default(),
                _ => String::new(),
            };
            links.push(Arc::new(BtlePeripheral {
                identifier,
                peripheral,
            }));
        }

        Ok(links)
    }
}

/// One physical peripheral seen during a scan.
pub struct BtlePeripheral {
    identifier: String,
    peripheral: Peripheral,
}

impl BtlePeripheral {
    /// Locate a characteristic within a discovered service.
    fn find_characteristic(&self, service: Uuid, characteristic: Uuid) -> Result<Characteristic> {
        let services = self.peripheral.services();

        let service = services
            .iter()
            .find(|s| s.uuid == service)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: service.to_string(),
            })?;

        service
            .characteristics
            .iter()
            .find(|c| c.uuid == characteristic)
            .cloned()
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic.to_string(),
            })
    }
}

#[async_trait]
impl PeripheralLink for BtlePeripheral {
    fn address(&self) -> String {
        self.peripheral.address().to_string()
    }

    fn identifier(&self) -> String {
        self.identifier.clone()
    }

    async fn connect(&self) -> Result<()> {
        if !self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral.connect().await.map_err(Error::Bluetooth)?;
            debug!("Connected to {}", self.identifier);
        }

        // GATT access below needs the service table populated.
        self.peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        if self.peripheral.is_connected().await.unwrap_or(false) {
            self.peripheral
                .disconnect()
                .await
                .map_err(Error::Bluetooth)?;
            debug!("Disconnected from {}", self.identifier);
        }

        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn service_topology(&self) -> Result<Vec<ServiceTopology>> {
        if !self.is_connected().await {
            return Err(Error::NotConnected);
        }

        Ok(self
            .peripheral
            .services()
            .into_iter()
            .map(|s| ServiceTopology {
                service: s.uuid,
                characteristics: s.characteristics.into_iter().map(|c| c.uuid).collect(),
            })
            .collect())
    }

    async fn read(&self, service: Uuid, characteristic: Uuid) -> Result<Vec<u8>> {
        let characteristic = self.find_characteristic(service, characteristic)?;

        let data = self
            .peripheral
            .read(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        trace!(
            "Read {} bytes from {} on {}",
            data.len(),
            characteristic.uuid,
            self.identifier
        );

        Ok(data)
    }

    async fn write_request(
        &self,
        service: Uuid,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()> {
        let characteristic = self.find_characteristic(service, characteristic)?;

        self.peripheral
            .write(&characteristic, value, WriteType::WithResponse)
            .await
            .map_err(Error::Bluetooth)?;

        trace!(
            "Wrote {} bytes to {} on {}",
            value.len(),
            characteristic.uuid,
            self.identifier
        );

        Ok(())
    }
}
