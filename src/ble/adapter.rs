//! BLE adapter abstraction.
//!
//! The [`BleAdapter`] trait is the capability boundary between this crate
//! and the host's native BLE stack: scanning, connecting, service discovery,
//! characteristic access, and notification delivery. The production
//! implementation is [`BtleplugAdapter`]; tests substitute scripted fakes.

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::StreamExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A peripheral surfaced during scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiscoveredDevice {
    /// Opaque platform identifier.
    pub id: String,
    /// Advertised local name, if any.
    pub name: Option<String>,
    /// Signal strength in dBm, if reported.
    pub rssi: Option<i16>,
}

impl DiscoveredDevice {
    /// The name to show for this device, falling back to its identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Capability flags of a GATT characteristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacteristicProperties {
    /// Supports read.
    pub readable: bool,
    /// Supports write (with or without response).
    pub writable: bool,
    /// Supports notifications.
    pub notifiable: bool,
    /// Supports indications.
    pub indicatable: bool,
}

/// A GATT characteristic as discovered on a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GattCharacteristic {
    /// The characteristic UUID.
    pub uuid: Uuid,
    /// Capability flags.
    pub properties: CharacteristicProperties,
}

/// A GATT service with its characteristics, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GattService {
    /// The service UUID.
    pub uuid: Uuid,
    /// The characteristics belonging to this service.
    pub characteristics: Vec<GattCharacteristic>,
}

/// A value notification received from a subscribed characteristic.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Identifier of the peripheral that sent the notification.
    pub device_id: String,
    /// UUID of the characteristic that sent the notification.
    pub characteristic_uuid: Uuid,
    /// The notification payload.
    pub data: Vec<u8>,
}

/// Capability interface over the host BLE stack.
///
/// Asynchronous out-of-band events (discoveries, unexpected disconnects,
/// notifications) are delivered over broadcast channels rather than raw
/// callbacks so consumers can `select!` on them.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    /// Verify the adapter is present and usable.
    async fn initialize(&self) -> Result<()>;

    /// Begin peripheral discovery. Discoveries arrive on [`Self::scan_events`].
    async fn start_scan(&self) -> Result<()>;

    /// End peripheral discovery.
    async fn stop_scan(&self) -> Result<()>;

    /// Subscribe to discovery events.
    fn scan_events(&self) -> broadcast::Receiver<DiscoveredDevice>;

    /// Connect to a peripheral and discover its services.
    async fn connect(&self, device_id: &str) -> Result<()>;

    /// Disconnect from a peripheral.
    async fn disconnect(&self, device_id: &str) -> Result<()>;

    /// Subscribe to unexpected-disconnect events, carrying the device id.
    fn disconnect_events(&self) -> broadcast::Receiver<String>;

    /// The services discovered on a connected peripheral.
    async fn services(&self, device_id: &str) -> Result<Vec<GattService>>;

    /// Read a characteristic value.
    async fn read(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Vec<u8>>;

    /// Write a characteristic value.
    async fn write(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        payload: &[u8],
    ) -> Result<()>;

    /// Subscribe to notifications from a characteristic.
    async fn subscribe(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<()>;

    /// Subscribe to value notifications from all subscribed characteristics.
    fn notifications(&self) -> broadcast::Receiver<Notification>;
}

/// Production [`BleAdapter`] backed by btleplug.
pub struct BtleplugAdapter {
    /// The platform BLE adapter.
    adapter: Adapter,
    /// Peripherals seen so far, by identifier.
    peripherals: Arc<RwLock<HashMap<String, Peripheral>>>,
    /// Channel for discovery events.
    scan_tx: broadcast::Sender<DiscoveredDevice>,
    /// Channel for disconnect events.
    disconnect_tx: broadcast::Sender<String>,
    /// Channel for value notifications.
    notify_tx: broadcast::Sender<Notification>,
}

impl BtleplugAdapter {
    /// Create an adapter over the first available Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let manager = Manager::new().await.map_err(|_e| Error::AdapterUnavailable)?;

        let adapters = manager.adapters().await.map_err(Error::Bluetooth)?;

        let adapter = adapters
            .into_iter()
            .next()
            .ok_or(Error::AdapterUnavailable)?;

        info!(
            "Using Bluetooth adapter: {:?}",
            adapter.adapter_info().await.ok()
        );

        let (scan_tx, _) = broadcast::channel(100);
        let (disconnect_tx, _) = broadcast::channel(16);
        let (notify_tx, _) = broadcast::channel(256);

        let this = Self {
            adapter,
            peripherals: Arc::new(RwLock::new(HashMap::new())),
            scan_tx,
            disconnect_tx,
            notify_tx,
        };
        this.spawn_event_pump();

        Ok(this)
    }

    /// Forward central events to the discovery and disconnect channels.
    fn spawn_event_pump(&self) {
        let adapter = self.adapter.clone();
        let peripherals = self.peripherals.clone();
        let scan_tx = self.scan_tx.clone();
        let disconnect_tx = self.disconnect_tx.clone();

        tokio::spawn(async move {
            let mut events = match adapter.events().await {
                Ok(events) => events,
                Err(e) => {
                    error!("Failed to get adapter events: {}", e);
                    return;
                }
            };

            while let Some(event) = events.next().await {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        Self::process_peripheral(&adapter, id, &peripherals, &scan_tx).await;
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        debug!("Device disconnected: {:?}", id);
                        let _ = disconnect_tx.send(id.to_string());
                    }
                    _ => {}
                }
            }

            debug!("Central event stream ended");
        });
    }

    /// Resolve a discovered or updated peripheral and surface it.
    async fn process_peripheral(
        adapter: &Adapter,
        id: btleplug::platform::PeripheralId,
        peripherals: &Arc<RwLock<HashMap<String, Peripheral>>>,
        scan_tx: &broadcast::Sender<DiscoveredDevice>,
    ) {
        let peripheral = match adapter.peripheral(&id).await {
            Ok(p) => p,
            Err(e) => {
                trace!("Failed to get peripheral: {}", e);
                return;
            }
        };

        let properties = match peripheral.properties().await {
            Ok(Some(p)) => p,
            _ => return,
        };

        let identifier = id.to_string();
        peripherals.write().insert(identifier.clone(), peripheral);

        let _ = scan_tx.send(DiscoveredDevice {
            id: identifier,
            name: properties.local_name,
            rssi: properties.rssi,
        });
    }

    fn peripheral(&self, device_id: &str) -> Result<Peripheral> {
        self.peripherals
            .read()
            .get(device_id)
            .cloned()
            .ok_or_else(|| Error::DeviceNotFound {
                identifier: device_id.to_string(),
            })
    }

    fn find_characteristic(
        peripheral: &Peripheral,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<btleplug::api::Characteristic> {
        let service = peripheral
            .services()
            .into_iter()
            .find(|s| s.uuid == service_uuid)
            .ok_or_else(|| Error::ServiceNotFound {
                uuid: service_uuid.to_string(),
            })?;

        service
            .characteristics
            .into_iter()
            .find(|c| c.uuid == characteristic_uuid)
            .ok_or_else(|| Error::CharacteristicNotFound {
                uuid: characteristic_uuid.to_string(),
            })
    }

    fn convert_properties(flags: CharPropFlags) -> CharacteristicProperties {
        CharacteristicProperties {
            readable: flags.contains(CharPropFlags::READ),
            writable: flags.contains(CharPropFlags::WRITE)
                || flags.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE),
            notifiable: flags.contains(CharPropFlags::NOTIFY),
            indicatable: flags.contains(CharPropFlags::INDICATE),
        }
    }
}

#[async_trait]
impl BleAdapter for BtleplugAdapter {
    async fn initialize(&self) -> Result<()> {
        self.adapter
            .adapter_info()
            .await
            .map_err(|_e| Error::AdapterUnavailable)?;
        Ok(())
    }

    async fn start_scan(&self) -> Result<()> {
        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(Error::Bluetooth)
    }

    async fn stop_scan(&self) -> Result<()> {
        self.adapter.stop_scan().await.map_err(Error::Bluetooth)
    }

    fn scan_events(&self) -> broadcast::Receiver<DiscoveredDevice> {
        self.scan_tx.subscribe()
    }

    async fn connect(&self, device_id: &str) -> Result<()> {
        let peripheral = self.peripheral(device_id)?;

        if !peripheral.is_connected().await.unwrap_or(false) {
            peripheral.connect().await.map_err(Error::Bluetooth)?;
        }

        peripheral
            .discover_services()
            .await
            .map_err(Error::Bluetooth)?;

        // Pump this peripheral's notifications into the shared channel.
        // The stream ends when the peripheral disconnects.
        let mut stream = peripheral.notifications().await.map_err(Error::Bluetooth)?;
        let notify_tx = self.notify_tx.clone();
        let id = device_id.to_string();

        tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                trace!(
                    "Notification from {}: {} bytes",
                    notification.uuid,
                    notification.value.len()
                );
                let _ = notify_tx.send(Notification {
                    device_id: id.clone(),
                    characteristic_uuid: notification.uuid,
                    data: notification.value,
                });
            }
            debug!("Notification stream for {} ended", id);
        });

        Ok(())
    }

    async fn disconnect(&self, device_id: &str) -> Result<()> {
        let peripheral = self.peripheral(device_id)?;
        peripheral.disconnect().await.map_err(Error::Bluetooth)
    }

    fn disconnect_events(&self) -> broadcast::Receiver<String> {
        self.disconnect_tx.subscribe()
    }

    async fn services(&self, device_id: &str) -> Result<Vec<GattService>> {
        let peripheral = self.peripheral(device_id)?;

        let services = peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service
                    .characteristics
                    .into_iter()
                    .map(|c| GattCharacteristic {
                        uuid: c.uuid,
                        properties: Self::convert_properties(c.properties),
                    })
                    .collect(),
            })
            .collect();

        Ok(services)
    }

    async fn read(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<Vec<u8>> {
        let peripheral = self.peripheral(device_id)?;
        let characteristic =
            Self::find_characteristic(&peripheral, service_uuid, characteristic_uuid)?;

        let data = peripheral
            .read(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        trace!(
            "Read {} bytes from characteristic {}",
            data.len(),
            characteristic_uuid
        );

        Ok(data)
    }

    async fn write(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        payload: &[u8],
    ) -> Result<()> {
        let peripheral = self.peripheral(device_id)?;
        let characteristic =
            Self::find_characteristic(&peripheral, service_uuid, characteristic_uuid)?;

        peripheral
            .write(&characteristic, payload, WriteType::WithResponse)
            .await
            .map_err(Error::Bluetooth)?;

        trace!(
            "Wrote {} bytes to characteristic {}",
            payload.len(),
            characteristic_uuid
        );

        Ok(())
    }

    async fn subscribe(
        &self,
        device_id: &str,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
    ) -> Result<()> {
        let peripheral = self.peripheral(device_id)?;
        let characteristic =
            Self::find_characteristic(&peripheral, service_uuid, characteristic_uuid)?;

        peripheral
            .subscribe(&characteristic)
            .await
            .map_err(Error::Bluetooth)?;

        debug!("Subscribed to notifications from {}", characteristic_uuid);

        Ok(())
    }

    fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notify_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovered_device_display_name() {
        let named = DiscoveredDevice {
            id: "AA:BB".to_string(),
            name: Some("nRF52833 DK".to_string()),
            rssi: Some(-45),
        };
        assert_eq!(named.display_name(), "nRF52833 DK");

        let unnamed = DiscoveredDevice {
            id: "AA:BB".to_string(),
            name: None,
            rssi: None,
        };
        assert_eq!(unnamed.display_name(), "AA:BB");
    }

    #[test]
    fn test_convert_properties() {
        let props = BtleplugAdapter::convert_properties(
            CharPropFlags::READ | CharPropFlags::NOTIFY,
        );
        assert!(props.readable);
        assert!(props.notifiable);
        assert!(!props.writable);
        assert!(!props.indicatable);

        let props =
            BtleplugAdapter::convert_properties(CharPropFlags::WRITE_WITHOUT_RESPONSE);
        assert!(props.writable);
        assert!(!props.readable);
    }
}
