//! Device connection management.
//!
//! The [`ConnectionManager`] owns the lifecycle of a single peripheral
//! session: connect, service discovery, standard-characteristic decoding,
//! bulk reads, notification subscriptions, writes, and disconnect.
//!
//! The workflow runs strictly sequentially. Per-characteristic failures are
//! recovered locally and never abort the remaining characteristics; only
//! connection-level failures (connect failure, unexpected disconnect) tear
//! the session down.

use chrono::Utc;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ble::adapter::{BleAdapter, DiscoveredDevice, GattService};
use crate::ble::uuids::{characteristic_name, service_name, short_uuid};
use crate::error::{Error, Result};
use crate::session::{ConnectionSession, ConnectionStatus, DeviceInformation, NotificationRecord};
use crate::utils::decode_value;

/// Placeholder readout value for a characteristic that failed to read.
pub const ACCESS_DENIED: &str = "access denied";

// 16-bit fragments of the standard characteristics decoded after connecting.
const BATTERY_LEVEL_FRAGMENT: u16 = 0x2A19;
const MODEL_FRAGMENT: u16 = 0x2A24;
const SERIAL_FRAGMENT: u16 = 0x2A25;
const FIRMWARE_FRAGMENT: u16 = 0x2A26;
const HARDWARE_FRAGMENT: u16 = 0x2A27;
const MANUFACTURER_FRAGMENT: u16 = 0x2A29;

/// Event emitted when the session changes.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The connection status changed.
    StatusChanged(ConnectionStatus),
    /// The bulk readout list was refreshed.
    ReadoutsUpdated,
    /// A notification value was appended to the log.
    Notification(NotificationRecord),
}

/// Manages the single active peripheral connection.
pub struct ConnectionManager {
    /// The BLE adapter to communicate through.
    adapter: Arc<dyn BleAdapter>,
    /// The active session, if any. `None` means Disconnected.
    session: Arc<RwLock<Option<ConnectionSession>>>,
    /// Bumped on every connect and disconnect. Workflow steps and watcher
    /// tasks capture the value at spawn time and discard their results once
    /// it moves on.
    epoch: Arc<AtomicU64>,
    /// Channel for session events.
    event_tx: broadcast::Sender<SessionEvent>,
    /// Handle to the unexpected-disconnect watcher task.
    watch_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
    /// Handle to the notification pump task.
    pump_handle: RwLock<Option<tokio::task::JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a new connection manager over the given adapter.
    pub fn new(adapter: Arc<dyn BleAdapter>) -> Self {
        let (event_tx, _) = broadcast::channel(64);

        Self {
            adapter,
            session: Arc::new(RwLock::new(None)),
            epoch: Arc::new(AtomicU64::new(0)),
            event_tx,
            watch_handle: RwLock::new(None),
            pump_handle: RwLock::new(None),
        }
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.session
            .read()
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }

    /// Read-only snapshot of the active session.
    pub fn session(&self) -> Option<ConnectionSession> {
        self.session.read().clone()
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    /// Connect to a discovered device and run the session workflow:
    /// service discovery, standard-characteristic decoding, a bulk read of
    /// every readable characteristic, and notification subscriptions.
    ///
    /// # Errors
    ///
    /// Fails fast without touching the adapter when a session is already
    /// active. Returns [`Error::ConnectionFailed`] when the connect attempt
    /// or service discovery fails and [`Error::ConnectionLost`] when the
    /// device drops mid-workflow.
    pub async fn connect(&self, device: &DiscoveredDevice) -> Result<()> {
        if self.session.read().is_some() {
            return Err(Error::ConnectionFailed {
                reason: "a session is already active".to_string(),
            });
        }

        info!("Connecting to {} ({})", device.display_name(), device.id);

        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        *self.session.write() = Some(ConnectionSession::new(device.clone()));
        self.emit_status(ConnectionStatus::Connecting);

        // Register for disconnect events before the connect is issued so a
        // drop during any workflow step is observed.
        self.spawn_disconnect_watch(device.id.clone(), epoch);

        if let Err(e) = self.adapter.connect(&device.id).await {
            warn!("Connection to {} failed: {}", device.id, e);
            self.teardown(epoch);
            return Err(Error::ConnectionFailed {
                reason: e.to_string(),
            });
        }

        if !self.advance_status(epoch, ConnectionStatus::Connected) {
            return Err(Error::ConnectionLost);
        }

        // (a) service discovery
        let services = match self.adapter.services(&device.id).await {
            Ok(services) => services,
            Err(e) => {
                warn!("Service discovery on {} failed: {}", device.id, e);
                self.teardown(epoch);
                let _ = self.adapter.disconnect(&device.id).await;
                return Err(Error::ConnectionFailed {
                    reason: e.to_string(),
                });
            }
        };

        debug!(
            "Discovered {} services with {} characteristics",
            services.len(),
            services.iter().map(|s| s.characteristics.len()).sum::<usize>()
        );

        if !self.store_services(epoch, services.clone()) {
            return Err(Error::ConnectionLost);
        }

        // (b) standard characteristics, best-effort
        self.read_standard_characteristics(&device.id, &services, epoch)
            .await;

        // (c) bulk read of everything readable
        self.bulk_read(&device.id, &services, epoch).await;

        // (d) notification subscriptions
        self.subscribe_notifiable(&device.id, &services, epoch)
            .await;

        if self.is_current(epoch) {
            info!("Connected to {}", device.display_name());
            Ok(())
        } else {
            Err(Error::ConnectionLost)
        }
    }

    /// Disconnect and clear the session. A no-op when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        let device_id = match self.session.read().as_ref() {
            Some(session) => session.device.id.clone(),
            None => return Ok(()),
        };

        info!("Disconnecting from {}", device_id);

        // Invalidate the session before touching the adapter so any late
        // workflow step discards its results.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.abort_tasks();

        let result = self.adapter.disconnect(&device_id).await;

        Self::clear_session(&self.session, &self.event_tx);

        result
    }

    /// Write a UTF-8 value to a writable characteristic, then refresh the
    /// bulk readouts so displayed values reflect the write.
    ///
    /// # Errors
    ///
    /// Rejected before the adapter is touched when not connected or when the
    /// characteristic is not writable. An adapter failure surfaces as
    /// [`Error::WriteFailed`] and leaves the connection state unchanged.
    pub async fn write(
        &self,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        value: &str,
    ) -> Result<()> {
        let (device_id, services, epoch) = {
            let guard = self.session.read();
            let session = guard
                .as_ref()
                .filter(|s| s.status.is_connected())
                .ok_or(Error::NotConnected)?;

            let service = session
                .services
                .iter()
                .find(|s| s.uuid == service_uuid)
                .ok_or_else(|| Error::ServiceNotFound {
                    uuid: service_uuid.to_string(),
                })?;

            let characteristic = service
                .characteristics
                .iter()
                .find(|c| c.uuid == characteristic_uuid)
                .ok_or_else(|| Error::CharacteristicNotFound {
                    uuid: characteristic_uuid.to_string(),
                })?;

            if !characteristic.properties.writable {
                return Err(Error::NotWritable {
                    uuid: characteristic_uuid.to_string(),
                });
            }

            (
                session.device.id.clone(),
                session.services.clone(),
                self.epoch.load(Ordering::SeqCst),
            )
        };

        self.adapter
            .write(&device_id, service_uuid, characteristic_uuid, value.as_bytes())
            .await
            .map_err(|e| Error::WriteFailed {
                reason: e.to_string(),
            })?;

        debug!("Wrote {:?} to {}", value, characteristic_uuid);

        self.bulk_read(&device_id, &services, epoch).await;

        Ok(())
    }

    /// True while `epoch` still names the live session.
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch && self.session.read().is_some()
    }

    fn emit_status(&self, status: ConnectionStatus) {
        debug!("Connection status: {}", status);
        let _ = self.event_tx.send(SessionEvent::StatusChanged(status));
    }

    /// Set the session status if the session is still live.
    fn advance_status(&self, epoch: u64, status: ConnectionStatus) -> bool {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }

        {
            let mut guard = self.session.write();
            match guard.as_mut() {
                Some(session) => session.status = status,
                None => return false,
            }
        }

        self.emit_status(status);
        true
    }

    /// Store discovered services if the session is still live.
    fn store_services(&self, epoch: u64, services: Vec<GattService>) -> bool {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }

        let mut guard = self.session.write();
        match guard.as_mut() {
            Some(session) => {
                session.services = services;
                true
            }
            None => false,
        }
    }

    /// Drop the session and surface the Disconnected status.
    fn clear_session(
        session: &Arc<RwLock<Option<ConnectionSession>>>,
        event_tx: &broadcast::Sender<SessionEvent>,
    ) {
        if session.write().take().is_some() {
            debug!("Connection status: {}", ConnectionStatus::Disconnected);
            let _ = event_tx.send(SessionEvent::StatusChanged(ConnectionStatus::Disconnected));
        }
    }

    fn teardown(&self, epoch: u64) {
        if self.epoch.load(Ordering::SeqCst) == epoch {
            self.abort_tasks();
            Self::clear_session(&self.session, &self.event_tx);
        }
    }

    fn abort_tasks(&self) {
        if let Some(handle) = self.watch_handle.write().take() {
            handle.abort();
        }
        if let Some(handle) = self.pump_handle.write().take() {
            handle.abort();
        }
    }

    /// Watch for the adapter's out-of-band disconnect signal.
    ///
    /// An unexpected disconnect is authoritative: the session is dropped no
    /// matter which workflow step is executing, and in-flight reads settle
    /// against the stale epoch so their results are discarded.
    fn spawn_disconnect_watch(&self, device_id: String, epoch: u64) {
        let mut rx = self.adapter.disconnect_events();
        let session = self.session.clone();
        let event_tx = self.event_tx.clone();
        let epochs = self.epoch.clone();

        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(id) if id == device_id => {
                        if epochs.load(Ordering::SeqCst) == epoch {
                            warn!("Unexpected disconnect from {}", device_id);
                            Self::clear_session(&session, &event_tx);
                        }
                        break;
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Some(old) = self.watch_handle.write().replace(handle) {
            old.abort();
        }
    }

    /// Best-effort read of the standard battery and device-information
    /// characteristics, matched by 16-bit UUID fragment.
    async fn read_standard_characteristics(
        &self,
        device_id: &str,
        services: &[GattService],
        epoch: u64,
    ) {
        let mut info = DeviceInformation::default();

        for service in services {
            for characteristic in &service.characteristics {
                if !self.is_current(epoch) {
                    return;
                }

                let Some(fragment) = short_uuid(&characteristic.uuid) else {
                    continue;
                };

                if !matches!(
                    fragment,
                    BATTERY_LEVEL_FRAGMENT
                        | MODEL_FRAGMENT
                        | SERIAL_FRAGMENT
                        | FIRMWARE_FRAGMENT
                        | HARDWARE_FRAGMENT
                        | MANUFACTURER_FRAGMENT
                ) {
                    continue;
                }

                let data = match self
                    .adapter
                    .read(device_id, service.uuid, characteristic.uuid)
                    .await
                {
                    Ok(data) => data,
                    Err(e) => {
                        debug!(
                            "Standard characteristic {} unreadable: {}",
                            characteristic.uuid, e
                        );
                        continue;
                    }
                };

                match fragment {
                    BATTERY_LEVEL_FRAGMENT => info.battery_level = data.first().copied(),
                    MANUFACTURER_FRAGMENT => info.manufacturer = decode_text(&data),
                    MODEL_FRAGMENT => info.model = decode_text(&data),
                    SERIAL_FRAGMENT => info.serial_number = decode_text(&data),
                    FIRMWARE_FRAGMENT => info.firmware_revision = decode_text(&data),
                    HARDWARE_FRAGMENT => info.hardware_revision = decode_text(&data),
                    _ => {}
                }
            }
        }

        if !self.is_current(epoch) {
            return;
        }

        if let Some(session) = self.session.write().as_mut() {
            session.device_info = info;
        }
    }

    /// Read every readable characteristic, one line per characteristic.
    ///
    /// A failed read keeps its slot with an access-denied placeholder so the
    /// readout count always matches the readable characteristic count.
    async fn bulk_read(&self, device_id: &str, services: &[GattService], epoch: u64) {
        let mut lines = Vec::new();

        for service in services {
            let label = service_name(&service.uuid);

            for characteristic in &service.characteristics {
                if !self.is_current(epoch) {
                    return;
                }

                if !characteristic.properties.readable {
                    continue;
                }

                let name = characteristic_name(&characteristic.uuid);

                let line = match self
                    .adapter
                    .read(device_id, service.uuid, characteristic.uuid)
                    .await
                {
                    Ok(data) => format!("{} - {}: {}", label, name, decode_value(&data)),
                    Err(e) => {
                        debug!("Read of {} failed: {}", characteristic.uuid, e);
                        format!("{} - {}: {}", label, name, ACCESS_DENIED)
                    }
                };

                lines.push(line);
            }
        }

        if !self.is_current(epoch) {
            return;
        }

        if let Some(session) = self.session.write().as_mut() {
            session.readouts = lines;
        }
        let _ = self.event_tx.send(SessionEvent::ReadoutsUpdated);
    }

    /// Subscribe to every notifiable characteristic and start the pump that
    /// appends decoded values to the session's notification log.
    async fn subscribe_notifiable(&self, device_id: &str, services: &[GattService], epoch: u64) {
        let mut subscribed = Vec::new();

        for service in services {
            for characteristic in &service.characteristics {
                if !self.is_current(epoch) {
                    return;
                }

                if !characteristic.properties.notifiable {
                    continue;
                }

                match self
                    .adapter
                    .subscribe(device_id, service.uuid, characteristic.uuid)
                    .await
                {
                    Ok(()) => subscribed.push(characteristic.uuid),
                    Err(e) => {
                        debug!("Subscribe to {} failed: {}", characteristic.uuid, e);
                    }
                }
            }
        }

        if subscribed.is_empty() || !self.is_current(epoch) {
            return;
        }

        self.spawn_notification_pump(device_id.to_string(), subscribed, epoch);
    }

    fn spawn_notification_pump(&self, device_id: String, subscribed: Vec<Uuid>, epoch: u64) {
        let mut rx = self.adapter.notifications();
        let session = self.session.clone();
        let event_tx = self.event_tx.clone();
        let epochs = self.epoch.clone();

        let handle = tokio::spawn(async move {
            loop {
                let notification = match rx.recv().await {
                    Ok(n) => n,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Notification channel lagged, {} dropped", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if epochs.load(Ordering::SeqCst) != epoch {
                    break;
                }

                if notification.device_id != device_id
                    || !subscribed.contains(&notification.characteristic_uuid)
                {
                    continue;
                }

                let record = NotificationRecord {
                    received_at: Utc::now(),
                    line: decode_value(&notification.data),
                };

                {
                    let mut guard = session.write();
                    match guard.as_mut() {
                        Some(s) => s.notifications.push(record.clone()),
                        None => break,
                    }
                }

                let _ = event_tx.send(SessionEvent::Notification(record));
            }

            debug!("Notification pump ended");
        });

        if let Some(old) = self.pump_handle.write().replace(handle) {
            old.abort();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// Decode a textual characteristic value, stripping trailing NULs.
fn decode_text(data: &[u8]) -> Option<String> {
    let trimmed: &[u8] = match data.iter().rposition(|&b| b != 0) {
        Some(last) => &data[..=last],
        None => &[],
    };

    std::str::from_utf8(trimmed)
        .ok()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_text() {
        assert_eq!(decode_text(b"Acme"), Some("Acme".to_string()));
        assert_eq!(decode_text(b"Nordic\0\0"), Some("Nordic".to_string()));
        assert_eq!(decode_text(&[0xFF, 0xFE]), None);
        assert_eq!(decode_text(&[]), None);
    }

    #[test]
    fn test_battery_byte_decoding() {
        let data = [0x64_u8];
        assert_eq!(data.first().copied(), Some(100));
    }

    #[test]
    fn test_session_event_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<SessionEvent>();
    }
}
