//! Device manager tying scanning and connection together.
//!
//! Owns the scanner and the single-session connection manager and
//! implements the scan-result-selection to connection handoff: selecting a
//! discovered device ends scanning and connects; disconnecting returns
//! control to the idle scanner.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;
use uuid::Uuid;

use crate::ble::adapter::{BleAdapter, BtleplugAdapter, DiscoveredDevice};
use crate::ble::scanner::Scanner;
use crate::connection::{ConnectionManager, SessionEvent};
use crate::error::{Error, Result};
use crate::session::{ConnectionSession, ConnectionStatus};

/// Central manager for discovering and connecting to BLE devices.
pub struct DeviceManager {
    /// BLE scanner.
    scanner: Arc<Scanner>,
    /// Single-session connection manager.
    connection: Arc<ConnectionManager>,
}

impl DeviceManager {
    /// Create a device manager over the platform Bluetooth adapter.
    ///
    /// # Errors
    ///
    /// Returns an error if Bluetooth is not available.
    pub async fn new() -> Result<Self> {
        let adapter: Arc<dyn BleAdapter> = Arc::new(BtleplugAdapter::new().await?);
        Ok(Self::with_adapter(adapter))
    }

    /// Create a device manager over a specific adapter implementation.
    pub fn with_adapter(adapter: Arc<dyn BleAdapter>) -> Self {
        Self {
            scanner: Arc::new(Scanner::new(adapter.clone())),
            connection: Arc::new(ConnectionManager::new(adapter)),
        }
    }

    /// Start the bounded discovery window.
    pub async fn start_scanning(&self) -> Result<()> {
        self.scanner.start_scan().await
    }

    /// Stop discovery before the window elapses.
    pub async fn stop_scanning(&self) -> Result<()> {
        self.scanner.stop_scan().await
    }

    /// Check if scanning is active.
    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    /// Discovered devices, in first-seen order.
    pub fn devices(&self) -> Vec<DiscoveredDevice> {
        self.scanner.devices()
    }

    /// Subscribe to discovery events.
    pub fn subscribe_discoveries(&self) -> broadcast::Receiver<DiscoveredDevice> {
        self.scanner.subscribe()
    }

    /// Select a discovered device: end scanning if active, then connect and
    /// run the session workflow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceNotFound`] when the identifier was not seen
    /// during the scan, and the connection manager's errors otherwise.
    pub async fn select_device(&self, device_id: &str) -> Result<()> {
        let device = self
            .scanner
            .device(device_id)
            .ok_or_else(|| Error::DeviceNotFound {
                identifier: device_id.to_string(),
            })?;

        if self.scanner.is_scanning() {
            self.scanner.stop_scan().await?;
        }

        self.connection.connect(&device).await
    }

    /// Disconnect the active session, returning control to the idle scanner.
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await
    }

    /// Write a UTF-8 value to a writable characteristic of the connected
    /// device, refreshing the bulk readouts on success.
    pub async fn write(
        &self,
        service_uuid: Uuid,
        characteristic_uuid: Uuid,
        value: &str,
    ) -> Result<()> {
        self.connection
            .write(service_uuid, characteristic_uuid, value)
            .await
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Read-only snapshot of the active session.
    pub fn session(&self) -> Option<ConnectionSession> {
        self.connection.session()
    }

    /// Subscribe to session events.
    pub fn subscribe_session(&self) -> broadcast::Receiver<SessionEvent> {
        self.connection.subscribe()
    }

    /// The underlying connection manager.
    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    /// The underlying scanner.
    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    /// Clean shutdown: stop scanning and drop any active session.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down device manager");

        self.scanner.stop_scan().await?;
        self.connection.disconnect().await?;

        Ok(())
    }
}
