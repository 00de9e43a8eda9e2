//! Connection session state.
//!
//! A [`ConnectionSession`] is created when a connect attempt begins and
//! destroyed on disconnect. It is owned exclusively by the connection
//! manager; consumers only ever see cloned snapshots.

use chrono::{DateTime, Utc};

use crate::ble::adapter::{DiscoveredDevice, GattService};

/// Connection state for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionStatus {
    /// Not connected to the device.
    #[default]
    Disconnected,
    /// Currently attempting to connect.
    Connecting,
    /// Connected to the device.
    Connected,
}

impl ConnectionStatus {
    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Standard device-information fields decoded after connecting.
///
/// Every field is best-effort: a characteristic that is absent or fails to
/// read leaves its field unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceInformation {
    /// Battery level in percent.
    pub battery_level: Option<u8>,
    /// Manufacturer name.
    pub manufacturer: Option<String>,
    /// Model number.
    pub model: Option<String>,
    /// Serial number.
    pub serial_number: Option<String>,
    /// Firmware revision string.
    pub firmware_revision: Option<String>,
    /// Hardware revision string.
    pub hardware_revision: Option<String>,
}

impl DeviceInformation {
    /// True when no field could be decoded.
    pub fn is_empty(&self) -> bool {
        self.battery_level.is_none()
            && self.manufacturer.is_none()
            && self.model.is_none()
            && self.serial_number.is_none()
            && self.firmware_revision.is_none()
            && self.hardware_revision.is_none()
    }
}

/// A decoded notification value with its arrival time.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NotificationRecord {
    /// When the notification arrived.
    pub received_at: DateTime<Utc>,
    /// The decoded value line.
    pub line: String,
}

/// State of a single peripheral connection.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConnectionSession {
    /// The peripheral this session is for.
    pub device: DiscoveredDevice,
    /// Current connection status.
    pub status: ConnectionStatus,
    /// Services discovered on the peripheral, immutable after discovery.
    pub services: Vec<GattService>,
    /// Decoded standard-characteristic fields.
    pub device_info: DeviceInformation,
    /// One line per readable characteristic from the latest bulk read pass.
    pub readouts: Vec<String>,
    /// Received notification values, in arrival order.
    pub notifications: Vec<NotificationRecord>,
}

impl ConnectionSession {
    /// Create a fresh session for a connect attempt.
    pub(crate) fn new(device: DiscoveredDevice) -> Self {
        Self {
            device,
            status: ConnectionStatus::Connecting,
            services: Vec::new(),
            device_info: DeviceInformation::default(),
            readouts: Vec::new(),
            notifications: Vec::new(),
        }
    }

    /// Total number of characteristics across all discovered services.
    pub fn characteristic_count(&self) -> usize {
        self.services.iter().map(|s| s.characteristics.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_status() {
        assert!(!ConnectionStatus::Disconnected.is_connected());
        assert!(!ConnectionStatus::Connecting.is_connected());
        assert!(ConnectionStatus::Connected.is_connected());
        assert_eq!(ConnectionStatus::default(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_connection_status_display() {
        assert_eq!(format!("{}", ConnectionStatus::Connected), "Connected");
        assert_eq!(
            format!("{}", ConnectionStatus::Disconnected),
            "Disconnected"
        );
    }

    #[test]
    fn test_device_information_is_empty() {
        let mut info = DeviceInformation::default();
        assert!(info.is_empty());

        info.battery_level = Some(100);
        assert!(!info.is_empty());
    }

    #[test]
    fn test_new_session_defaults() {
        let session = ConnectionSession::new(DiscoveredDevice {
            id: "AA:BB".to_string(),
            name: Some("nRF52833 DK".to_string()),
            rssi: Some(-45),
        });

        assert_eq!(session.status, ConnectionStatus::Connecting);
        assert!(session.services.is_empty());
        assert!(session.device_info.is_empty());
        assert!(session.readouts.is_empty());
        assert!(session.notifications.is_empty());
        assert_eq!(session.characteristic_count(), 0);
    }
}
