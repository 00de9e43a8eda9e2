//! BLE Service and Characteristic UUIDs.
//!
//! Contains the UUID constants used by the nRF52833 sensor firmware along
//! with lookup tables translating UUIDs to human-readable labels.

use uuid::Uuid;

// Battery Service (Standard BLE)
/// Standard BLE Battery Service UUID.
pub const BATTERY_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180f_0000_1000_8000_00805f9b34fb);
/// Battery Level characteristic UUID (unsigned byte, percent).
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x0000_2a19_0000_1000_8000_00805f9b34fb);

// Device Information Service (Standard BLE)
/// Standard BLE Device Information Service UUID.
pub const DEVICE_INFO_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_180a_0000_1000_8000_00805f9b34fb);
/// Manufacturer Name characteristic UUID.
pub const MANUFACTURER_NAME_UUID: Uuid = Uuid::from_u128(0x0000_2a29_0000_1000_8000_00805f9b34fb);
/// Model Number characteristic UUID.
pub const MODEL_NUMBER_UUID: Uuid = Uuid::from_u128(0x0000_2a24_0000_1000_8000_00805f9b34fb);
/// Serial Number characteristic UUID.
pub const SERIAL_NUMBER_UUID: Uuid = Uuid::from_u128(0x0000_2a25_0000_1000_8000_00805f9b34fb);
/// Hardware Revision characteristic UUID.
pub const HARDWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x0000_2a27_0000_1000_8000_00805f9b34fb);
/// Firmware Revision characteristic UUID.
pub const FIRMWARE_REVISION_UUID: Uuid = Uuid::from_u128(0x0000_2a26_0000_1000_8000_00805f9b34fb);

// Environmental Sensing Service (BME280 on the DK)
/// Environmental Sensing Service UUID.
pub const ENVIRONMENTAL_SERVICE_UUID: Uuid =
    Uuid::from_u128(0x0000_181a_0000_1000_8000_00805f9b34fb);
/// Temperature characteristic UUID (i16, hundredths of a degree Celsius).
pub const TEMPERATURE_UUID: Uuid = Uuid::from_u128(0x0000_2a6e_0000_1000_8000_00805f9b34fb);
/// Humidity characteristic UUID (u16, hundredths of a percent).
pub const HUMIDITY_UUID: Uuid = Uuid::from_u128(0x0000_2a6f_0000_1000_8000_00805f9b34fb);
/// Pressure characteristic UUID (u32, Pascals).
pub const PRESSURE_UUID: Uuid = Uuid::from_u128(0x0000_2a6d_0000_1000_8000_00805f9b34fb);

// Motion characteristics (MPU6050 on the DK)
/// Accelerometer characteristic UUID (three little-endian i16 axes).
pub const ACCELEROMETER_UUID: Uuid = Uuid::from_u128(0x0000_2a58_0000_1000_8000_00805f9b34fb);
/// Gyroscope characteristic UUID (three little-endian i16 axes).
pub const GYROSCOPE_UUID: Uuid = Uuid::from_u128(0x0000_2a59_0000_1000_8000_00805f9b34fb);

// Nordic LED Button Service (LBS)
/// Nordic LED Button Service UUID.
pub const LBS_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000_1523_1212_efde_1523_785feabcd123);
/// LBS Button characteristic UUID (Read, Notify).
pub const LBS_BUTTON_UUID: Uuid = Uuid::from_u128(0x0000_1524_1212_efde_1523_785feabcd123);
/// LBS LED characteristic UUID (Write).
pub const LBS_LED_UUID: Uuid = Uuid::from_u128(0x0000_1525_1212_efde_1523_785feabcd123);

/// The Bluetooth Base UUID with the 16-bit slot zeroed.
const BLUETOOTH_BASE: u128 = 0x0000_0000_0000_1000_8000_00805f9b34fb;
/// Mask covering everything except the 16-bit slot.
const BLUETOOTH_BASE_MASK: u128 = !(0xFFFF_u128 << 96);

/// Known 16-bit service fragments and their labels.
const SERVICE_NAMES: &[(u16, &str)] = &[
    (0x1800, "Generic Access"),
    (0x1801, "Generic Attribute"),
    (0x180A, "Device Information"),
    (0x180F, "Battery Service"),
    (0x181A, "Environmental Sensing"),
];

/// Known 16-bit characteristic fragments and their labels.
const CHARACTERISTIC_NAMES: &[(u16, &str)] = &[
    (0x2A00, "Device Name"),
    (0x2A01, "Appearance"),
    (0x2A19, "Battery Level"),
    (0x2A24, "Model Number"),
    (0x2A25, "Serial Number"),
    (0x2A26, "Firmware Revision"),
    (0x2A27, "Hardware Revision"),
    (0x2A29, "Manufacturer Name"),
    (0x2A58, "Accelerometer"),
    (0x2A59, "Gyroscope"),
    (0x2A6D, "Pressure"),
    (0x2A6E, "Temperature"),
    (0x2A6F, "Humidity"),
];

/// Extract the 16-bit short form of a UUID built on the Bluetooth Base UUID.
///
/// Returns `None` for vendor-specific 128-bit UUIDs.
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & BLUETOOTH_BASE_MASK == BLUETOOTH_BASE {
        Some(((value >> 96) & 0xFFFF) as u16)
    } else {
        None
    }
}

/// Human-readable label for a service UUID.
///
/// Unknown UUIDs fall back to a truncated raw UUID.
pub fn service_name(uuid: &Uuid) -> String {
    if *uuid == LBS_SERVICE_UUID {
        return "LED Button Service".to_string();
    }
    if let Some(short) = short_uuid(uuid) {
        if let Some((_, name)) = SERVICE_NAMES.iter().find(|(s, _)| *s == short) {
            return (*name).to_string();
        }
    }
    truncated(uuid)
}

/// Human-readable label for a characteristic UUID.
///
/// Unknown UUIDs fall back to a truncated raw UUID.
pub fn characteristic_name(uuid: &Uuid) -> String {
    if *uuid == LBS_BUTTON_UUID {
        return "Button State".to_string();
    }
    if *uuid == LBS_LED_UUID {
        return "LED Control".to_string();
    }
    if let Some(short) = short_uuid(uuid) {
        if let Some((_, name)) = CHARACTERISTIC_NAMES.iter().find(|(s, _)| *s == short) {
            return (*name).to_string();
        }
    }
    truncated(uuid)
}

fn truncated(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_format() {
        assert!(DEVICE_INFO_SERVICE_UUID.to_string().contains("180a"));
        assert!(ENVIRONMENTAL_SERVICE_UUID.to_string().contains("181a"));
        assert!(LBS_SERVICE_UUID.to_string().contains("1523"));
    }

    #[test]
    fn test_short_uuid() {
        assert_eq!(short_uuid(&BATTERY_SERVICE_UUID), Some(0x180F));
        assert_eq!(short_uuid(&BATTERY_LEVEL_UUID), Some(0x2A19));
        assert_eq!(short_uuid(&TEMPERATURE_UUID), Some(0x2A6E));
        // LBS does not use the Bluetooth Base UUID
        assert_eq!(short_uuid(&LBS_SERVICE_UUID), None);
    }

    #[test]
    fn test_service_name_known() {
        assert_eq!(service_name(&BATTERY_SERVICE_UUID), "Battery Service");
        assert_eq!(
            service_name(&ENVIRONMENTAL_SERVICE_UUID),
            "Environmental Sensing"
        );
        assert_eq!(service_name(&LBS_SERVICE_UUID), "LED Button Service");
    }

    #[test]
    fn test_characteristic_name_known() {
        assert_eq!(characteristic_name(&BATTERY_LEVEL_UUID), "Battery Level");
        assert_eq!(
            characteristic_name(&MANUFACTURER_NAME_UUID),
            "Manufacturer Name"
        );
        assert_eq!(characteristic_name(&LBS_LED_UUID), "LED Control");
    }

    #[test]
    fn test_unknown_uuid_falls_back_to_truncated() {
        let unknown = Uuid::from_u128(0xdcf3_1a27_a904_f3a3_aa4e_5ae42f1217b6);
        let name = service_name(&unknown);
        assert_eq!(name.len(), 8);
        assert!(unknown.to_string().starts_with(&name));

        let name = characteristic_name(&unknown);
        assert_eq!(name.len(), 8);
    }
}
