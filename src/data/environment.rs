//! Environmental sensor data (BME280).
//!
//! The firmware reports temperature as a little-endian `i16` in hundredths
//! of a degree Celsius, humidity as a `u16` in hundredths of a percent, and
//! pressure as a `u32` in Pascals.

use bytes::Buf;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Decode a temperature payload into degrees Celsius.
pub fn decode_temperature(data: &[u8]) -> Result<f32> {
    let mut buf = data;
    if buf.remaining() < 2 {
        return Err(Error::InvalidData {
            context: format!("temperature payload too short: {} bytes", data.len()),
        });
    }
    Ok(f32::from(buf.get_i16_le()) / 100.0)
}

/// Decode a humidity payload into percent relative humidity.
pub fn decode_humidity(data: &[u8]) -> Result<f32> {
    let mut buf = data;
    if buf.remaining() < 2 {
        return Err(Error::InvalidData {
            context: format!("humidity payload too short: {} bytes", data.len()),
        });
    }
    Ok(f32::from(buf.get_u16_le()) / 100.0)
}

/// Decode a pressure payload into hectopascals.
pub fn decode_pressure(data: &[u8]) -> Result<f32> {
    let mut buf = data;
    if buf.remaining() < 4 {
        return Err(Error::InvalidData {
            context: format!("pressure payload too short: {} bytes", data.len()),
        });
    }
    Ok(buf.get_u32_le() as f32 / 100.0)
}

/// A complete environmental reading.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvironmentReading {
    /// When the reading was taken.
    pub timestamp: DateTime<Utc>,
    /// Temperature in degrees Celsius.
    pub temperature_c: f32,
    /// Relative humidity in percent.
    pub humidity_pct: f32,
    /// Barometric pressure in hectopascals.
    pub pressure_hpa: f32,
}

impl EnvironmentReading {
    /// Create a reading stamped with the current time.
    pub fn new(temperature_c: f32, humidity_pct: f32, pressure_hpa: f32) -> Self {
        Self {
            timestamp: Utc::now(),
            temperature_c,
            humidity_pct,
            pressure_hpa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_decode_temperature() {
        // 0x095E = 2398 hundredths
        assert_eq!(decode_temperature(&[0x5E, 0x09]).unwrap(), 23.98);
        assert_eq!(decode_temperature(&[0x00, 0x00]).unwrap(), 0.0);
    }

    #[test]
    fn test_decode_temperature_negative() {
        // -525 hundredths = -5.25 degrees
        assert_eq!(decode_temperature(&[0xF3, 0xFD]).unwrap(), -5.25);
    }

    #[test]
    fn test_decode_humidity() {
        // 0x12F2 = 4850 hundredths
        assert_eq!(decode_humidity(&[0xF2, 0x12]).unwrap(), 48.5);
    }

    #[test]
    fn test_decode_pressure() {
        // Standard atmosphere, 101325 Pa
        assert_eq!(
            decode_pressure(&[0xCD, 0x8B, 0x01, 0x00]).unwrap(),
            1013.25
        );
    }

    #[test]
    fn test_decode_short_payloads() {
        assert!(decode_temperature(&[0x5E]).is_err());
        assert!(decode_humidity(&[]).is_err());
        assert!(decode_pressure(&[0xCD, 0x8B, 0x01]).is_err());
    }

    #[test]
    fn test_environment_reading_new() {
        let reading = EnvironmentReading::new(23.5, 48.0, 1013.0);
        assert_eq!(reading.temperature_c, 23.5);
        assert_eq!(reading.humidity_pct, 48.0);
        assert_eq!(reading.pressure_hpa, 1013.0);
    }
}
