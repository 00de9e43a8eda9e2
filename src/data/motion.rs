//! Motion sensor data (MPU6050).
//!
//! Accelerometer and gyroscope values arrive as three consecutive
//! little-endian `i16` axes in raw sensor units.

use bytes::Buf;

use crate::error::{Error, Result};

/// A three-axis sensor sample in raw units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Vector3 {
    /// X axis.
    pub x: i16,
    /// Y axis.
    pub y: i16,
    /// Z axis.
    pub z: i16,
}

impl Vector3 {
    /// Euclidean magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        let (x, y, z) = (f32::from(self.x), f32::from(self.y), f32::from(self.z));
        (x * x + y * y + z * z).sqrt()
    }
}

impl std::fmt::Display for Vector3 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Decode a three-axis payload.
pub fn decode_vector(data: &[u8]) -> Result<Vector3> {
    let mut buf = data;
    if buf.remaining() < 6 {
        return Err(Error::InvalidData {
            context: format!("motion payload too short: {} bytes", data.len()),
        });
    }

    Ok(Vector3 {
        x: buf.get_i16_le(),
        y: buf.get_i16_le(),
        z: buf.get_i16_le(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vector() {
        let v = decode_vector(&[0x01, 0x00, 0xFF, 0xFF, 0x00, 0x80]).unwrap();
        assert_eq!(v, Vector3 { x: 1, y: -1, z: -32768 });
    }

    #[test]
    fn test_decode_vector_short_payload() {
        assert!(decode_vector(&[0x01, 0x00, 0xFF]).is_err());
    }

    #[test]
    fn test_magnitude() {
        let v = Vector3 { x: 3, y: 4, z: 0 };
        assert!((v.magnitude() - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_display() {
        let v = Vector3 { x: 1, y: -2, z: 3 };
        assert_eq!(v.to_string(), "(1, -2, 3)");
    }
}
