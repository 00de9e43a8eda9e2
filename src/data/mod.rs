//! Data structures for sensor data.
//!
//! This module contains the decoders for the sensor payloads exposed by the
//! nRF52833 firmware: BME280 environmental values and MPU6050 motion
//! vectors.

pub mod environment;
pub mod motion;

pub use environment::{
    decode_humidity, decode_pressure, decode_temperature, EnvironmentReading,
};
pub use motion::{decode_vector, Vector3};
