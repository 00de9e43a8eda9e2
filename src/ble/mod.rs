//! BLE communication module.
//!
//! This module provides the adapter abstraction over the host BLE stack
//! and the bounded-window scanner built on top of it.

pub mod adapter;
pub mod scanner;
pub mod uuids;

pub use adapter::{
    BleAdapter, BtleplugAdapter, CharacteristicProperties, DiscoveredDevice, GattCharacteristic,
    GattService, Notification,
};
pub use scanner::{Scanner, SCAN_WINDOW};
pub use uuids::*;
