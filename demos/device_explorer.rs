//! Debug example - connects to the first discovered device and dumps
//! everything it exposes: device information, services, readouts, and a
//! live notification feed.
//!
//! Run with: cargo run --example device_explorer

use nrf_monitor_ble::ble::uuids::{
    characteristic_name, service_name, LBS_LED_UUID, LBS_SERVICE_UUID,
};
use nrf_monitor_ble::{DeviceManager, Result, SessionEvent};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("nrf_monitor_ble=debug,btleplug=warn")
        .init();

    println!("===========================================");
    println!("  BLE Device Explorer");
    println!("===========================================\n");

    let manager = DeviceManager::new().await?;

    println!("[INFO] Scanning for 10 seconds...");
    manager.start_scanning().await?;
    tokio::time::sleep(Duration::from_secs(10)).await;

    let devices = manager.devices();
    println!("[INFO] Found {} device(s)\n", devices.len());

    let Some(device) = devices.first() else {
        println!("[WARN] No devices found. Make sure your board is powered on and nearby.");
        manager.shutdown().await?;
        return Ok(());
    };

    println!(
        "[INFO] Connecting to {} ({})...",
        device.display_name(),
        device.id
    );
    manager.select_device(&device.id).await?;
    println!("[INFO] Connected!\n");

    let Some(session) = manager.session() else {
        return Ok(());
    };

    println!("--- Device Information ---");
    let info = &session.device_info;
    println!("  Battery: {:?}", info.battery_level);
    println!("  Manufacturer: {:?}", info.manufacturer);
    println!("  Model: {:?}", info.model);
    println!("  Serial: {:?}", info.serial_number);
    println!("  Firmware: {:?}", info.firmware_revision);
    println!("  Hardware: {:?}", info.hardware_revision);

    println!("\n--- Services ---");
    for service in &session.services {
        println!("  {} ({})", service_name(&service.uuid), service.uuid);
        for characteristic in &service.characteristics {
            let p = characteristic.properties;
            println!(
                "    {} [{}{}{}{}]",
                characteristic_name(&characteristic.uuid),
                if p.readable { "R" } else { "-" },
                if p.writable { "W" } else { "-" },
                if p.notifiable { "N" } else { "-" },
                if p.indicatable { "I" } else { "-" },
            );
        }
    }

    println!("\n--- Readouts ---");
    for line in &session.readouts {
        println!("  {}", line);
    }

    // Light an LED if the board exposes the LED Button Service
    if session.services.iter().any(|s| s.uuid == LBS_SERVICE_UUID) {
        println!("\n[INFO] Turning the LED on...");
        match manager.write(LBS_SERVICE_UUID, LBS_LED_UUID, "1").await {
            Ok(()) => println!("[INFO] LED write succeeded, readouts refreshed"),
            Err(e) => println!("[WARN] LED write failed: {}", e),
        }
    }

    println!("\n[INFO] Listening for notifications for 30 seconds. Press Ctrl+C to exit.\n");

    let mut events = manager.subscribe_session();
    let deadline = tokio::time::sleep(Duration::from_secs(30));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                println!("\n[INFO] Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Notification(record)) => {
                    println!(
                        "  [{}] {}",
                        record.received_at.format("%H:%M:%S"),
                        record.line
                    );
                }
                Ok(SessionEvent::StatusChanged(status)) => {
                    println!("  [status] {}", status);
                }
                Ok(SessionEvent::ReadoutsUpdated) => {}
                Err(_) => break,
            }
        }
    }

    println!("[INFO] Disconnecting...");
    manager.shutdown().await?;

    println!("[INFO] Done!");
    Ok(())
}
